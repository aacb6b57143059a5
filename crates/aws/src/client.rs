//! Remote backend construction for AWS services
//!
//! Resolves the service endpoint for a profile and assembles the signed,
//! retrying backend the EC2 and S3 connections dispatch through.

use std::sync::Arc;

use nb_core::{
    Addressing, Backend, Endpoint, Error, HttpTransport, Profile, Provider, RemoteBackend, Result,
    RetryBackend, TransportOptions,
};

use crate::signer::SigV4Signer;

/// EC2 endpoint for a profile: the override, or the regional default
pub fn ec2_endpoint(profile: &Profile) -> Result<Endpoint> {
    match &profile.endpoint {
        Some(url) => Endpoint::parse(url),
        None => Endpoint::parse(&format!("https://ec2.{}.amazonaws.com", profile.region)),
    }
}

/// S3 endpoint for a profile.
///
/// `bucket_lookup` picks the addressing style; `auto` uses virtual-host
/// addressing against AWS and path-style against a custom endpoint.
pub fn s3_endpoint(profile: &Profile) -> Result<Endpoint> {
    let endpoint = match &profile.endpoint {
        Some(url) => Endpoint::parse(url)?,
        None if profile.region == "us-east-1" => Endpoint::parse("https://s3.amazonaws.com")?,
        None => Endpoint::parse(&format!("https://s3.{}.amazonaws.com", profile.region))?,
    };

    let addressing = match profile.bucket_lookup.as_str() {
        "dns" => Addressing::VirtualHost,
        "path" => Addressing::Path,
        "auto" if profile.endpoint.is_none() => Addressing::VirtualHost,
        "auto" => Addressing::Path,
        other => {
            return Err(Error::Config(format!(
                "Bucket lookup must be 'auto', 'path', or 'dns', got '{other}'"
            )));
        }
    };
    Ok(endpoint.with_addressing(addressing))
}

/// Signed, retrying backend for `service` at `endpoint`
pub fn connect(
    profile: &Profile,
    service: &'static str,
    endpoint: Endpoint,
) -> Result<Arc<dyn Backend>> {
    if profile.provider != Provider::Aws {
        return Err(Error::Config(format!(
            "Profile '{}' is for {}, not aws",
            profile.name, profile.provider
        )));
    }

    let transport = HttpTransport::new(&TransportOptions::from_profile(profile))?;
    let signer = Arc::new(SigV4Signer::from_profile(profile, service));
    tracing::debug!(
        profile = %profile.name,
        service = service,
        endpoint = %endpoint.url,
        "Connecting to AWS"
    );

    let remote = RemoteBackend::new(endpoint, signer, transport);
    Ok(Arc::new(RetryBackend::new(remote, profile.retry_config())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::new("aws", Provider::Aws, "AK", "SK")
    }

    #[test]
    fn test_default_endpoints() {
        let profile = profile();
        assert_eq!(
            ec2_endpoint(&profile).unwrap().url.as_str(),
            "https://ec2.us-east-1.amazonaws.com/"
        );

        let s3 = s3_endpoint(&profile).unwrap();
        assert_eq!(s3.url.as_str(), "https://s3.amazonaws.com/");
        assert_eq!(s3.addressing, Addressing::VirtualHost);
    }

    #[test]
    fn test_regional_s3_endpoint() {
        let mut profile = profile();
        profile.region = "eu-west-1".to_string();
        let s3 = s3_endpoint(&profile).unwrap();
        assert_eq!(s3.url.as_str(), "https://s3.eu-west-1.amazonaws.com/");
    }

    #[test]
    fn test_custom_endpoint_auto_uses_path_style() {
        let mut profile = profile();
        profile.endpoint = Some("http://localhost:9000".to_string());
        let s3 = s3_endpoint(&profile).unwrap();
        assert_eq!(s3.addressing, Addressing::Path);

        profile.bucket_lookup = "dns".to_string();
        assert_eq!(s3_endpoint(&profile).unwrap().addressing, Addressing::VirtualHost);

        profile.bucket_lookup = "sideways".to_string();
        assert!(matches!(s3_endpoint(&profile), Err(Error::Config(_))));
    }

    #[test]
    fn test_connect_rejects_rackspace_profile() {
        let profile = Profile::new("rs", Provider::Rackspace, "user", "key");
        let endpoint = ec2_endpoint(&profile).unwrap();
        assert!(matches!(
            connect(&profile, "ec2", endpoint),
            Err(Error::Config(_))
        ));
    }
}
