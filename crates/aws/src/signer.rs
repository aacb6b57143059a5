//! AWS Signature Version 4 request signing

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest, SigningParams,
    SigningSettings, UriPathNormalizationMode, sign,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use bytes::Bytes;
use http::{HeaderName, HeaderValue};

use nb_core::{Error, Profile, Result, Signer};

/// Signs requests for one AWS service in one region
#[derive(Clone)]
pub struct SigV4Signer {
    credentials: Credentials,
    region: String,
    service: &'static str,
    time: Option<SystemTime>,
}

impl std::fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl SigV4Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        service: &'static str,
    ) -> Self {
        let credentials = Credentials::new(
            access_key.into(),
            secret_key.into(),
            None, // session token
            None, // expiry
            "nimbus-static-credentials",
        );
        Self {
            credentials,
            region: region.into(),
            service,
            time: None,
        }
    }

    pub fn from_profile(profile: &Profile, service: &'static str) -> Self {
        Self::new(
            &profile.access_key,
            &profile.secret_key,
            &profile.region,
            service,
        )
    }

    /// Sign with a fixed clock instead of the current time
    pub fn at(mut self, time: SystemTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn service(&self) -> &str {
        self.service
    }

    fn settings(&self) -> SigningSettings {
        let mut settings = SigningSettings::default();
        if self.service == "s3" {
            settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
            settings.percent_encoding_mode = PercentEncodingMode::Single;
            settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;
        }
        settings
    }
}

impl Signer for SigV4Signer {
    fn sign(&self, request: &mut http::Request<Bytes>) -> Result<()> {
        let identity: Identity = self.credentials.clone().into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(self.time.unwrap_or_else(SystemTime::now))
            .settings(self.settings())
            .build()
            .map_err(|e| Error::Auth(format!("Invalid signing parameters: {e}")))?
            .into();

        let uri = request.uri().to_string();
        let headers: Vec<(&str, &str)> = request
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect();

        let signable = SignableRequest::new(
            request.method().as_str(),
            &uri,
            headers.into_iter(),
            SignableBody::Bytes(request.body()),
        )
        .map_err(|e| Error::Auth(format!("Request cannot be signed: {e}")))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| Error::Auth(format!("Signing failed: {e}")))?
            .into_parts();

        for (name, value) in instructions.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Auth(format!("Invalid signature header: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Auth(format!("Invalid signature header: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fixed_time() -> SystemTime {
        // 2023-11-14T22:13:20Z
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn request(uri: &str, body: &'static str) -> http::Request<Bytes> {
        let host = uri
            .trim_start_matches("https://")
            .split('/')
            .next()
            .unwrap()
            .to_string();
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("host", host)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    #[test]
    fn test_sign_ec2_adds_authorization() {
        let signer = SigV4Signer::new("AKIDEXAMPLE", "secret", "us-east-1", "ec2").at(fixed_time());
        let mut req = request(
            "https://ec2.us-east-1.amazonaws.com/",
            "Action=DescribeInstances&Version=2009-11-30",
        );
        signer.sign(&mut req).unwrap();

        let auth = req.headers()["authorization"].to_str().unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20231114/us-east-1/ec2/aws4_request"
        ));
        assert!(auth.contains("SignedHeaders="));
        assert_eq!(req.headers()["x-amz-date"], "20231114T221320Z");
        assert!(req.headers().get("x-amz-content-sha256").is_none());
    }

    #[test]
    fn test_sign_s3_adds_payload_hash() {
        let signer = SigV4Signer::new("AKIDEXAMPLE", "secret", "us-east-1", "s3").at(fixed_time());
        let mut req = request("https://s3.amazonaws.com/fogbucketname", "");
        signer.sign(&mut req).unwrap();

        assert_eq!(
            req.headers()["x-amz-content-sha256"],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_s3_payload_hash_covers_body() {
        use sha2::{Digest, Sha256};

        let signer = SigV4Signer::new("AK", "SK", "us-east-1", "s3").at(fixed_time());
        let mut req = request("https://s3.amazonaws.com/fogbucketname/k", "important");
        signer.sign(&mut req).unwrap();

        let expected = hex::encode(Sha256::digest(b"important"));
        assert_eq!(req.headers()["x-amz-content-sha256"], expected.as_str());
    }

    #[test]
    fn test_signature_is_deterministic_for_fixed_time() {
        let signer = SigV4Signer::new("AK", "SK", "eu-west-1", "ec2").at(fixed_time());
        let mut a = request("https://ec2.eu-west-1.amazonaws.com/", "Action=X");
        let mut b = request("https://ec2.eu-west-1.amazonaws.com/", "Action=X");
        signer.sign(&mut a).unwrap();
        signer.sign(&mut b).unwrap();
        assert_eq!(a.headers()["authorization"], b.headers()["authorization"]);

        let mut c = request("https://ec2.eu-west-1.amazonaws.com/", "Action=Y");
        signer.sign(&mut c).unwrap();
        assert_ne!(a.headers()["authorization"], c.headers()["authorization"]);
    }

    #[test]
    fn test_from_profile_uses_region() {
        let mut profile = Profile::new("p", nb_core::Provider::Aws, "AK", "SK");
        profile.region = "ap-southeast-2".to_string();
        let signer = SigV4Signer::from_profile(&profile, "s3");
        assert_eq!(signer.region, "ap-southeast-2");
        assert_eq!(signer.service(), "s3");
    }
}
