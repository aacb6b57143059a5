//! Retries for transient provider failures
//!
//! [`RetryBackend`] wraps another [`Backend`] and re-sends a request when it
//! fails with a network error, a 5xx, or a throttling response. Requests are
//! retried whole, so the wrapped backend sees identical requests each time.

use std::time::Duration;

use async_trait::async_trait;

use crate::backend::Backend;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Error codes providers use to ask a client to slow down
const THROTTLING_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "SlowDown",
    "Throttling",
    "ThrottlingException",
];

/// Delays between attempts: `initial * 2^n`, capped, plus jitter
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_ms: u64,
    max_ms: u64,
    step: u32,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            initial_ms: config.initial_backoff_ms,
            max_ms: config.max_backoff_ms,
            step: 0,
        }
    }

    /// Delay before the next attempt, without jitter
    fn base(&self) -> u64 {
        let factor = 1u64 << self.step.min(16);
        self.initial_ms.saturating_mul(factor).min(self.max_ms)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let base = self.base();
        self.step = self.step.saturating_add(1);
        Some(Duration::from_millis(base + jitter(base)))
    }
}

/// Clock-derived jitter in `0..max`
fn jitter(max: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % max.max(1)
}

/// True for failures worth sending the same request again
pub fn is_transient(error: &Error) -> bool {
    match error {
        Error::Status { actual, body, .. } => match actual {
            429 | 500 | 502 | 503 | 504 => true,
            400 | 403 => THROTTLING_CODES
                .iter()
                .any(|code| body.contains(&format!("<Code>{code}</Code>"))),
            _ => false,
        },
        Error::Network(_) => true,
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        _ => false,
    }
}

/// Backend decorator that retries transient failures
pub struct RetryBackend<B> {
    inner: B,
    config: RetryConfig,
}

impl<B> RetryBackend<B> {
    pub fn new(inner: B, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl<B: Backend> Backend for RetryBackend<B> {
    async fn execute(&self, request: Request) -> Result<Response> {
        let attempts = self.config.max_attempts.max(1);
        let mut delays = Backoff::new(&self.config);
        let mut attempt = 1;
        loop {
            let error = match self.inner.execute(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            if attempt >= attempts || !is_transient(&error) {
                return Err(error);
            }
            let delay = delays.next().unwrap_or_default();
            tracing::warn!(
                service = %request.service,
                action = %request.action,
                attempt,
                attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::backend::MockBackend;
    use crate::http::Method;

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let config = RetryConfig {
            max_attempts: 8,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        let delays: Vec<u128> = Backoff::new(&config).take(5).map(|d| d.as_millis()).collect();
        assert!((100..200).contains(&delays[0]));
        assert!((200..400).contains(&delays[1]));
        assert!((400..800).contains(&delays[2]));
        assert!(delays[3] >= 500 && delays[3] < 1000);
        assert!(delays[4] >= 500 && delays[4] < 1000);
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&Error::Network("connection reset".to_string())));
        assert!(is_transient(&Error::status(&[200], 503, "")));
        let throttled =
            "<Response><Errors><Error><Code>RequestLimitExceeded</Code></Error></Errors></Response>";
        assert!(is_transient(&Error::status(&[200], 400, throttled)));

        let missing =
            "<Response><Errors><Error><Code>InvalidVolume.NotFound</Code></Error></Errors></Response>";
        assert!(!is_transient(&Error::status(&[200], 400, missing)));
        assert!(!is_transient(&Error::status(&[204], 409, "BucketNotEmpty")));
        assert!(!is_transient(&Error::Auth("bad key".to_string())));
        assert!(!is_transient(&Error::InvalidState("new".to_string())));
    }

    #[tokio::test]
    async fn test_recovers_after_throttling() {
        let mut inner = MockBackend::new();
        let mut sequence = mockall::Sequence::new();
        inner
            .expect_execute()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|_| Err(Error::status(&[200], 503, "<Error><Code>SlowDown</Code></Error>")));
        inner
            .expect_execute()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(Response::new(200, Attributes::new().with("Payer", "BucketOwner"))));

        let backend = RetryBackend::new(inner, quick(3));
        let response = backend
            .execute(Request::new("s3", "GetRequestPayment", Method::Get, "/b"))
            .await
            .unwrap();
        assert_eq!(response.body.get_str("Payer"), Some("BucketOwner"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut inner = MockBackend::new();
        inner
            .expect_execute()
            .times(2)
            .returning(|_| Err(Error::Network("connection reset by peer".to_string())));

        let backend = RetryBackend::new(inner, quick(2));
        let err = backend
            .execute(Request::new("ec2", "DescribeInstances", Method::Post, "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut inner = MockBackend::new();
        inner
            .expect_execute()
            .times(1)
            .returning(|_| Err(Error::status(&[200], 404, "NoSuchBucket")));

        let backend = RetryBackend::new(inner, quick(3));
        let err = backend
            .execute(Request::new("s3", "GetBucket", Method::Get, "/nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_sends_once() {
        let mut inner = MockBackend::new();
        inner
            .expect_execute()
            .times(1)
            .returning(|_| Err(Error::Network("timeout".to_string())));

        let backend = RetryBackend::new(inner, quick(0));
        assert!(backend
            .execute(Request::new("files", "GetContainers", Method::Get, "/"))
            .await
            .is_err());
    }
}
