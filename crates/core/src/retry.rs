//! Retry mechanism with fixed backoff
//!
//! Only transport-level failures are retried. A response from the server,
//! whatever its status, is final.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Governs how many times a network operation is re-run and how long to
/// wait in between.
///
/// An operation is executed at most `retries + 1` times. Operations that
/// stream a body must rewind their source at the start of every attempt;
/// the attempt number is passed in so they can tell the first run apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    wait: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, wait: Duration) -> Self {
        Self { retries, wait }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Run `operation`, retrying transient network errors
    ///
    /// # Example
    /// ```ignore
    /// let response = policy.attempt(|_| async { transport.send(request.clone()).await }).await?;
    /// ```
    pub async fn attempt<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.attempt_with(operation, is_retryable_error).await
    }

    /// Like [`attempt`](Self::attempt) with a caller-supplied classifier
    pub async fn attempt_with<T, F, Fut, R>(&self, mut operation: F, is_retryable: R) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        R: Fn(&Error) -> bool,
    {
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= self.retries || !is_retryable(&e) {
                        return Err(e);
                    }

                    attempt += 1;
                    tracing::debug!(
                        attempt = attempt,
                        retries = self.retries,
                        wait_ms = self.wait.as_millis(),
                        error = %e,
                        "Retrying after network error"
                    );

                    tokio::time::sleep(self.wait).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.retries, Duration::from_millis(config.wait_ms))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.retries, Duration::from_millis(config.wait_ms))
    }
}

/// Check if an error is a transient network failure
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Network(_) => true,
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        _ => false,
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    retries: u32,
    wait_ms: u64,
}

impl RetryBuilder {
    pub fn new() -> Self {
        let defaults = RetryConfig::default();
        Self {
            retries: defaults.retries,
            wait_ms: defaults.wait_ms,
        }
    }

    pub fn retries(mut self, n: u32) -> Self {
        self.retries = n;
        self
    }

    pub fn wait_ms(mut self, ms: u64) -> Self {
        self.wait_ms = ms;
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.wait_ms))
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryBuilder::new().retries(retries).wait_ms(1).build()
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Network(
            "connection timeout".to_string()
        )));
        assert!(is_retryable_error(&Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset
        ))));

        // Server responses are final, even 5xx
        assert!(!is_retryable_error(&Error::Status {
            status: 503,
            message: "503".to_string(),
        }));
        assert!(!is_retryable_error(&Error::Io(std::io::Error::from(
            std::io::ErrorKind::NotFound
        ))));
        assert!(!is_retryable_error(&Error::Session(
            "missing uuid".to_string()
        )));
    }

    #[test]
    fn test_retry_builder() {
        let policy = RetryBuilder::new().retries(5).wait_ms(200).build();

        assert_eq!(policy.retries(), 5);
        assert_eq!(policy.wait(), Duration::from_millis(200));
    }

    #[test]
    fn test_default_matches_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries(), 3);
        assert_eq!(policy.wait(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let policy = fast_policy(3);
        let mut calls = 0;

        let result = policy
            .attempt(|_| {
                calls += 1;
                async { Ok::<_, Error>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let policy = fast_policy(3);
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result = policy
            .attempt(|_| {
                let cc = call_count_clone.clone();
                async move {
                    let count = cc.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(Error::Network("timeout".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_runs_n_plus_one_times() {
        let policy = fast_policy(3);
        let mut attempts = Vec::new();

        let result: Result<()> = policy
            .attempt(|attempt| {
                attempts.push(attempt);
                let message = format!("reset #{attempt}");
                async move { Err(Error::Network(message)) }
            })
            .await;

        assert_eq!(attempts, vec![0, 1, 2, 3]);
        // The last error is returned, not an aggregate
        match result {
            Err(Error::Network(msg)) => assert_eq!(msg, "reset #3"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_protocol_error_not_retried() {
        let policy = fast_policy(3);
        let mut calls = 0;

        let result: Result<()> = policy
            .attempt(|_| {
                calls += 1;
                async {
                    Err(Error::Status {
                        status: 401,
                        message: "sign error".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Status { status: 401, .. })));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let policy = RetryPolicy::none();
        let mut calls = 0;

        let result: Result<()> = policy
            .attempt(|_| {
                calls += 1;
                async { Err(Error::Network("down".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
