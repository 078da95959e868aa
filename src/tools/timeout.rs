//! Execution Timeout Management
//!
//! Timeouts are configured in whole seconds per tool; this type carries the
//! duration and the wording used when one expires.

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Error returned when a future outlives its timeout
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Command timed out after {} seconds", format_secs(.0))]
pub struct TimedOut(pub Duration);

/// Render a duration as seconds without a trailing `.0`
fn format_secs(duration: &Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

/// Execution timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::from_secs(300)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use kalidocker::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Message reported on results that hit this timeout
    pub fn expired_message(&self) -> String {
        TimedOut(self.duration).to_string()
    }

    /// Drive a future to completion or until the timeout expires
    ///
    /// The future is dropped on expiry; callers owning a process must
    /// terminate it themselves once this returns `Err`.
    pub async fn run<F, T>(&self, future: F) -> Result<T, TimedOut>
    where
        F: Future<Output = T>,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| TimedOut(self.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_default() {
        assert_eq!(ExecutionTimeout::default().duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_timeout_from_secs() {
        let timeout = ExecutionTimeout::from_secs(45);
        assert_eq!(timeout.duration(), Duration::from_secs(45));
    }

    #[test]
    fn test_expired_message() {
        assert_eq!(
            ExecutionTimeout::from_secs(120).expired_message(),
            "Command timed out after 120 seconds"
        );
        assert_eq!(
            ExecutionTimeout::new(Duration::from_millis(500)).expired_message(),
            "Command timed out after 0.5 seconds"
        );
    }

    #[tokio::test]
    async fn test_timeout_run_success() {
        let timeout = ExecutionTimeout::from_secs(5);
        let value = timeout.run(async { "done" }).await;
        assert_eq!(value, Ok("done"));
    }

    #[tokio::test]
    async fn test_timeout_run_expires() {
        let timeout = ExecutionTimeout::new(Duration::from_millis(50));

        let result = timeout
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err, TimedOut(Duration::from_millis(50)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_run_just_in_time() {
        let timeout = ExecutionTimeout::from_secs(1);

        let result = timeout
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        assert!(result.is_ok());
    }
}
