//! Execution Timeout Management
//!
//! This module provides the per-command timeout used by the executor.

use std::fmt;
use std::time::Duration;

use tokio::time;

use super::error::CommandError;

/// Default timeout for a single command, in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 2.0;

/// Execution timeout configuration
///
/// Always strictly positive. Timeouts are enforced so that a hung child
/// process cannot stall the rest of the command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    /// The timeout duration
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::new(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// A zero duration is bumped to one millisecond so the invariant holds.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use cmdguard::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.duration(), Duration::from_secs(30));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: duration.max(Duration::from_millis(1)),
        }
    }

    /// Create a timeout from fractional seconds
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidTimeout`] unless `secs` is finite, > 0
    /// and fits in a [`Duration`].
    pub fn from_secs_f64(secs: f64) -> Result<Self, CommandError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(CommandError::InvalidTimeout(secs));
        }
        let duration =
            Duration::try_from_secs_f64(secs).map_err(|_| CommandError::InvalidTimeout(secs))?;
        Ok(Self::new(duration))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Run a future to completion or until the timeout expires
    ///
    /// Returns `None` if the deadline passed first. The future is dropped in
    /// that case, releasing anything it borrowed.
    pub async fn run<F, T>(&self, future: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        time::timeout(self.duration, future).await.ok()
    }
}

impl fmt::Display for ExecutionTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.duration)
    }
}

impl TryFrom<f64> for ExecutionTimeout {
    type Error = CommandError;

    fn try_from(secs: f64) -> Result<Self, Self::Error> {
        Self::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_default() {
        let timeout = ExecutionTimeout::default();
        assert_eq!(timeout.duration(), Duration::from_secs(2));
        assert_eq!(timeout.as_secs_f64(), 2.0);
    }

    #[test]
    fn test_timeout_from_secs_f64() {
        let timeout = ExecutionTimeout::from_secs_f64(60.0).unwrap();
        assert_eq!(timeout.duration(), Duration::from_secs(60));

        let timeout = ExecutionTimeout::from_secs_f64(0.25).unwrap();
        assert_eq!(timeout.duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_timeouts() {
        for value in [-1.0, 0.0, -0.0, f64::NAN, f64::INFINITY, 1e20, f64::MAX] {
            let result = ExecutionTimeout::try_from(value);
            assert!(
                matches!(result, Err(CommandError::InvalidTimeout(_))),
                "{value} should be rejected"
            );
        }

        let err = ExecutionTimeout::from_secs_f64(-1.0).unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_zero_duration_is_clamped() {
        let timeout = ExecutionTimeout::new(Duration::ZERO);
        assert!(timeout.duration() > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_timeout_run_success() {
        let timeout = ExecutionTimeout::from_secs_f64(1.0).unwrap();
        let result = timeout.run(async { "test value" }).await;
        assert_eq!(result, Some("test value"));
    }

    #[tokio::test]
    async fn test_timeout_run_timeout() {
        let timeout = ExecutionTimeout::from_secs_f64(0.1).unwrap();

        let result = timeout
            .run(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
            })
            .await;

        assert!(result.is_none());
    }
}
