//! Scheduler configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder setters (programmatic)
//! 2. Environment variables (runtime)
//! 3. Library defaults (`defaults` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use iosched_runtime::config::SchedulerConfig;
//!
//! // Defaults with env overrides
//! let config = SchedulerConfig::from_env();
//!
//! // Or customize programmatically
//! let config = SchedulerConfig::from_env()
//!     .concurrency_hint(4)
//!     .offload_threads(2);
//! ```

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Library defaults
pub mod defaults {
    /// Expected number of threads calling `run` (0 = number of CPUs)
    pub const CONCURRENCY_HINT: usize = 0;

    /// Operation records admitted before `ResourceExhausted`
    pub const MAX_OUTSTANDING: usize = 65536;

    /// Private worker threads per offload service
    pub const OFFLOAD_THREADS: usize = 1;

    /// Worker thread name prefix
    pub const THREAD_NAME: &str = "iosched-worker";

    /// Longest the deadline timer thread sleeps between polls
    pub const TIMER_MAX_SLEEP_MS: u64 = 10;
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("concurrency_hint must be at least 1")]
    ZeroConcurrencyHint,

    #[error("max_outstanding must be at least 1")]
    ZeroMaxOutstanding,

    #[error("offload_threads must be at least 1")]
    ZeroOffloadThreads,

    #[error("thread_name must not be empty")]
    EmptyThreadName,
}

/// Scheduler configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Expected number of threads calling `run`
    pub concurrency_hint: usize,
    /// Admission limit for operation records
    pub max_outstanding: usize,
    /// Private worker threads per offload service
    pub offload_threads: usize,
    /// Worker thread name prefix
    pub thread_name: String,
    /// Longest the deadline timer thread sleeps between polls
    pub timer_max_sleep: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl SchedulerConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `IOSCHED_CONCURRENCY_HINT` - Threads expected to call `run`
    /// - `IOSCHED_MAX_OUTSTANDING` - Operation admission limit
    /// - `IOSCHED_OFFLOAD_THREADS` - Private threads per offload service
    /// - `IOSCHED_THREAD_NAME` - Worker thread name prefix
    /// - `IOSCHED_TIMER_MAX_SLEEP_MS` - Timer thread max poll interval
    ///
    /// Zero values fall back to the defaults, so the result always validates.
    pub fn from_env() -> Self {
        let hint = match env_or("IOSCHED_CONCURRENCY_HINT", defaults::CONCURRENCY_HINT) {
            0 => detected_parallelism(),
            n => n,
        };
        let max_outstanding = match env_or("IOSCHED_MAX_OUTSTANDING", defaults::MAX_OUTSTANDING) {
            0 => defaults::MAX_OUTSTANDING,
            n => n,
        };
        let offload_threads = match env_or("IOSCHED_OFFLOAD_THREADS", defaults::OFFLOAD_THREADS) {
            0 => defaults::OFFLOAD_THREADS,
            n => n,
        };
        let mut thread_name: String = env_or("IOSCHED_THREAD_NAME", defaults::THREAD_NAME.to_string());
        if thread_name.is_empty() {
            thread_name = defaults::THREAD_NAME.to_string();
        }

        Self {
            concurrency_hint: hint,
            max_outstanding,
            offload_threads,
            thread_name,
            timer_max_sleep: Duration::from_millis(env_or(
                "IOSCHED_TIMER_MAX_SLEEP_MS",
                defaults::TIMER_MAX_SLEEP_MS,
            )),
        }
    }

    /// Set the concurrency hint
    pub fn concurrency_hint(mut self, n: usize) -> Self {
        self.concurrency_hint = n;
        self
    }

    /// Set the operation admission limit
    pub fn max_outstanding(mut self, n: usize) -> Self {
        self.max_outstanding = n;
        self
    }

    /// Set the number of private offload threads
    pub fn offload_threads(mut self, n: usize) -> Self {
        self.offload_threads = n;
        self
    }

    /// Set the worker thread name prefix
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the timer thread max poll interval
    pub fn timer_max_sleep(mut self, d: Duration) -> Self {
        self.timer_max_sleep = d;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_hint == 0 {
            return Err(ConfigError::ZeroConcurrencyHint);
        }
        if self.max_outstanding == 0 {
            return Err(ConfigError::ZeroMaxOutstanding);
        }
        if self.offload_threads == 0 {
            return Err(ConfigError::ZeroOffloadThreads);
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_is_valid() {
        let config = SchedulerConfig::from_env();
        assert!(config.validate().is_ok());
        assert!(config.concurrency_hint >= 1);
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::from_env()
            .concurrency_hint(3)
            .max_outstanding(10)
            .offload_threads(2)
            .thread_name("pool");
        assert_eq!(config.concurrency_hint, 3);
        assert_eq!(config.max_outstanding, 10);
        assert_eq!(config.offload_threads, 2);
        assert_eq!(config.thread_name, "pool");
    }

    #[test]
    fn test_validate_rejects_zero() {
        let base = SchedulerConfig::from_env();
        assert_eq!(
            base.clone().concurrency_hint(0).validate(),
            Err(ConfigError::ZeroConcurrencyHint)
        );
        assert_eq!(
            base.clone().max_outstanding(0).validate(),
            Err(ConfigError::ZeroMaxOutstanding)
        );
        assert_eq!(
            base.clone().offload_threads(0).validate(),
            Err(ConfigError::ZeroOffloadThreads)
        );
        assert_eq!(base.thread_name("").validate(), Err(ConfigError::EmptyThreadName));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("__IOSCHED_TEST_NUM__", "123");
        let v: usize = env_or("__IOSCHED_TEST_NUM__", 0);
        assert_eq!(v, 123);

        std::env::set_var("__IOSCHED_TEST_NUM__", "not_a_number");
        let v: usize = env_or("__IOSCHED_TEST_NUM__", 7);
        assert_eq!(v, 7);
        std::env::remove_var("__IOSCHED_TEST_NUM__");

        let v: usize = env_or("__IOSCHED_TEST_UNSET__", 42);
        assert_eq!(v, 42);
    }
}
