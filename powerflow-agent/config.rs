use std::time::Duration;

/// Environment switch for per-capability invocation tracing; only `1` enables it
pub const VERBOSE_ENV: &str = "POWERFLOW_LOG";

/// Environment override for the power sampling window, in milliseconds
pub const SAMPLE_INTERVAL_ENV: &str = "POWERFLOW_SAMPLE_MS";

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Engine configuration, resolved once at initialization and threaded through calls
#[derive(Debug, Clone)]
pub struct Config {
    /// Log `Running <capability>` on every capability entry
    pub verbose: bool,
    /// Wait between the baseline and second energy sample on the first power query
    pub sample_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

impl Config {
    /// Read the environment once
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(VERBOSE_ENV).ok().as_deref(),
            std::env::var(SAMPLE_INTERVAL_ENV).ok().as_deref(),
        )
    }

    fn from_vars(verbose: Option<&str>, sample_ms: Option<&str>) -> Self {
        let verbose = matches!(verbose.map(str::trim), Some("1"));

        let sample_interval = match sample_ms.map(|s| s.trim().parse::<u64>()) {
            Some(Ok(ms)) => Duration::from_millis(ms),
            Some(Err(e)) => {
                tracing::warn!(
                    "Ignoring invalid {SAMPLE_INTERVAL_ENV}: {e}, using {:?}",
                    DEFAULT_SAMPLE_INTERVAL
                );
                DEFAULT_SAMPLE_INTERVAL
            }
            None => DEFAULT_SAMPLE_INTERVAL,
        };

        Self {
            verbose,
            sample_interval,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_sample_interval(mut self, sample_interval: Duration) -> Self {
        self.sample_interval = sample_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_only_for_one() {
        assert!(Config::from_vars(Some("1"), None).verbose);
        assert!(!Config::from_vars(Some("0"), None).verbose);
        assert!(!Config::from_vars(Some("yes"), None).verbose);
        assert!(!Config::from_vars(None, None).verbose);
    }

    #[test]
    fn test_sample_interval_override() {
        let config = Config::from_vars(None, Some("250"));
        assert_eq!(config.sample_interval, Duration::from_millis(250));

        let config = Config::from_vars(None, Some("soon"));
        assert_eq!(config.sample_interval, DEFAULT_SAMPLE_INTERVAL);
    }

    #[test]
    fn test_builder_setters() {
        let config = Config::default()
            .with_verbose(true)
            .with_sample_interval(Duration::ZERO);
        assert!(config.verbose);
        assert_eq!(config.sample_interval, Duration::ZERO);
    }
}
