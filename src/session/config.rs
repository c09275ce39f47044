//! Session registry configuration

use std::time::Duration;

/// Configuration for the session registry and its reaper
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions older than this are evicted by the reaper
    pub max_age: Duration,

    /// How often the reaper scans
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Set the maximum session age
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the reaper interval; zero is raised to one millisecond
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(Duration::from_millis(1));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.max_age, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_chaining() {
        let config = SessionConfig::default()
            .max_age(Duration::from_secs(1))
            .sweep_interval(Duration::ZERO);

        assert_eq!(config.max_age, Duration::from_secs(1));
        assert_eq!(config.sweep_interval, Duration::from_millis(1));
    }
}
