//! Configuration for the accumulator.

use std::time::Duration;

use crate::Error;

/// Default time a series is served after its last accepted update.
const DEFAULT_METRIC_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Accumulator Configuration
#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    /// How long a series is kept after it was last updated.
    ///
    /// Expired series are pruned on the next collection.
    pub metric_expiration: Duration,
}

impl AccumulatorConfig {
    /// Checks the configuration can drive an accumulator.
    pub fn validate(&self) -> Result<(), Error> {
        if self.metric_expiration.is_zero() {
            return Err(Error::InvalidExpiration);
        }
        Ok(())
    }
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            metric_expiration: DEFAULT_METRIC_EXPIRATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AccumulatorConfig::default();
        assert_eq!(config.metric_expiration, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_expiration_rejected() {
        let config = AccumulatorConfig {
            metric_expiration: Duration::ZERO,
        };
        assert_eq!(config.validate(), Err(Error::InvalidExpiration));
    }
}
