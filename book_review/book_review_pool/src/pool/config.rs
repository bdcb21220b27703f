//! Configuration for a resource pool.

use crate::error::PoolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a resource pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourcePoolConfig {
    /// Maximum number of resources alive at the same time
    pub capacity: usize,

    /// Default time to wait for a resource when the pool is fully checked out
    #[serde(rename = "acquire_timeout_ms", with = "duration_ms")]
    pub acquire_timeout: Duration,
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            acquire_timeout: Duration::from_secs(3),
        }
    }
}

impl ResourcePoolConfig {
    /// Create a configuration with the given capacity and the default timeout
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set the default acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Check that the pool can run with this configuration
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity < 1 {
            return Err(PoolError::InvalidConfiguration(format!(
                "capacity must be at least 1, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::ser::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).map_err(|_| {
            S::Error::custom(format!("{:?} does not fit in u64 milliseconds", value))
        })?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ResourcePoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ResourcePoolConfig::with_capacity(0).validate();
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_builder_sets_timeout() {
        let config =
            ResourcePoolConfig::with_capacity(2).acquire_timeout(Duration::from_millis(250));
        assert_eq!(config.capacity, 2);
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
    }
}
