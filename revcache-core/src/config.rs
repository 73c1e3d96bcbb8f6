use crate::error::{CacheError, Result};
use std::time::Duration;

/// Default bounded wait for the per-key revision lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a [`CacheManager`](crate::CacheManager).
///
/// # Examples
///
/// ```
/// use revcache_core::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new("realms")
///     .with_lock_timeout(Duration::from_millis(500))
///     .with_default_lifespan(Duration::from_secs(3600));
///
/// assert_eq!(config.name, "realms");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache name used in log output
    pub name: String,
    /// Cluster node this cache runs on, used in log output
    pub node: Option<String>,
    /// Maximum wait for the per-key lock in `add_revisioned`
    pub lock_timeout: Duration,
    /// Lifespan applied when `add_revisioned` is called without one
    pub default_lifespan: Option<Duration>,
}

impl CacheConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_default_lifespan(mut self, lifespan: Duration) -> Self {
        self.default_lifespan = Some(lifespan);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CacheError::Configuration(
                "cache name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            node: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            default_lifespan: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert_eq!(config.default_lifespan, None);
        assert_eq!(config.node, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let config = CacheConfig::new("  ");
        assert!(matches!(
            config.validate(),
            Err(CacheError::Configuration(_))
        ));
    }
}
