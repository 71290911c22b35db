//! Engine configuration.

/// Configuration for constructing a [`BTreeEngine`](crate::engine::BTreeEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache budget in bytes. Reserved: the in-memory engine keeps everything
    /// resident, but the value is reported through stats.
    pub cache_size: u64,

    /// Maximum number of sessions registered at once (0 = use the default).
    pub max_sessions: usize,

    /// Whether periodic checkpointing is enabled. Reserved for a durable
    /// backing store.
    pub checkpoint_enabled: bool,
}

/// Default cache budget: 1 GiB.
const DEFAULT_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

/// Default session pool limit.
const DEFAULT_MAX_SESSIONS: usize = 1000;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            max_sessions: DEFAULT_MAX_SESSIONS,
            checkpoint_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache budget in bytes.
    #[must_use]
    pub const fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Sets the maximum number of concurrent sessions.
    #[must_use]
    pub const fn max_sessions(mut self, limit: usize) -> Self {
        self.max_sessions = limit;
        self
    }

    /// Sets whether checkpointing is enabled.
    #[must_use]
    pub const fn checkpoint_enabled(mut self, value: bool) -> Self {
        self.checkpoint_enabled = value;
        self
    }

    /// Returns a copy with zero-valued fields replaced by their defaults.
    ///
    /// The engine applies this at construction so a zeroed config behaves
    /// like the default one.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.max_sessions == 0 {
            config.max_sessions = DEFAULT_MAX_SESSIONS;
        }
        if config.cache_size == 0 {
            config.cache_size = DEFAULT_CACHE_SIZE;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert!(!config.checkpoint_enabled);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .cache_size(1024 * 1024)
            .max_sessions(10)
            .checkpoint_enabled(true);

        assert_eq!(config.cache_size, 1024 * 1024);
        assert_eq!(config.max_sessions, 10);
        assert!(config.checkpoint_enabled);
    }

    #[test]
    fn normalized_fills_zeroes() {
        let config = EngineConfig::new().cache_size(0).max_sessions(0);
        let normalized = config.normalized();

        assert_eq!(normalized.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(normalized.max_sessions, DEFAULT_MAX_SESSIONS);
    }
}
