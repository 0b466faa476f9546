use std::time::Duration;

/// Engine tuning. Constructed once per process and handed to
/// `AvailabilityEngine::new`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a cached availability tree stays live without invalidation.
    pub cache_ttl: Duration,
    /// Deadline for any single persistence call. A timed-out read fails the
    /// availability check closed.
    pub persistence_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            persistence_timeout: Duration::from_secs(2),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: env_ms("STAYD_CACHE_TTL_MS").unwrap_or(defaults.cache_ttl),
            persistence_timeout: env_ms("STAYD_PERSISTENCE_TIMEOUT_MS")
                .unwrap_or(defaults.persistence_timeout),
        }
    }
}

fn env_ms(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}
