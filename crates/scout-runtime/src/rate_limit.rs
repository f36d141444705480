//! Per-source request pacing.
//!
//! Each source gets its own direct `governor` limiter built from
//! [`SourceConfig::rate_limit`] (requests per minute, burst equal to the
//! per-minute allowance). Sources without a limit are never delayed.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use scout_types::SourceConfig;
use tracing::trace;

#[derive(Default)]
pub struct SourceRateLimiter {
    limiters: HashMap<String, DefaultDirectRateLimiter>,
}

impl SourceRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiters for every enabled source in `configs`.
    pub fn from_configs(configs: &BTreeMap<String, SourceConfig>) -> Self {
        let mut limiter = Self::new();
        for (source, cfg) in configs.iter().filter(|(_, c)| c.enabled) {
            limiter.set_limit(source, cfg.rate_limit);
        }
        limiter
    }

    /// Limit `source` to `per_minute` requests; zero removes the limit.
    pub fn set_limit(&mut self, source: &str, per_minute: u32) {
        match NonZeroU32::new(per_minute) {
            Some(n) => {
                self.limiters
                    .insert(source.to_string(), RateLimiter::direct(Quota::per_minute(n)));
            }
            None => {
                self.limiters.remove(source);
            }
        }
    }

    pub fn is_limited(&self, source: &str) -> bool {
        self.limiters.contains_key(source)
    }

    /// Take a permit for `source` without waiting.
    pub fn try_acquire(&self, source: &str) -> bool {
        self.limiters
            .get(source)
            .is_none_or(|l| l.check().is_ok())
    }

    /// Wait until `source` may be queried again.
    pub async fn until_ready(&self, source: &str) {
        if let Some(limiter) = self.limiters.get(source) {
            limiter.until_ready().await;
            trace!(source, "rate limit permit acquired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_types::SourcePriority;

    fn config(rate_limit: u32, enabled: bool) -> SourceConfig {
        SourceConfig {
            name: "x".to_string(),
            enabled,
            priority: SourcePriority::Medium,
            rate_limit,
            max_results: 10,
            quality_weight: 0.5,
            metadata_fields: Vec::new(),
            search_parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn burst_is_the_per_minute_allowance() {
        let mut limiter = SourceRateLimiter::new();
        limiter.set_limit("github", 3);
        assert!(limiter.try_acquire("github"));
        assert!(limiter.try_acquire("github"));
        assert!(limiter.try_acquire("github"));
        assert!(!limiter.try_acquire("github"));
    }

    #[test]
    fn unknown_and_unlimited_sources_always_pass() {
        let mut limiter = SourceRateLimiter::new();
        limiter.set_limit("web", 0);
        assert!(!limiter.is_limited("web"));
        for _ in 0..100 {
            assert!(limiter.try_acquire("web"));
            assert!(limiter.try_acquire("anything"));
        }
    }

    #[test]
    fn disabled_sources_are_not_limited() {
        let configs = BTreeMap::from([
            ("github".to_string(), config(60, true)),
            ("reddit".to_string(), config(60, false)),
        ]);
        let limiter = SourceRateLimiter::from_configs(&configs);
        assert!(limiter.is_limited("github"));
        assert!(!limiter.is_limited("reddit"));
    }

    #[tokio::test]
    async fn until_ready_returns_immediately_with_permits_left() {
        let mut limiter = SourceRateLimiter::new();
        limiter.set_limit("github", 5);
        limiter.until_ready("github").await;
        limiter.until_ready("unlimited").await;
        assert!(limiter.try_acquire("github"));
    }
}
