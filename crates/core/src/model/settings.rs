use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("cache freshness must be > 0 seconds")]
    InvalidCacheFreshness,

    #[error("cache capacity must be > 0")]
    InvalidCacheCapacity,

    #[error("cache eviction fraction must be in (0, 1], got {0}")]
    InvalidEvictFraction(f64),

    #[error("minimum turns to complete a session must be >= 1")]
    InvalidMinTurns,
}

/// Tunables for the progress engine.
///
/// Trend thresholds are fixed constants in `progress::trend`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    cache_freshness: Duration,
    cache_max_entries: usize,
    cache_evict_fraction: f64,
    min_turns_to_complete: u32,
}

impl EngineSettings {
    /// Creates validated engine settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range.
    pub fn new(
        cache_freshness: Duration,
        cache_max_entries: usize,
        cache_evict_fraction: f64,
        min_turns_to_complete: u32,
    ) -> Result<Self, SettingsError> {
        if cache_freshness <= Duration::zero() {
            return Err(SettingsError::InvalidCacheFreshness);
        }
        if cache_max_entries == 0 {
            return Err(SettingsError::InvalidCacheCapacity);
        }
        if !(cache_evict_fraction > 0.0 && cache_evict_fraction <= 1.0) {
            return Err(SettingsError::InvalidEvictFraction(cache_evict_fraction));
        }
        if min_turns_to_complete == 0 {
            return Err(SettingsError::InvalidMinTurns);
        }
        Ok(Self {
            cache_freshness,
            cache_max_entries,
            cache_evict_fraction,
            min_turns_to_complete,
        })
    }

    /// Cached progress stays fresh for this long; entries older than twice
    /// this are purged on write.
    #[must_use]
    pub fn cache_freshness(&self) -> Duration {
        self.cache_freshness
    }

    #[must_use]
    pub fn cache_max_entries(&self) -> usize {
        self.cache_max_entries
    }

    #[must_use]
    pub fn cache_evict_fraction(&self) -> f64 {
        self.cache_evict_fraction
    }

    #[must_use]
    pub fn min_turns_to_complete(&self) -> u32 {
        self.min_turns_to_complete
    }
}

impl Default for EngineSettings {
    /// 5 minute freshness, 1000 cached users, evict the oldest 20%, 1 turn to complete.
    fn default() -> Self {
        Self {
            cache_freshness: Duration::minutes(5),
            cache_max_entries: 1000,
            cache_evict_fraction: 0.2,
            min_turns_to_complete: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let d = EngineSettings::default();
        let rebuilt = EngineSettings::new(
            d.cache_freshness(),
            d.cache_max_entries(),
            d.cache_evict_fraction(),
            d.min_turns_to_complete(),
        )
        .unwrap();
        assert_eq!(rebuilt, d);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let five = Duration::minutes(5);
        assert_eq!(
            EngineSettings::new(Duration::zero(), 10, 0.2, 1).unwrap_err(),
            SettingsError::InvalidCacheFreshness
        );
        assert_eq!(
            EngineSettings::new(five, 0, 0.2, 1).unwrap_err(),
            SettingsError::InvalidCacheCapacity
        );
        assert!(matches!(
            EngineSettings::new(five, 10, 1.5, 1),
            Err(SettingsError::InvalidEvictFraction(_))
        ));
        assert!(matches!(
            EngineSettings::new(five, 10, f64::NAN, 1),
            Err(SettingsError::InvalidEvictFraction(_))
        ));
        assert_eq!(
            EngineSettings::new(five, 10, 0.2, 0).unwrap_err(),
            SettingsError::InvalidMinTurns
        );
    }
}
