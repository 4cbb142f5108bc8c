use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Limits applied to zip-code searches.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Providers returned per search.
    pub max_providers: usize,
    /// Appointments returned per provider.
    pub max_appointments_per_provider: usize,
    /// Largest accepted search radius.
    pub max_radius_km: f64,
    /// Longest date range a single lookup may span.
    pub max_range_days: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_providers: 20,
            max_appointments_per_provider: 20,
            max_radius_km: 50.0,
            max_range_days: 14,
        }
    }
}

/// Booking engine configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub search: SearchSettings,
    /// How long a day's appointments are kept after the day ends.
    pub retention: TimeDelta,
    /// Root keys a provider's registration must chain back to before its
    /// appointments are bookable or listed.
    pub root_keys: Vec<Vec<u8>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            retention: TimeDelta::days(7),
            root_keys: Vec::new(),
        }
    }
}
