//! # Configuration
//!
//! Runtime policy for the fare core, read from TOML. Every field has a default, so an empty
//! file (or no file at all) yields a working configuration.
//!
//! ```toml
//! max_trip_duration_secs = 7200
//! abandoned_penalty = 5.00
//! route_policy = "directed"
//! ```

use crate::model::RoutePolicy;
use crate::money::Money;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FareConfig {
    /// Age after which an ongoing trip is swept as abandoned.
    pub max_trip_duration_secs: u64,
    pub sweep_interval_secs: u64,
    /// Charged when a trip is abandoned. Not scaled by card type.
    pub abandoned_penalty: Option<Money>,
    /// Fare for exiting at the entry station.
    pub same_station_fare: Money,
    /// How far below zero a debit may take a balance.
    pub overdraft_allowance: Money,
    pub route_policy: RoutePolicy,
    /// Reload-and-retry attempts after a store version conflict.
    pub max_conflict_retries: u32,
    /// An exit-station tap within this window of the last exit is a duplicate.
    pub duplicate_tap_window_secs: u64,
    /// Number of processed tap keys remembered per card.
    pub recent_tap_capacity: usize,
    /// Reactivate a card blocked for an unpaid fare once a credit clears its debt.
    pub unblock_on_recharge: bool,
    pub mailbox_capacity: usize,
    /// Idle card actors close after this long. `0` keeps them alive.
    pub actor_idle_secs: u64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            max_trip_duration_secs: 7200,
            sweep_interval_secs: 60,
            abandoned_penalty: None,
            same_station_fare: Money::ZERO,
            overdraft_allowance: Money::ZERO,
            route_policy: RoutePolicy::Symmetric,
            max_conflict_retries: 3,
            duplicate_tap_window_secs: 30,
            recent_tap_capacity: 16,
            unblock_on_recharge: true,
            mailbox_capacity: 32,
            actor_idle_secs: 300,
        }
    }
}

impl FareConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: FareConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let money = [
            ("same_station_fare", Some(self.same_station_fare)),
            ("overdraft_allowance", Some(self.overdraft_allowance)),
            ("abandoned_penalty", self.abandoned_penalty),
        ];
        for (field, value) in money {
            if value.is_some_and(|m| m.is_negative()) {
                return Err(ConfigError::Invalid(format!("{field} must not be negative")));
            }
        }
        let counts = [
            ("max_trip_duration_secs", self.max_trip_duration_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("recent_tap_capacity", self.recent_tap_capacity as u64),
            ("mailbox_capacity", self.mailbox_capacity as u64),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
            }
        }
        Ok(())
    }

    pub fn max_trip_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_trip_duration_secs as i64)
    }

    pub fn duplicate_tap_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duplicate_tap_window_secs as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn actor_idle_timeout(&self) -> Option<Duration> {
        (self.actor_idle_secs > 0).then(|| Duration::from_secs(self.actor_idle_secs))
    }
}
