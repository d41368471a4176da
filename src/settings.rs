use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Queue ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Controller response latency range, seconds.
    pub min_atc_delay: f64,
    pub max_atc_delay: f64,
    /// Minimum on-air time before a transmission counts as finished when the
    /// player cannot report playback state.
    pub transmission_floor: f64,
    /// Delivered transmissions kept for display.
    pub log_size: usize,
    pub seed: Option<u64>,
}

impl QueueSettings {
    /// The delay range must be sampleable: finite, non-negative, min <= max.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_atc_delay.is_finite() && self.min_atc_delay >= 0.0) {
            return Err(invalid("queue.min_atc_delay", "must be >= 0"));
        }
        if !self.max_atc_delay.is_finite() || self.max_atc_delay < self.min_atc_delay {
            return Err(invalid(
                "queue.max_atc_delay",
                "must be >= queue.min_atc_delay",
            ));
        }
        if !(self.transmission_floor.is_finite() && self.transmission_floor >= 0.0) {
            return Err(invalid("queue.transmission_floor", "must be >= 0"));
        }
        Ok(())
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            min_atc_delay: 2.0,
            max_atc_delay: 10.0,
            transmission_floor: 1.5,
            log_size: 50,
            seed: None,
        }
    }
}

// ── Readback ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadbackSettings {
    pub history_len: usize,
    /// Channel hold after a pilot readback, seconds.
    pub pilot_post_delay: f64,
}

impl Default for ReadbackSettings {
    fn default() -> Self {
        Self {
            history_len: 3,
            pilot_post_delay: 2.0,
        }
    }
}

// ── Taxi ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxiSettings {
    /// Distance to the leg's end waypoint that counts as "arrived", meters.
    pub advance_distance_m: f64,
}

impl Default for TaxiSettings {
    fn default() -> Self {
        Self {
            advance_distance_m: 100.0,
        }
    }
}

// ── Top level ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    pub callsign: String,
    pub airport: String,
    pub tower_frequency: String,
    /// Voice label attached to pilot transmissions.
    pub voice: Option<String>,
    pub queue: QueueSettings,
    pub readback: ReadbackSettings,
    pub taxi: TaxiSettings,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            callsign: "N1AB".to_string(),
            airport: "KSFO".to_string(),
            tower_frequency: "120.5".to_string(),
            voice: None,
            queue: QueueSettings::default(),
            readback: ReadbackSettings::default(),
            taxi: TaxiSettings::default(),
        }
    }
}

impl RadioSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_toml(&raw)?;
        log::info!("Loaded radio settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let settings: RadioSettings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        if self.readback.history_len == 0 {
            return Err(invalid("readback.history_len", "must be at least 1"));
        }
        if !(self.readback.pilot_post_delay.is_finite() && self.readback.pilot_post_delay >= 0.0) {
            return Err(invalid("readback.pilot_post_delay", "must be >= 0"));
        }
        if !(self.taxi.advance_distance_m.is_finite() && self.taxi.advance_distance_m > 0.0) {
            return Err(invalid("taxi.advance_distance_m", "must be > 0"));
        }
        if self.callsign.trim().is_empty() {
            return Err(invalid("callsign", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
