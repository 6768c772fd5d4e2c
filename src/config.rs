use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Track pairing server configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Read JSON-lines position reports from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<String>,

    /// Maximum time between consecutive points of one track (seconds).
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_MAX_POINT_GAP_SECS)]
    pub max_point_gap: u64,

    /// Maximum duration of a single track before it is force-closed (seconds).
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_MAX_TRACK_AGE_SECS)]
    pub max_track_age: u64,

    /// Maximum horizontal jump between consecutive points of one track (NM).
    #[arg(long, value_name = "NM", default_value_t = DEFAULT_MAX_DISTANCE_NM)]
    pub max_distance_nm: f64,

    /// Sliding window in which points may be paired (seconds).
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_PAIRING_WINDOW_SECS)]
    pub pairing_window: u64,

    /// Horizontal component of the pairing threshold (NM).
    #[arg(long, value_name = "NM", default_value_t = DEFAULT_PAIRING_DISTANCE_NM)]
    pub pairing_distance_nm: f64,

    /// Time component of the pairing threshold (seconds).
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIME_PENALTY_SECS)]
    pub time_penalty: f64,

    /// Weight of elapsed seconds in the space-time distance.
    #[arg(long, default_value_t = DEFAULT_TIME_COEF)]
    pub time_coef: f64,

    /// Weight of horizontal feet in the space-time distance.
    #[arg(long, default_value_t = DEFAULT_DISTANCE_COEF)]
    pub distance_coef: f64,

    /// Only pair points whose altitudes differ by at most this many feet.
    #[arg(long, value_name = "FEET")]
    pub max_vertical_separation_ft: Option<f64>,

    /// Out-of-orderness absorbed before points reach the assembler (seconds).
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_MAX_LAG_SECS)]
    pub max_lag: u64,

    /// Capacity of each lane's input queue.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Write only track pairs to stdout, not every closed track.
    #[arg(long, default_value_t = false)]
    pub pairs_only: bool,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Engine settings described by the command line
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            buffer: BufferConfig {
                max_lag: Duration::from_secs(self.max_lag),
            },
            assembler: AssemblerConfig {
                max_distance_nm: self.max_distance_nm,
                max_point_gap: Duration::from_secs(self.max_point_gap),
                max_track_age: Duration::from_secs(self.max_track_age),
            },
            pairing: PairingConfig {
                window: Duration::from_secs(self.pairing_window),
                pairing_distance_nm: self.pairing_distance_nm,
                time_penalty_secs: self.time_penalty,
                time_coef: self.time_coef,
                distance_coef: self.distance_coef,
                max_vertical_separation_ft: self.max_vertical_separation_ft,
            },
        }
    }
}

/// Settings for one buffer→assembler→pairer lane
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub buffer: BufferConfig,
    pub assembler: AssemblerConfig,
    pub pairing: PairingConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.assembler.validate()?;
        self.pairing.validate()
    }
}

/// Time-ordering buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Points are held until the newest point is at least this much later.
    /// Zero passes points straight through.
    pub max_lag: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            max_lag: Duration::from_secs(DEFAULT_MAX_LAG_SECS),
        }
    }
}

/// Track assembler gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub max_distance_nm: f64,
    pub max_point_gap: Duration,
    pub max_track_age: Duration,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            max_distance_nm: DEFAULT_MAX_DISTANCE_NM,
            max_point_gap: Duration::from_secs(DEFAULT_MAX_POINT_GAP_SECS),
            max_track_age: Duration::from_secs(DEFAULT_MAX_TRACK_AGE_SECS),
        }
    }
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_number("max_distance_nm", self.max_distance_nm)?;
        check_duration("max_point_gap", self.max_point_gap)?;
        check_duration("max_track_age", self.max_track_age)
    }
}

/// Point-pair finder and pairer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Only points at most this far apart in time are compared
    pub window: Duration,
    pub pairing_distance_nm: f64,
    pub time_penalty_secs: f64,
    pub time_coef: f64,
    pub distance_coef: f64,
    /// Altitude gate layered on top of the space-time metric
    pub max_vertical_separation_ft: Option<f64>,
}

impl Default for PairingConfig {
    fn default() -> Self {
        PairingConfig {
            window: Duration::from_secs(DEFAULT_PAIRING_WINDOW_SECS),
            pairing_distance_nm: DEFAULT_PAIRING_DISTANCE_NM,
            time_penalty_secs: DEFAULT_TIME_PENALTY_SECS,
            time_coef: DEFAULT_TIME_COEF,
            distance_coef: DEFAULT_DISTANCE_COEF,
            max_vertical_separation_ft: None,
        }
    }
}

impl PairingConfig {
    /// Combined space-time distance below which two points are "close"
    pub fn threshold(&self) -> f64 {
        self.time_coef * self.time_penalty_secs
            + self.distance_coef * self.pairing_distance_nm * FEET_PER_NM
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_duration("pairing window", self.window)?;
        check_number("pairing_distance_nm", self.pairing_distance_nm)?;
        check_number("time_penalty_secs", self.time_penalty_secs)?;
        check_number("time_coef", self.time_coef)?;
        check_number("distance_coef", self.distance_coef)?;
        if let Some(ft) = self.max_vertical_separation_ft {
            check_number("max_vertical_separation_ft", ft)?;
        }
        Ok(())
    }
}

fn check_duration(name: &'static str, d: Duration) -> Result<(), ConfigError> {
    if d.is_zero() {
        return Err(ConfigError::ZeroDuration { name });
    }
    Ok(())
}

fn check_number(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidNumber { name, value });
    }
    Ok(())
}
