//! Machine-wide settings.
//!
//! Defaults describe a Charmhigh CHMT36 fed from the stock feeder layout:
//!
//! ```text
//!  1-29  left side reels (8/12/16/24 mm)
//! 60-73  front bulk IC tray
//! 74-79  vibration feeders
//! 80-99  IC trays
//! ```
//!
//! Reels present parts a quarter turn away from their tape orientation, so
//! feeders below `reel_id_limit` get `reel_orientation` unless the feeder
//! note overrides it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::DpvGenError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MachineConfig {
    /// Nozzle used when a feeder note does not name one (`nozzle:2`).
    pub default_nozzle: u32,
    /// Default orientation offset in degrees for reel feeders.
    pub reel_orientation: f64,
    /// Feeder IDs below this are reels. A blank ID counts as 0.
    pub reel_id_limit: u32,
    /// Inclusive range of KiCad board format versions known to work.
    pub supported_versions: (u64, u64),
    /// Component value that marks a fiducial.
    pub fiducial_value: String,
    pub outline_layer: String,
    pub top_layer: String,
    /// Decimal places for machine coordinates.
    pub precision: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            default_nozzle: 1,
            reel_orientation: 90.0,
            reel_id_limit: 60,
            supported_versions: (20221018, 20221018),
            fiducial_value: "Fiducial".to_string(),
            outline_layer: "Edge.Cuts".to_string(),
            top_layer: "F.Cu".to_string(),
            precision: 2,
        }
    }
}

impl MachineConfig {
    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, DpvGenError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, DpvGenError> {
        serde_json::from_str(content)
            .map_err(|e| DpvGenError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    pub fn version_supported(&self, version: u64) -> bool {
        let (min, max) = self.supported_versions;
        version >= min && version <= max
    }

    /// Default orientation offset for a feeder ID.
    pub fn default_orientation(&self, feeder_id: Option<f64>) -> f64 {
        match feeder_id {
            Some(id) if id < self.reel_id_limit as f64 => self.reel_orientation,
            _ => 0.0,
        }
    }
}
