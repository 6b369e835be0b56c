//! Board to machine coordinate transform.
//!
//! Machine coordinates are relative to the placement origin with Y growing
//! upward. Bottom-side boards are flipped either around the vertical axis
//! (`bot_hflip`) or the horizontal axis (`bot_vflip`) before placement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::parser::board_schema::{AuxOrigin, Board, BoardPosition, Side};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementMode {
    #[default]
    Top,
    BottomHFlip,
    BottomVFlip,
}

impl PlacementMode {
    pub const ALL: [PlacementMode; 3] = [Self::Top, Self::BottomHFlip, Self::BottomVFlip];

    /// Name used in output file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::BottomHFlip => "bot_hflip",
            Self::BottomVFlip => "bot_vflip",
        }
    }

    pub fn side(self) -> Side {
        match self {
            Self::Top => Side::Top,
            Self::BottomHFlip | Self::BottomVFlip => Side::Bottom,
        }
    }
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PlacementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "top" => Ok(Self::Top),
            "bot_hflip" | "bottom_hflip" => Ok(Self::BottomHFlip),
            "bot_vflip" | "bottom_vflip" => Ok(Self::BottomVFlip),
            other => Err(format!("Unknown placement mode: {}", other)),
        }
    }
}

/// Coordinates shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginMode {
    /// Transformed machine coordinates.
    #[default]
    Machine,
    /// Raw board coordinates.
    Board,
}

impl FromStr for OriginMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "machine" | "pnp" => Ok(Self::Machine),
            "board" | "kicad" => Ok(Self::Board),
            other => Err(format!("Unknown origin mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MachinePosition {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosTransform {
    pub mode: PlacementMode,
    pub origin: AuxOrigin,
    /// Board width and height, mm.
    pub width: f64,
    pub height: f64,
    /// Decimal places of the results.
    pub precision: u32,
}

impl PosTransform {
    pub fn new(mode: PlacementMode, board: &Board, precision: u32) -> Self {
        Self {
            mode,
            origin: board.aux_origin,
            width: board.extents.width,
            height: board.extents.height,
            precision,
        }
    }

    /// Machine position of a board position, `offset` being the feeder's
    /// orientation in degrees.
    pub fn apply(&self, pos: &BoardPosition, offset: f64) -> MachinePosition {
        let (ox, oy) = (self.origin.x, self.origin.y);
        let (x, y, rot) = match self.mode {
            PlacementMode::Top => (pos.x - ox, oy - pos.y, pos.rot - offset),
            PlacementMode::BottomHFlip => (self.width - (pos.x - ox), oy - pos.y, 180.0 - pos.rot - offset),
            PlacementMode::BottomVFlip => (pos.x - ox, self.height - oy + pos.y, 180.0 - pos.rot + offset),
        };
        MachinePosition {
            x: round_to(x, self.precision),
            y: round_to(y, self.precision),
            rot: round_to(normalize_rotation(rot), self.precision),
        }
    }

    /// Position as displayed for `origin`: transformed, or the board
    /// coordinates rounded the same way.
    pub fn display(&self, origin: OriginMode, pos: &BoardPosition, offset: f64) -> MachinePosition {
        match origin {
            OriginMode::Machine => self.apply(pos, offset),
            OriginMode::Board => MachinePosition {
                x: round_to(pos.x, self.precision),
                y: round_to(pos.y, self.precision),
                rot: round_to(pos.rot, self.precision),
            },
        }
    }
}

/// Bring a rotation into [-180, 180) with at most one full turn.
pub fn normalize_rotation(rot: f64) -> f64 {
    let mut rot = rot;
    if rot < -180.0 {
        rot += 360.0;
    }
    if rot >= 180.0 {
        rot -= 360.0;
    }
    rot
}

/// Round half up to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor + 0.5).floor() / factor
}
