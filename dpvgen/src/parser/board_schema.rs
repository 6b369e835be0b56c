//! Board Schema Definitions
//!
//! Typed view of the parts of a KiCad board file that matter for placement:
//! outline extents, placement origin and surface-mount footprints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::value::ValueToken;

/// Board file content reduced to what placement needs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Board {
    pub filename: String,
    pub version: Option<u64>,
    pub extents: BoardExtents,
    pub aux_origin: AuxOrigin,
    pub footprints: FootprintCollection,
    pub warnings: Vec<BoardWarning>,
}

/// Point in board coordinates (mm, Y grows downward).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box of the board outline.
///
/// `lower_left` holds the smallest X and the largest Y, since board Y grows
/// downward.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BoardExtents {
    pub lower_left: Point,
    pub upper_right: Point,
    pub width: f64,
    pub height: f64,
}

/// Reference point for all machine coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct AuxOrigin {
    pub x: f64,
    pub y: f64,
    /// Declared as `aux_axis_origin` rather than taken from the outline.
    pub explicit: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Top => write!(f, "top"),
            Side::Bottom => write!(f, "bot"),
        }
    }
}

/// Position and rotation of a footprint as written in the board file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct BoardPosition {
    pub x: f64,
    pub y: f64,
    /// Degrees, counter-clockwise.
    pub rot: f64,
}

/// Placeable SMD component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Footprint {
    pub reference: String,
    /// Letter group of the reference, e.g. `C` for `C12`.
    pub designator: String,
    /// Numeric suffix of the reference, e.g. `12` for `C12`.
    pub index: u32,
    pub value: String,
    pub params: Vec<ValueToken>,
    /// Library footprint name without the library prefix.
    pub footprint: String,
    pub side: Side,
    pub position: BoardPosition,
}

/// Components of one designator letter group, addressed by index.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DesignatorGroup {
    pub designator: String,
    pub parts: BTreeMap<u32, Footprint>,
}

/// All footprints grouped by designator, groups in first-seen order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FootprintCollection {
    groups: Vec<DesignatorGroup>,
}

impl FootprintCollection {
    /// Insert a footprint; an existing entry with the same reference is
    /// replaced and returned.
    pub fn insert(&mut self, footprint: Footprint) -> Option<Footprint> {
        let pos = match self
            .groups
            .iter()
            .position(|g| g.designator == footprint.designator)
        {
            Some(pos) => pos,
            None => {
                self.groups.push(DesignatorGroup {
                    designator: footprint.designator.clone(),
                    parts: BTreeMap::new(),
                });
                self.groups.len() - 1
            }
        };
        self.groups[pos].parts.insert(footprint.index, footprint)
    }

    pub fn get(&self, designator: &str, index: u32) -> Option<&Footprint> {
        self.group(designator)?.parts.get(&index)
    }

    pub fn contains(&self, designator: &str, index: u32) -> bool {
        self.get(designator, index).is_some()
    }

    pub fn group(&self, designator: &str) -> Option<&DesignatorGroup> {
        self.groups.iter().find(|g| g.designator == designator)
    }

    pub fn groups(&self) -> &[DesignatorGroup] {
        &self.groups
    }

    /// Every footprint: group order, then ascending index.
    pub fn iter(&self) -> impl Iterator<Item = &Footprint> + '_ {
        self.groups.iter().flat_map(|g| g.parts.values())
    }

    pub fn on_side(&self, side: Side) -> impl Iterator<Item = &Footprint> + '_ {
        self.iter().filter(move |fp| fp.side == side)
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.parts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-fatal findings while building the board model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BoardWarning {
    UnsupportedVersion { found: u64, min: u64, max: u64 },
    MissingVersion,
    NoOutline,
    BadReference(String),
}

impl fmt::Display for BoardWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardWarning::UnsupportedVersion { found, min, max } => {
                if min == max {
                    write!(f, "board format version {} differs from supported version {}", found, min)
                } else {
                    write!(f, "board format version {} outside supported range {}..={}", found, min, max)
                }
            }
            BoardWarning::MissingVersion => write!(f, "board file declares no format version"),
            BoardWarning::NoOutline => write!(f, "no board outline found, extents are zero"),
            BoardWarning::BadReference(r) => {
                write!(f, "footprint reference {:?} has no designator/index, skipped", r)
            }
        }
    }
}

impl Board {
    pub fn version_ok(&self) -> bool {
        !self.warnings.iter().any(|w| {
            matches!(w, BoardWarning::UnsupportedVersion { .. } | BoardWarning::MissingVersion)
        })
    }
}
