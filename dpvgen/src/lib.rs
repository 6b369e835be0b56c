//! dpvgen - KiCad board to pick-and-place program converter
//!
//! Reads a KiCad `.kicad_pcb` board and a Charmhigh CHMT36 style `.dpv`
//! reference file, assigns every SMD component of one board side to a feeder
//! and writes a placement program for the machine.
//!
//! # Quick Start
//!
//! ```no_run
//! use dpvgen::{ConvertOptions, DpvGenCore, MachineConfig, PlacementMode};
//! use std::path::Path;
//!
//! let options = ConvertOptions {
//!     mode: PlacementMode::Top,
//!     ..ConvertOptions::default()
//! };
//! let result = DpvGenCore::convert(
//!     Path::new("board.kicad_pcb"),
//!     Path::new("reference.dpv"),
//!     &options,
//!     &MachineConfig::default(),
//! ).unwrap();
//!
//! std::fs::write(&result.file_name, &result.text).unwrap();
//! println!("{} components placed", result.summary.placed);
//! ```
//!
//! # Pipeline
//!
//! - **Parsing**: S-expression tree, then the typed [`Board`]
//! - **Values**: `0.1uF 25V 10%` style strings as comparable tokens
//! - **Reference**: feeder and tray tables of the machine file
//! - **Matching**: first feeder whose note fits the component
//! - **Transform**: board to machine coordinates per side
//! - **Export**: the `.dpv` placement program

pub mod config;
pub mod core;
pub mod export;
pub mod matching;
pub mod parser;
pub mod reference;
pub mod report;
pub mod transform;
pub mod value;

// Re-export main types
pub use crate::config::MachineConfig;
pub use crate::core::{
    discover_board_files, BoardFile, ConversionResult, ConversionSummary, ConvertOptions,
    DpvGenCore, DpvGenError, Session,
};
pub use export::{ComponentControl, DpvMetadata, DpvWriter, PlacementControls, TableRole};
pub use matching::{assign_component, assign_components, Assignments, Bucket};
pub use parser::board::BoardParser;
pub use parser::board_schema::{Board, Footprint, Side};
pub use reference::{Feeder, ReferenceData};
pub use report::{Card, Column};
pub use transform::{OriginMode, PlacementMode, PosTransform};
pub use value::{tokenize, ValueToken};

/// Parse a board file with the default machine config (convenience wrapper).
pub fn parse_board(path: &std::path::Path) -> Result<Board, DpvGenError> {
    BoardParser::parse_board(path, &MachineConfig::default()).map_err(DpvGenError::from)
}

/// Load a reference file with the default machine config (convenience wrapper).
pub fn load_reference(path: &std::path::Path) -> Result<ReferenceData, DpvGenError> {
    ReferenceData::from_file(path, &MachineConfig::default())
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Board, Bucket, DpvGenCore, DpvGenError, MachineConfig, PlacementControls, PlacementMode,
        ReferenceData, Session,
    };
}
