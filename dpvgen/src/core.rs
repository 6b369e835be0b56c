//! Session state and file-based conversion shared by the CLI and other
//! front ends.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;

use crate::config::MachineConfig;
use crate::export::{output_file_name, DpvMetadata, DpvWriter, PlacementControls};
use crate::matching::{assign_components, Assignments, Bucket};
use crate::parser::board::{BoardError, BoardParser};
use crate::parser::board_schema::{Board, BoardWarning};
use crate::reference::{Feeder, ReferenceData};
use crate::report::{build_cards, Card, CardOptions};
use crate::transform::{OriginMode, PlacementMode, PosTransform};

#[derive(Debug, thiserror::Error)]
pub enum DpvGenError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Missing input: {0}")]
    MissingInput(String),
}

impl From<BoardError> for DpvGenError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Io(io) => DpvGenError::Io(io),
            other => DpvGenError::Parse(other.to_string()),
        }
    }
}

impl From<crate::parser::sexp::ParseError> for DpvGenError {
    fn from(e: crate::parser::sexp::ParseError) -> Self {
        DpvGenError::Parse(e.to_string())
    }
}

/// Current inputs and selections. Every derived result (assignment, cards,
/// output text) is recomputed from these on request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub config: MachineConfig,
    pub mode: PlacementMode,
    pub origin: OriginMode,
    pub controls: PlacementControls,
    board: Option<Board>,
    reference: Option<ReferenceData>,
}

impl Session {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replace the board. On a parse failure the previous board stays.
    pub fn load_board_str(&mut self, content: &str, filename: &str) -> Result<&Board, DpvGenError> {
        let board = BoardParser::parse_board_str(content, filename, &self.config)?;
        self.controls = PlacementControls::default();
        Ok(self.board.insert(board))
    }

    pub fn load_board(&mut self, path: &Path) -> Result<&Board, DpvGenError> {
        let content = std::fs::read_to_string(path)?;
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.load_board_str(&content, filename)
    }

    pub fn load_reference_str(&mut self, content: &str, filename: Option<&str>) -> &ReferenceData {
        let reference = ReferenceData::parse(content, filename, &self.config);
        self.reference.insert(reference)
    }

    pub fn load_reference(&mut self, path: &Path) -> Result<&ReferenceData, DpvGenError> {
        let reference = ReferenceData::from_file(path, &self.config)?;
        Ok(self.reference.insert(reference))
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn reference(&self) -> Option<&ReferenceData> {
        self.reference.as_ref()
    }

    pub fn feeders(&self) -> &[Feeder] {
        self.reference.as_ref().map(|r| r.feeders.as_slice()).unwrap_or(&[])
    }

    pub fn transform(&self) -> Option<PosTransform> {
        let board = self.board.as_ref()?;
        Some(PosTransform::new(self.mode, board, self.config.precision))
    }

    /// Assignment for the active side; empty without a board.
    pub fn assignments(&self) -> Assignments<'_> {
        match &self.board {
            Some(board) => assign_components(board, self.feeders(), self.mode.side(), &self.config),
            None => Assignments::default(),
        }
    }

    pub fn cards(&self, show_unused: bool) -> Vec<Card> {
        let Some(transform) = self.transform() else {
            return Vec::new();
        };
        let options = CardOptions {
            origin: self.origin,
            show_unused,
        };
        build_cards(&self.assignments(), self.feeders(), &transform, &self.controls, &options)
    }

    /// True once at least one component has a feeder.
    pub fn can_export(&self) -> bool {
        self.assignments().has_feeder_assignments()
    }

    /// Suggested output file name for the active mode.
    pub fn output_file_name(&self) -> Option<String> {
        let board = self.board.as_ref()?;
        Some(output_file_name(&board.filename, self.mode.name()))
    }

    /// Render the placement program.
    pub fn render_dpv(&self, file_name: &str, timestamp: NaiveDateTime) -> Result<String, DpvGenError> {
        let board = self
            .board
            .as_ref()
            .ok_or_else(|| DpvGenError::MissingInput("no board loaded".to_string()))?;
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| DpvGenError::MissingInput("no reference file loaded".to_string()))?;

        let assignments = self.assignments();
        let writer = DpvWriter {
            reference,
            assignments: &assignments,
            transform: PosTransform::new(self.mode, board, self.config.precision),
            controls: &self.controls,
        };
        let meta = DpvMetadata {
            file_name: file_name.to_string(),
            pcb_file: board.filename.clone(),
            timestamp,
        };
        tracing::info!("Generating {} for {} ({})", file_name, board.filename, self.mode);
        Ok(writer.render(&meta))
    }

    pub fn summary(&self) -> ConversionSummary {
        let assignments = self.assignments();
        let mut summary = ConversionSummary::default();
        for (idx, parts) in assignments.by_feeder() {
            let feeder = self.feeders().get(idx);
            for fp in parts {
                if self.controls.resolve(&fp.reference, feeder).place {
                    summary.placed += 1;
                } else {
                    summary.excluded += 1;
                }
            }
        }
        summary.fiducials = assignments.fiducials().len();
        summary.unassigned = assignments.unassigned().iter().map(|fp| fp.reference.clone()).collect();
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub placed: usize,
    pub excluded: usize,
    pub fiducials: usize,
    pub unassigned: Vec<String>,
}

/// Result of a one-shot conversion.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub file_name: String,
    pub text: String,
    pub summary: ConversionSummary,
    /// `exclude` entries that matched no component with a feeder.
    pub unused_exclusions: Vec<String>,
    pub warnings: Vec<BoardWarning>,
}

/// Options for a one-shot conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub mode: PlacementMode,
    /// References not to place.
    pub exclude: Vec<String>,
    pub vacuum: Option<bool>,
    pub vision: Option<bool>,
    /// Output file name written into the header; defaults to the board
    /// name with the mode suffix.
    pub file_name: Option<String>,
    /// Defaults to the current local time.
    pub timestamp: Option<NaiveDateTime>,
}

pub struct DpvGenCore;

impl DpvGenCore {
    pub fn convert(
        board_path: &Path,
        reference_path: &Path,
        options: &ConvertOptions,
        config: &MachineConfig,
    ) -> Result<ConversionResult, DpvGenError> {
        let mut session = Session::new(config.clone());
        session.mode = options.mode;
        session.load_board(board_path)?;
        session.load_reference(reference_path)?;

        session.controls.vacuum = options.vacuum;
        session.controls.vision = options.vision;
        let mut unused_exclusions = Vec::new();
        {
            let assignments = session.assignments();
            let mut controls = session.controls.clone();
            for reference in &options.exclude {
                match assignments.bucket_of(reference) {
                    Some(Bucket::Feeder(idx)) => {
                        controls.exclude(reference, session.feeders().get(idx));
                        continue;
                    }
                    Some(Bucket::Fiducial) => {
                        tracing::warn!("Excluded component {} is a fiducial, ignoring", reference)
                    }
                    Some(Bucket::Unassigned) => {
                        tracing::warn!("Excluded component {} has no feeder, ignoring", reference)
                    }
                    None => tracing::warn!(
                        "Excluded component {} is not on the {} side",
                        reference,
                        session.mode.side()
                    ),
                }
                unused_exclusions.push(reference.clone());
            }
            session.controls = controls;
        }

        if !session.can_export() {
            tracing::warn!("No component of {} has a feeder", board_path.display());
        }

        let file_name = match &options.file_name {
            Some(name) => name.clone(),
            None => session
                .output_file_name()
                .ok_or_else(|| DpvGenError::MissingInput("no board loaded".to_string()))?,
        };
        let timestamp = options.timestamp.unwrap_or_else(|| Local::now().naive_local());
        let text = session.render_dpv(&file_name, timestamp)?;

        Ok(ConversionResult {
            file_name,
            text,
            summary: session.summary(),
            unused_exclusions,
            warnings: session.board().map(|b| b.warnings.clone()).unwrap_or_default(),
        })
    }
}

/// A board file found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct BoardFile {
    pub path: PathBuf,
    pub modified: Option<DateTime<Local>>,
}

/// Recursively discover KiCad board files, newest first.
pub fn discover_board_files(dir: &Path) -> Result<Vec<BoardFile>, DpvGenError> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<BoardFile>, depth: usize) -> Result<(), DpvGenError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "target" || name.ends_with("-backups") {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("kicad_pcb") {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Local>::from);
            files.push(BoardFile { path, modified });
        }
    }
    Ok(())
}
