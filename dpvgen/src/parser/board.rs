//! KiCad Board Model Builder
//!
//! Walks the parsed S-expression tree of a `.kicad_pcb` file and extracts:
//! - outline extents from `gr_line`/`gr_rect` items on the outline layer
//! - the placement origin from `(setup (aux_axis_origin x y))`
//! - every SMD footprint with reference, value, package, side and position
//!
//! Only a structural parse failure is an error. Everything else degrades to
//! defaults and is reported through [`Board::warnings`].

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::config::MachineConfig;
use crate::parser::board_schema::*;
use crate::parser::sexp::{self, Node, ParseError};
use crate::value::tokenize;

static RE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D+)(\d+)").expect("reference pattern"));

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct BoardParser;

impl BoardParser {
    /// Read and parse a board file from disk.
    pub fn parse_board(path: &Path, config: &MachineConfig) -> Result<Board, BoardError> {
        let content = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Self::parse_board_str(&content, &filename, config)
    }

    pub fn parse_board_str(
        content: &str,
        filename: &str,
        config: &MachineConfig,
    ) -> Result<Board, BoardError> {
        let root = sexp::parse(content)?;
        Ok(Self::from_root(&root, filename, config))
    }

    /// Build the board model from an already parsed tree.
    pub fn from_root(root: &Node, filename: &str, config: &MachineConfig) -> Board {
        let mut warnings = Vec::new();

        let version = Self::extract_version(root);
        match version {
            Some(found) if !config.version_supported(found) => {
                let (min, max) = config.supported_versions;
                tracing::warn!("Board {} has format version {}, supported {}..={}", filename, found, min, max);
                warnings.push(BoardWarning::UnsupportedVersion { found, min, max });
            }
            Some(_) => {}
            None => {
                tracing::warn!("Board {} declares no format version", filename);
                warnings.push(BoardWarning::MissingVersion);
            }
        }

        let extents = match Self::extract_extents(root, &config.outline_layer) {
            Some(extents) => extents,
            None => {
                tracing::warn!("Board {} has no outline on {}", filename, config.outline_layer);
                warnings.push(BoardWarning::NoOutline);
                BoardExtents::default()
            }
        };

        let aux_origin = Self::extract_aux_origin(root).unwrap_or(AuxOrigin {
            x: extents.lower_left.x,
            y: extents.lower_left.y,
            explicit: false,
        });

        let mut footprints = FootprintCollection::default();
        let items = root.as_list().unwrap_or(&[]);
        for item in items.iter().filter(|i| i.is("footprint") || i.is("module")) {
            if !Self::is_smd(item) {
                continue;
            }
            match Self::parse_footprint(item, &config.top_layer) {
                Ok(fp) => {
                    if let Some(old) = footprints.insert(fp) {
                        tracing::debug!("Footprint {} appears twice, keeping the last one", old.reference);
                    }
                }
                Err(reference) => {
                    tracing::warn!("Skipping footprint with reference {:?}", reference);
                    warnings.push(BoardWarning::BadReference(reference));
                }
            }
        }

        tracing::debug!(
            "Board {}: {} SMD footprints, {} x {} mm, origin ({}, {}){}",
            filename,
            footprints.len(),
            extents.width,
            extents.height,
            aux_origin.x,
            aux_origin.y,
            if aux_origin.explicit { " explicit" } else { "" }
        );

        Board {
            filename: filename.to_string(),
            version,
            extents,
            aux_origin,
            footprints,
            warnings,
        }
    }

    fn extract_version(root: &Node) -> Option<u64> {
        let version = root.get("version")?.number_at(1)?;
        if version >= 0.0 && version.fract() == 0.0 {
            Some(version as u64)
        } else {
            None
        }
    }

    fn extract_extents(root: &Node, outline_layer: &str) -> Option<BoardExtents> {
        let mut lower_left = Point::new(f64::INFINITY, f64::NEG_INFINITY);
        let mut upper_right = Point::new(f64::NEG_INFINITY, f64::INFINITY);
        let mut found = false;

        root.walk(&mut |node| {
            if !(node.is("gr_line") || node.is("gr_rect")) || !Self::on_layer(node, outline_layer) {
                return;
            }
            for corner in [Self::parse_xy(node, "start"), Self::parse_xy(node, "end")]
                .into_iter()
                .flatten()
            {
                lower_left.x = lower_left.x.min(corner.x);
                lower_left.y = lower_left.y.max(corner.y);
                upper_right.x = upper_right.x.max(corner.x);
                upper_right.y = upper_right.y.min(corner.y);
                found = true;
            }
        });

        if !found {
            return None;
        }
        Some(BoardExtents {
            lower_left,
            upper_right,
            width: round3(upper_right.x - lower_left.x),
            height: round3(lower_left.y - upper_right.y),
        })
    }

    fn extract_aux_origin(root: &Node) -> Option<AuxOrigin> {
        let aux = root.get("setup")?.get("aux_axis_origin")?;
        Some(AuxOrigin {
            x: aux.number_at(1)?,
            y: aux.number_at(2)?,
            explicit: true,
        })
    }

    fn is_smd(footprint: &Node) -> bool {
        footprint
            .get_all("attr")
            .any(|attr| attr.item(1).and_then(Node::as_symbol) == Some("smd"))
    }

    /// Parse one SMD footprint. On failure returns the offending reference.
    fn parse_footprint(sexp: &Node, top_layer: &str) -> Result<Footprint, String> {
        let reference = Self::text_field(sexp, "reference", "Reference").unwrap_or_default();
        let value = Self::text_field(sexp, "value", "Value").unwrap_or_default();

        let (designator, index) = match RE_REFERENCE.captures(&reference) {
            Some(caps) => {
                let index = caps[2].parse::<u32>().map_err(|_| reference.clone())?;
                (caps[1].to_string(), index)
            }
            None => return Err(reference),
        };

        let lib_id = sexp.item(1).and_then(Node::text).unwrap_or_default();
        let footprint = match lib_id.find(':') {
            Some(colon) => lib_id[colon + 1..].to_string(),
            None => lib_id,
        };

        let side = if Self::on_layer(sexp, top_layer) {
            Side::Top
        } else {
            Side::Bottom
        };

        let position = sexp
            .get("at")
            .map(|at| BoardPosition {
                x: at.number_at(1).unwrap_or(0.0),
                y: at.number_at(2).unwrap_or(0.0),
                rot: at.number_at(3).unwrap_or(0.0),
            })
            .unwrap_or_default();

        Ok(Footprint {
            params: tokenize(&value),
            reference,
            designator,
            index,
            value,
            footprint,
            side,
            position,
        })
    }

    /// `(fp_text <kind> "...")`, or `(property "<name>" "...")` for KiCad 8.
    fn text_field(sexp: &Node, kind: &str, property: &str) -> Option<String> {
        let from_fp_text = sexp
            .get_all("fp_text")
            .find(|t| t.item(1).and_then(Node::as_symbol) == Some(kind))
            .and_then(|t| t.item(2))
            .and_then(Node::text);
        from_fp_text.or_else(|| {
            sexp.get_all("property")
                .find(|p| p.item(1).and_then(Node::text).as_deref() == Some(property))
                .and_then(|p| p.item(2))
                .and_then(Node::text)
        })
    }

    fn on_layer(sexp: &Node, layer: &str) -> bool {
        sexp.get_all("layer")
            .any(|l| l.item(1).and_then(Node::text).as_deref() == Some(layer))
    }

    fn parse_xy(sexp: &Node, key: &str) -> Option<Point> {
        let xy = sexp.get(key)?;
        Some(Point::new(xy.number_at(1)?, xy.number_at(2)?))
    }
}

fn round3(v: f64) -> f64 {
    crate::transform::round_to(v, 3)
}

/// Convenience function for parsing board files with the default config.
pub fn parse_board(path: &Path) -> Result<Board, BoardError> {
    BoardParser::parse_board(path, &MachineConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(content: &str) -> Board {
        BoardParser::parse_board_str(content, "test.kicad_pcb", &MachineConfig::default()).unwrap()
    }

    const OUTLINE: &str = r#"(kicad_pcb (version 20221018) (generator pcbnew)
  (setup (pad_to_mask_clearance 0))
  (gr_line (start 0 0) (end 10 0) (stroke (width 0.1) (type default)) (layer "Edge.Cuts"))
  (gr_line (start 0 0) (end 0 5) (stroke (width 0.1) (type default)) (layer "Edge.Cuts"))
  (gr_line (start -50 -50) (end 80 80) (layer "F.SilkS"))
)"#;

    #[test]
    fn test_extents_from_outline() {
        let board = build(OUTLINE);
        assert_eq!(board.extents.width, 10.0);
        assert_eq!(board.extents.height, 5.0);
        assert_eq!(board.extents.lower_left, Point::new(0.0, 5.0));
        assert_eq!(board.extents.upper_right, Point::new(10.0, 0.0));
        assert!(board.warnings.is_empty());
    }

    #[test]
    fn test_origin_defaults_to_lower_left() {
        let board = build(OUTLINE);
        assert_eq!(board.aux_origin, AuxOrigin { x: 0.0, y: 5.0, explicit: false });
    }

    #[test]
    fn test_explicit_aux_origin() {
        let board = build(
            r#"(kicad_pcb (version 20221018)
  (setup (aux_axis_origin 100 100))
  (gr_rect (start 90 80) (end 130.1234 105) (layer "Edge.Cuts")))"#,
        );
        assert_eq!(board.aux_origin, AuxOrigin { x: 100.0, y: 100.0, explicit: true });
        assert_eq!(board.extents.width, 40.123);
        assert_eq!(board.extents.height, 25.0);
    }

    #[test]
    fn test_footprint_fields() {
        let board = build(
            r#"(kicad_pcb (version 20221018)
  (footprint "Capacitor_SMD:C_0402_1005Metric" (layer "B.Cu")
    (at 110 95 90)
    (attr smd)
    (fp_text reference "C12" (at 0 -1.16) (layer "B.SilkS"))
    (fp_text value "0.1uF 25V" (at 0 1.16) (layer "B.Fab")))
  (footprint "Connector:THT" (layer "F.Cu") (at 1 1) (attr through_hole)
    (fp_text reference "J1" (at 0 0) (layer "F.SilkS"))
    (fp_text value "CONN" (at 0 0) (layer "F.Fab"))))"#,
        );
        assert_eq!(board.footprints.len(), 1);
        let c12 = board.footprints.get("C", 12).unwrap();
        assert_eq!(c12.reference, "C12");
        assert_eq!(c12.footprint, "C_0402_1005Metric");
        assert_eq!(c12.side, Side::Bottom);
        assert_eq!(c12.position, BoardPosition { x: 110.0, y: 95.0, rot: 90.0 });
        assert_eq!(c12.value, "0.1uF 25V");
        assert_eq!(c12.params.len(), 2);
    }

    #[test]
    fn test_kicad8_properties_and_default_rotation() {
        let board = build(
            r#"(kicad_pcb (version 20221018)
  (footprint "R_0402" (layer "F.Cu") (at 5 6) (attr smd)
    (property "Reference" "R7" (at 0 0) (layer "F.SilkS"))
    (property "Value" "10k" (at 0 0) (layer "F.Fab"))))"#,
        );
        let r7 = board.footprints.get("R", 7).unwrap();
        assert_eq!(r7.footprint, "R_0402");
        assert_eq!(r7.side, Side::Top);
        assert_eq!(r7.position.rot, 0.0);
        assert_eq!(r7.value, "10k");
    }

    #[test]
    fn test_bad_reference_is_skipped() {
        let board = build(
            r#"(kicad_pcb (version 20221018)
  (footprint "x:LOGO" (layer "F.Cu") (at 0 0) (attr smd)
    (fp_text reference "LOGO" (at 0 0))
    (fp_text value "x" (at 0 0))))"#,
        );
        assert!(board.footprints.is_empty());
        assert!(board.warnings.contains(&BoardWarning::BadReference("LOGO".to_string())));
    }

    #[test]
    fn test_version_and_outline_warnings() {
        let board = build("(kicad_pcb (version 20211014))");
        assert!(!board.version_ok());
        assert!(board.warnings.contains(&BoardWarning::NoOutline));
        assert_eq!(board.extents, BoardExtents::default());

        let board = build("(kicad_pcb)");
        assert!(board.warnings.contains(&BoardWarning::MissingVersion));
    }

    #[test]
    fn test_structural_error_is_fatal() {
        let result = BoardParser::parse_board_str("(kicad_pcb (version 1)", "x", &MachineConfig::default());
        assert!(matches!(result, Err(BoardError::SExpParse(_))));
    }
}
