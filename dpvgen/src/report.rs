//! Assignment cards: one per fiducial, feeder and unassigned bucket, each a
//! small table whose columns depend on the bucket kind.

use serde::Serialize;

use crate::export::{fmt_num, PlacementControls};
use crate::matching::{Assignments, Bucket};
use crate::parser::board_schema::Footprint;
use crate::reference::Feeder;
use crate::transform::{MachinePosition, OriginMode, PosTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Place,
    Id,
    Value,
    Footprint,
    X,
    Y,
    Rot,
    Vision,
    Vacuum,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Place => "Place",
            Column::Id => "Ref",
            Column::Value => "Value",
            Column::Footprint => "Footprint",
            Column::X => "X",
            Column::Y => "Y",
            Column::Rot => "Rot",
            Column::Vision => "Vision",
            Column::Vacuum => "Vacuum",
        }
    }

    pub fn for_bucket(bucket: Bucket) -> &'static [Column] {
        use Column::*;
        match bucket {
            Bucket::Fiducial => &[Id, X, Y],
            Bucket::Unassigned => &[Id, Value, Footprint, X, Y, Rot],
            Bucket::Feeder(_) => &[Place, Id, Value, X, Y, Rot, Vision, Vacuum],
        }
    }

    fn render(self, fp: &Footprint, pos: &MachinePosition, controls: &PlacementControls, feeder: Option<&Feeder>) -> String {
        let flag = |on: bool| (if on { "[x]" } else { "[ ]" }).to_string();
        match self {
            Column::Place => flag(controls.resolve(&fp.reference, feeder).place),
            Column::Id => fp.reference.clone(),
            Column::Value => fp.value.clone(),
            Column::Footprint => fp.footprint.clone(),
            Column::X => fmt_num(pos.x),
            Column::Y => fmt_num(pos.y),
            Column::Rot => format!("{}°", fmt_num(pos.rot)),
            Column::Vision => flag(controls.resolve(&fp.reference, feeder).vision),
            Column::Vacuum => flag(controls.resolve(&fp.reference, feeder).vacuum),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub bucket: Bucket,
    pub title: String,
    /// Feeder note.
    pub description: Option<String>,
    pub orientation: Option<f64>,
    pub nozzle: Option<String>,
    pub vision: Option<bool>,
    pub vacuum: Option<bool>,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl Card {
    pub fn is_unused(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain text rendering with aligned columns.
    pub fn render_text(&self) -> String {
        let mut out = self.title.clone();
        if let Some(desc) = &self.description {
            out.push_str(&format!(": {}", desc));
        }
        let mut extras = Vec::new();
        if let Some(o) = self.orientation {
            extras.push(format!("∠: {}°", fmt_num(o)));
        }
        if let Some(n) = &self.nozzle {
            extras.push(format!("Nozzle: {}", n));
        }
        if self.vision == Some(true) {
            extras.push("vision".to_string());
        }
        if self.vacuum == Some(true) {
            extras.push("vacuum".to_string());
        }
        if !extras.is_empty() {
            out.push_str(&format!("  ({})", extras.join(", ")));
        }
        out.push('\n');

        if self.is_unused() {
            out.push_str("  (no components)\n");
            return out;
        }

        let headers: Vec<&str> = self.columns.iter().map(|c| c.header()).collect();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        push_row(&mut out, &headers, &widths);
        for row in &self.rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            push_row(&mut out, &cells, &widths);
        }
        out
    }
}

fn push_row(out: &mut String, cells: &[&str], widths: &[usize]) {
    let mut line = String::from(" ");
    for (cell, w) in cells.iter().zip(widths) {
        let pad = w.saturating_sub(cell.chars().count());
        line.push_str(&format!(" {}{}", cell, " ".repeat(pad)));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub struct CardOptions {
    pub origin: OriginMode,
    pub show_unused: bool,
}

impl Default for CardOptions {
    fn default() -> Self {
        Self {
            origin: OriginMode::Machine,
            show_unused: false,
        }
    }
}

/// Cards in display order: fiducials, every feeder, unassigned. Empty cards
/// are left out unless `show_unused` is set.
pub fn build_cards(
    assignments: &Assignments<'_>,
    feeders: &[Feeder],
    transform: &PosTransform,
    controls: &PlacementControls,
    options: &CardOptions,
) -> Vec<Card> {
    let buckets = std::iter::once(Bucket::Fiducial)
        .chain((0..feeders.len()).map(Bucket::Feeder))
        .chain(std::iter::once(Bucket::Unassigned));

    buckets
        .map(|bucket| {
            let feeder = match bucket {
                Bucket::Feeder(idx) => feeders.get(idx),
                _ => None,
            };
            make_card(bucket, feeder, assignments.get(bucket), transform, controls, options.origin)
        })
        .filter(|card| options.show_unused || !card.is_unused())
        .collect()
}

fn make_card(
    bucket: Bucket,
    feeder: Option<&Feeder>,
    parts: &[&Footprint],
    transform: &PosTransform,
    controls: &PlacementControls,
    origin: OriginMode,
) -> Card {
    let title = match (bucket, feeder) {
        (Bucket::Feeder(_), Some(f)) => format!("Feeder {}", f.id()),
        (Bucket::Feeder(idx), None) => format!("Feeder #{}", idx),
        (Bucket::Fiducial, _) => "Fiducial".to_string(),
        (Bucket::Unassigned, _) => "Unassigned".to_string(),
    };
    let offset = feeder.map(Feeder::orientation).unwrap_or(0.0);
    let columns = Column::for_bucket(bucket).to_vec();
    let rows = parts
        .iter()
        .map(|fp| {
            let pos = transform.display(origin, &fp.position, offset);
            columns
                .iter()
                .map(|c| c.render(fp, &pos, controls, feeder))
                .collect()
        })
        .collect();

    Card {
        bucket,
        title,
        description: feeder.map(|f| f.note().to_string()).filter(|n| !n.is_empty()),
        orientation: feeder.map(Feeder::orientation),
        nozzle: feeder.and_then(Feeder::nozzle).map(|n| n.to_string()),
        vision: feeder.map(Feeder::vision),
        vacuum: feeder.map(Feeder::vacuum),
        columns,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::matching::assign_components;
    use crate::parser::board_schema::*;
    use crate::reference::Record;
    use crate::transform::PlacementMode;
    use crate::value::tokenize;

    fn part(reference: &str, designator: &str, value: &str, x: f64, y: f64) -> Footprint {
        Footprint {
            reference: reference.to_string(),
            designator: designator.to_string(),
            index: 1,
            value: value.to_string(),
            params: tokenize(value),
            footprint: "R_0402".to_string(),
            side: Side::Top,
            position: BoardPosition { x, y, rot: 0.0 },
        }
    }

    fn setup() -> (Board, Vec<Feeder>) {
        let mut board = Board::default();
        board.aux_origin = AuxOrigin { x: 100.0, y: 100.0, explicit: true };
        board.footprints.insert(part("FID1", "FID", "Fiducial", 101.0, 99.0));
        board.footprints.insert(part("R1", "R", "10k", 110.0, 95.0));
        board.footprints.insert(part("U1", "U", "LM358", 120.0, 90.0));

        let mut record = Record::new();
        record.insert("ID".to_string(), "2".to_string());
        record.insert("Note".to_string(), "10k fp:R_0402".to_string());
        record.insert("Status".to_string(), "6".to_string());
        let mut unused = Record::new();
        unused.insert("ID".to_string(), "3".to_string());
        unused.insert("Note".to_string(), "22k fp:R_0402".to_string());
        let config = MachineConfig::default();
        let feeders = vec![Feeder::from_record(record, &config), Feeder::from_record(unused, &config)];
        (board, feeders)
    }

    #[test]
    fn test_card_order_and_columns() {
        let (board, feeders) = setup();
        let config = MachineConfig::default();
        let a = assign_components(&board, &feeders, Side::Top, &config);
        let t = PosTransform::new(PlacementMode::Top, &board, 2);
        let cards = build_cards(&a, &feeders, &t, &PlacementControls::default(), &CardOptions::default());

        let titles: Vec<_> = cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Fiducial", "Feeder 2", "Unassigned"]);
        assert_eq!(cards[0].columns, vec![Column::Id, Column::X, Column::Y]);
        assert_eq!(cards[1].rows[0], vec!["[x]", "R1", "10k", "10", "5", "-90°", "[x]", "[x]"]);
        assert_eq!(cards[2].rows[0][2], "R_0402");
    }

    #[test]
    fn test_show_unused_and_board_origin() {
        let (board, feeders) = setup();
        let config = MachineConfig::default();
        let a = assign_components(&board, &feeders, Side::Top, &config);
        let t = PosTransform::new(PlacementMode::Top, &board, 2);
        let options = CardOptions {
            origin: OriginMode::Board,
            show_unused: true,
        };
        let cards = build_cards(&a, &feeders, &t, &PlacementControls::default(), &options);
        assert_eq!(cards.len(), 4);
        assert!(cards[2].is_unused());
        assert_eq!(cards[1].rows[0][3], "110");
        assert!(cards[2].render_text().contains("(no components)"));
    }

    #[test]
    fn test_render_text() {
        let (board, feeders) = setup();
        let config = MachineConfig::default();
        let a = assign_components(&board, &feeders, Side::Top, &config);
        let t = PosTransform::new(PlacementMode::Top, &board, 2);
        let cards = build_cards(&a, &feeders, &t, &PlacementControls::default(), &CardOptions::default());
        let text = cards[1].render_text();
        assert!(text.starts_with("Feeder 2: 10k fp:R_0402  (∠: 90°, Nozzle: 1, vision, vacuum)\n"));
        assert!(text.contains("Ref"));
        assert!(text.contains("R1"));
    }
}
