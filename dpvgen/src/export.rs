//! Placement program (`.dpv`) writer.
//!
//! The output repeats every table template of the reference file in its
//! original order. Feeder and tray tables are copied from the reference,
//! component and calibration tables are generated from the assignment.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::matching::Assignments;
use crate::parser::board_schema::Footprint;
use crate::reference::{Feeder, Record, ReferenceData, TableTemplate};
use crate::transform::PosTransform;

pub const CRLF: &str = "\r\n";

/// What a table template is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// Feeders, copied
    Station,
    /// IC trays and cut tapes, copied
    IcTray,
    /// Batch panel with a single board
    PanelCoord,
    /// Components to place
    EComponent,
    /// Calibration mode
    PcbCalib,
    /// Fiducials
    CalibPoint,
    /// Calibration factors, determined on the machine
    CalibFator,
    /// Any other named table, copied
    Other,
}

impl TableRole {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Station" => Self::Station,
            "ICTray" => Self::IcTray,
            "Panel_Coord" => Self::PanelCoord,
            "EComponent" => Self::EComponent,
            "PcbCalib" => Self::PcbCalib,
            "CalibPoint" => Self::CalibPoint,
            "CalibFator" => Self::CalibFator,
            _ => Self::Other,
        }
    }
}

/// Header block values.
#[derive(Debug, Clone, PartialEq)]
pub struct DpvMetadata {
    /// Name of the file being written.
    pub file_name: String,
    /// Name of the board file it was generated from.
    pub pcb_file: String,
    pub timestamp: NaiveDateTime,
}

/// Per component choices made by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentControl {
    pub place: bool,
    pub vacuum: bool,
    pub vision: bool,
}

impl ComponentControl {
    /// `Skip` column bitmask.
    pub fn skip_flags(self) -> u32 {
        u32::from(!self.place) + 2 * u32::from(self.vacuum) + 4 * u32::from(self.vision)
    }
}

/// Controls keyed by reference designator. Components without an entry are
/// placed, with vacuum and vision checks as the feeder's `Status` says
/// unless overridden for all components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementControls {
    entries: BTreeMap<String, ComponentControl>,
    pub vacuum: Option<bool>,
    pub vision: Option<bool>,
}

impl PlacementControls {
    pub fn set(&mut self, reference: &str, control: ComponentControl) {
        self.entries.insert(reference.to_string(), control);
    }

    /// Exclude a component from placement, keeping its other flags.
    pub fn exclude(&mut self, reference: &str, feeder: Option<&Feeder>) {
        let mut control = self.resolve(reference, feeder);
        control.place = false;
        self.set(reference, control);
    }

    pub fn resolve(&self, reference: &str, feeder: Option<&Feeder>) -> ComponentControl {
        if let Some(control) = self.entries.get(reference) {
            return *control;
        }
        ComponentControl {
            place: true,
            vacuum: self.vacuum.unwrap_or_else(|| feeder.is_some_and(Feeder::vacuum)),
            vision: self.vision.unwrap_or_else(|| feeder.is_some_and(Feeder::vision)),
        }
    }

    /// Set `place` for every component of `assignments`.
    pub fn place_all(&mut self, assignments: &Assignments<'_>, feeders: &[Feeder], place: bool) {
        for (idx, parts) in assignments.by_feeder() {
            for fp in parts {
                let mut control = self.resolve(&fp.reference, feeders.get(idx));
                control.place = place;
                self.set(&fp.reference, control);
            }
        }
    }
}

/// Shortest decimal form: `10`, `5.5`, never `-0`.
pub fn fmt_num(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

/// Default output name: `board.kicad_pcb` becomes `board-<mode>.dpv`.
pub fn output_file_name(board_file: &str, mode_name: &str) -> String {
    let suffix = format!("-{}.dpv", mode_name);
    if board_file.contains(".kicad_pcb") {
        board_file.replace(".kicad_pcb", &suffix)
    } else {
        format!("{}{}", board_file, suffix)
    }
}

pub struct DpvWriter<'a> {
    pub reference: &'a ReferenceData,
    pub assignments: &'a Assignments<'a>,
    pub transform: PosTransform,
    pub controls: &'a PlacementControls,
}

impl<'a> DpvWriter<'a> {
    pub fn render(&self, meta: &DpvMetadata) -> String {
        let mut out = String::from("separated");
        out.push_str(CRLF);
        let date = meta.timestamp.format("%Y/%m/%d").to_string();
        let time = meta.timestamp.format("%H:%M:%S").to_string();
        let header = [
            ("FILE", meta.file_name.as_str()),
            ("PCBFILE", meta.pcb_file.as_str()),
            ("DATE", date.as_str()),
            ("TIME", time.as_str()),
            ("PANELYPE", "0"),
        ];
        for (key, value) in header {
            out.push_str(key);
            out.push(',');
            out.push_str(&value.replace(',', ""));
            out.push_str(CRLF);
        }
        out.push_str(CRLF);

        for template in &self.reference.templates {
            out.push_str(&template.fields.join(","));
            out.push_str(CRLF);
            if let Some(name) = template.name.as_deref() {
                let rows = self.table_rows(name);
                write_rows(&mut out, template, name, &rows);
            }
            out.push_str(CRLF);
        }
        out
    }

    fn table_rows(&self, name: &str) -> Vec<Record> {
        match TableRole::from_name(name) {
            TableRole::Station | TableRole::IcTray | TableRole::Other => {
                self.reference.table(name).to_vec()
            }
            TableRole::PanelCoord => vec![row(&[("ID", "1".to_string())])],
            TableRole::EComponent => self.component_rows(),
            TableRole::PcbCalib => {
                let n_type = if self.assignments.fiducials().len() > 1 { "1" } else { "0" };
                vec![row(&[("nType", n_type.to_string())])]
            }
            TableRole::CalibPoint => self.fiducial_rows(),
            TableRole::CalibFator => vec![Record::new()],
        }
    }

    /// One row per placed component, feeders in index order.
    pub fn component_rows(&self) -> Vec<Record> {
        let mut rows = Vec::new();
        for (idx, parts) in self.assignments.by_feeder() {
            let Some(feeder) = self.reference.feeders.get(idx) else {
                tracing::warn!("Assignment to unknown feeder index {}", idx);
                continue;
            };
            for fp in parts {
                let control = self.controls.resolve(&fp.reference, Some(feeder));
                if !control.place {
                    continue;
                }
                rows.push(self.component_row(rows.len(), fp, feeder, control));
            }
        }
        rows
    }

    fn component_row(&self, no: usize, fp: &Footprint, feeder: &Feeder, control: ComponentControl) -> Record {
        let pos = self.transform.apply(&fp.position, feeder.orientation());
        let mut r = row(&[
            ("No.", no.to_string()),
            ("ID", (no + 1).to_string()),
            ("DeltX", fmt_num(pos.x)),
            ("DeltY", fmt_num(pos.y)),
            ("Angle", fmt_num(pos.rot)),
            ("Skip", control.skip_flags().to_string()),
            ("Speed", "0".to_string()),
            ("Explain", fp.reference.clone()),
            ("Note", fp.value.clone()),
        ]);
        if let Some(nozzle) = feeder.nozzle() {
            r.insert("PHead".to_string(), nozzle.to_string());
        }
        for (out_field, feeder_field) in [("STNo.", "ID"), ("Height", "Height")] {
            if let Some(value) = feeder.record.get(feeder_field) {
                r.insert(out_field.to_string(), value.clone());
            }
        }
        r
    }

    pub fn fiducial_rows(&self) -> Vec<Record> {
        self.assignments
            .fiducials()
            .iter()
            .enumerate()
            .map(|(idx, fid)| {
                let pos = self.transform.apply(&fid.position, 0.0);
                row(&[
                    ("No.", idx.to_string()),
                    ("ID", (idx + 1).to_string()),
                    ("offsetX", fmt_num(pos.x)),
                    ("offsetY", fmt_num(pos.y)),
                    ("Note", fid.reference.clone()),
                ])
            })
            .collect()
    }
}

fn row(fields: &[(&str, String)]) -> Record {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Table name, then every header field after `Table`; absent fields are `0`.
fn write_rows(out: &mut String, template: &TableTemplate, name: &str, rows: &[Record]) {
    for r in rows {
        out.push_str(name);
        for field in template.fields.iter().skip(1) {
            out.push(',');
            let value = r.get(field).map(String::as_str).unwrap_or("0");
            out.push_str(&value.replace(',', "."));
        }
        out.push_str(CRLF);
    }
}
