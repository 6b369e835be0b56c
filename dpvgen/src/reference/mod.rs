//! Machine reference file (`.dpv`) loading.
//!
//! A reference file is a comma-separated dump of several tables. Every
//! `Table,...` line is a header starting a new table template; data lines
//! carry their table name in field 0 and are mapped positionally onto the
//! most recent header.
//!
//! ```text
//! separated
//! FILE,reference.dpv
//! ...
//! Table,No.,ID,DeltX,DeltY,FeedRates,Note,Height,Speed,Status,...
//! Station,0,2,-1.12,1.35,2,0.1uF 25V X5R 10% fp:C_0402_1005Metric,0.5,0,6,...
//! ```

pub mod delimited;
pub mod feeder;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::MachineConfig;
use crate::core::DpvGenError;

pub use delimited::split_lines;
pub use feeder::{Feeder, ParamValue};

/// One data line, keyed by header field name.
pub type Record = BTreeMap<String, String>;

/// Name of the feeder table.
pub const STATION_TABLE: &str = "Station";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableTemplate {
    /// Table name taken from the first data line after the header.
    pub name: Option<String>,
    /// Header fields, `Table` included.
    pub fields: Vec<String>,
}

/// `FILE`, `DATE` and `TIME` lines of the reference file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    pub file: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub filename: Option<String>,
    pub templates: Vec<TableTemplate>,
    pub tables: BTreeMap<String, Vec<Record>>,
    /// `Station` records in file order.
    pub feeders: Vec<Feeder>,
    pub info: ReferenceInfo,
}

impl ReferenceData {
    pub fn from_file(path: &Path, config: &MachineConfig) -> Result<Self, DpvGenError> {
        let content = std::fs::read_to_string(path)?;
        let filename = path.file_name().and_then(|n| n.to_str());
        Ok(Self::parse(&content, filename, config))
    }

    /// Assemble tables from reference file text. Never fails: malformed
    /// lines end up as sparse records.
    pub fn parse(content: &str, filename: Option<&str>, config: &MachineConfig) -> Self {
        let rows = split_lines(content, b',', true);

        let mut templates: Vec<TableTemplate> = Vec::new();
        let mut tables: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        let mut info = ReferenceInfo::default();

        for row in &rows {
            let first = row.first().map(String::as_str).unwrap_or("");
            let second = || row.get(1).cloned();
            match first {
                "FILE" if info.file.is_none() => info.file = second(),
                "DATE" if info.date.is_none() => info.date = second(),
                "TIME" if info.time.is_none() => info.time = second(),
                _ => {}
            }

            if first == "Table" {
                templates.push(TableTemplate {
                    name: None,
                    fields: row.clone(),
                });
            } else if !first.is_empty() {
                let Some(template) = templates.last_mut() else {
                    continue;
                };
                template.name.get_or_insert_with(|| first.to_string());
                let record: Record = template
                    .fields
                    .iter()
                    .zip(row.iter())
                    .skip(1)
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                if row.len() > template.fields.len() {
                    tracing::debug!(
                        "{} line has {} fields, header has {}",
                        first,
                        row.len(),
                        template.fields.len()
                    );
                }
                tables.entry(first.to_string()).or_default().push(record);
            }
        }

        let feeders: Vec<Feeder> = match tables.get(STATION_TABLE) {
            Some(records) => records
                .iter()
                .cloned()
                .map(|r| Feeder::from_record(r, config))
                .collect(),
            None => {
                tracing::warn!("Reference file has no {} table, no feeders available", STATION_TABLE);
                Vec::new()
            }
        };

        tracing::debug!(
            "Reference {}: {} table templates, {} feeders",
            filename.unwrap_or("<memory>"),
            templates.len(),
            feeders.len()
        );

        Self {
            filename: filename.map(str::to_string),
            templates,
            tables,
            feeders,
            info,
        }
    }

    /// Records of a named table; empty if the file has none.
    pub fn table(&self, name: &str) -> &[Record] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
