//! Feeder records from the `Station` table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::MachineConfig;
use crate::export::fmt_num;
use crate::value::{tokenize, ValueToken};

use super::Record;

static RE_EXT_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S+):(\S+)").expect("extended parameter pattern"));

pub const NOZZLE: &str = "nozzle";
pub const ORIENTATION: &str = "orientation";

/// Value of a `key:value` pair in a feeder note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn parse(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(text.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", fmt_num(*n)),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeder {
    /// Fields as read, keyed by the `Station` header names.
    pub record: Record,
    /// Tokenized `Note`.
    pub params: Vec<ValueToken>,
    /// `key:value` pairs from the note over machine defaults.
    pub ext_params: BTreeMap<String, ParamValue>,
}

impl Feeder {
    pub fn from_record(record: Record, config: &MachineConfig) -> Self {
        let note = record.get("Note").map(String::as_str).unwrap_or("");
        let params = tokenize(note);

        let id = record.get("ID").map(String::as_str).and_then(feeder_number);
        let default_orientation = config.default_orientation(id);

        let mut ext_params = BTreeMap::new();
        ext_params.insert(NOZZLE.to_string(), ParamValue::Number(config.default_nozzle as f64));
        ext_params.insert(ORIENTATION.to_string(), ParamValue::Number(default_orientation));
        for caps in RE_EXT_PARAM.captures_iter(note) {
            ext_params.insert(caps[1].to_string(), ParamValue::parse(&caps[2]));
        }

        if let Some(ParamValue::Text(text)) = ext_params.get(ORIENTATION) {
            tracing::warn!(
                "Feeder {} has non-numeric orientation {:?}, using {}",
                record.get("ID").map(String::as_str).unwrap_or("?"),
                text,
                default_orientation
            );
            ext_params.insert(ORIENTATION.to_string(), ParamValue::Number(default_orientation));
        }

        Self {
            record,
            params,
            ext_params,
        }
    }

    /// Field value, empty when the record does not carry it.
    pub fn field(&self, name: &str) -> &str {
        self.record.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.field("ID")
    }

    pub fn note(&self) -> &str {
        self.field("Note")
    }

    pub fn nozzle(&self) -> Option<&ParamValue> {
        self.ext_params.get(NOZZLE)
    }

    /// Orientation offset in degrees.
    pub fn orientation(&self) -> f64 {
        self.ext_params
            .get(ORIENTATION)
            .and_then(ParamValue::as_number)
            .unwrap_or(0.0)
    }

    /// `Status` bitmask; 0 when absent or unparseable.
    pub fn status(&self) -> u32 {
        self.field("Status").trim().parse().unwrap_or(0)
    }

    pub fn vacuum(&self) -> bool {
        self.status() & 2 != 0
    }

    pub fn vision(&self) -> bool {
        self.status() & 4 != 0
    }
}

/// Numeric feeder ID; a blank field counts as 0.
fn feeder_number(id: &str) -> Option<f64> {
    let id = id.trim();
    if id.is_empty() {
        return Some(0.0);
    }
    id.parse().ok()
}
