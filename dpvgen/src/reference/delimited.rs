//! Delimiter-separated text splitter for machine files.
//!
//! The machine software writes neither quotes nor escaped delimiters, so a
//! field ends at the next delimiter, always.

use csv::{ReaderBuilder, Terminator};

/// Split `text` into lines of fields.
///
/// Lines end at LF; CR characters are dropped wherever they occur. With
/// `skip_empty`, lines without any character are discarded; otherwise they
/// come out as an empty field list. A trailing newline does not produce an
/// extra line.
pub fn split_lines(text: &str, delim: u8, skip_empty: bool) -> Vec<Vec<String>> {
    let text = text.replace('\r', "");
    let mut reader = ReaderBuilder::new()
        .delimiter(delim)
        .quoting(false)
        .flexible(true)
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(text.as_bytes());

    let mut records = reader.byte_records().map_while(|result| match result {
        Ok(record) => Some(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect::<Vec<String>>(),
        ),
        Err(e) => {
            tracing::warn!("Stopped reading delimited text: {}", e);
            None
        }
    });

    if skip_empty {
        return records.collect();
    }

    // Blank lines yield no record; every other line yields exactly one.
    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len().saturating_sub(1);
    let mut rows = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if !line.is_empty() {
            rows.extend(records.next());
        } else if i != last {
            rows.push(Vec::new());
        }
    }
    rows
}
