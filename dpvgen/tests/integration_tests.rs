//! Integration tests for whole-board conversion

use chrono::NaiveDate;
use dpvgen::prelude::*;
use dpvgen::ConvertOptions;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn options(mode: PlacementMode) -> ConvertOptions {
    ConvertOptions {
        mode,
        timestamp: NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(8, 5, 0)),
        ..ConvertOptions::default()
    }
}

fn convert(options: &ConvertOptions) -> dpvgen::ConversionResult {
    DpvGenCore::convert(
        &fixture_path("demo.kicad_pcb"),
        &fixture_path("reference.dpv"),
        options,
        &MachineConfig::default(),
    )
    .expect("Conversion should succeed")
}

/// Data lines of one table in the output.
fn rows<'a>(text: &'a str, table: &str) -> Vec<&'a str> {
    let prefix = format!("{},", table);
    text.split("\r\n").filter(|l| l.starts_with(&prefix)).collect()
}

#[test]
fn test_convert_top_side() {
    let result = convert(&options(PlacementMode::Top));

    assert_eq!(result.file_name, "demo-top.dpv");
    assert_eq!(
        rows(&result.text, "EComponent"),
        vec![
            "EComponent,0,1,1,1,10,5,0,0.5,6,0,C1,0.1uF 25V 10%,0",
            "EComponent,1,2,1,1,12,5,-90,0.5,6,0,C2,100nF 16V,0",
            "EComponent,2,3,1,2,20,10,90,0.5,6,0,R1,10k 1%,0",
            "EComponent,3,4,1,3,21,10,-90,0.5,2,0,R2,4.7kR,0",
        ]
    );
    assert_eq!(
        rows(&result.text, "CalibPoint"),
        vec!["CalibPoint,0,1,2,2,FID1", "CalibPoint,1,2,38,23,FID2"]
    );
    assert_eq!(rows(&result.text, "PcbCalib"), vec!["PcbCalib,0,1,0,0"]);
    assert_eq!(rows(&result.text, "CalibFator"), vec!["CalibFator,0,0,0,0,0,0,0,0"]);
    assert_eq!(rows(&result.text, "Panel_Coord"), vec!["Panel_Coord,0,1,0,0"]);

    assert_eq!(result.summary.placed, 4);
    assert_eq!(result.summary.fiducials, 2);
    assert_eq!(result.summary.unassigned, vec!["U1"]);
}

#[test]
fn test_output_header() {
    let result = convert(&options(PlacementMode::Top));

    assert!(result.text.starts_with(
        "separated\r\nFILE,demo-top.dpv\r\nPCBFILE,demo.kicad_pcb\r\nDATE,2024/03/09\r\nTIME,08:05:00\r\nPANELYPE,0\r\n\r\n"
    ));
    assert!(!result.text.contains("C9"), "Old component rows must not be copied");
    assert!(!result.text.contains("FID9"), "Old fiducials must not be copied");
}

#[test]
fn test_copied_tables_are_unchanged() {
    let result = convert(&options(PlacementMode::Top));
    let reference = std::fs::read_to_string(fixture_path("reference.dpv")).expect("Should read");

    for table in ["Station", "ICTray"] {
        assert_eq!(rows(&result.text, table), rows(&reference, table), "table {}", table);
    }
    let headers = |text: &str| -> Vec<String> {
        text.split("\r\n")
            .filter(|l| l.starts_with("Table,"))
            .map(str::to_string)
            .collect()
    };
    assert_eq!(headers(&result.text), headers(&reference));
}

#[test]
fn test_output_has_only_crlf_line_endings() {
    let result = convert(&options(PlacementMode::Top));

    assert!(result.text.ends_with("\r\n"));
    assert_eq!(
        result.text.matches('\n').count(),
        result.text.matches("\r\n").count(),
        "Every LF should be part of a CRLF"
    );
}

#[test]
fn test_convert_bottom_hflip() {
    let result = convert(&options(PlacementMode::BottomHFlip));

    assert_eq!(result.file_name, "demo-bot_hflip.dpv");
    assert_eq!(
        rows(&result.text, "EComponent"),
        vec!["EComponent,0,1,2,4,15,20,-90,0.8,6,0,C3,10uF 10V,0"]
    );
    assert!(rows(&result.text, "CalibPoint").is_empty());
    assert_eq!(rows(&result.text, "PcbCalib"), vec!["PcbCalib,0,0,0,0"]);
}

#[test]
fn test_convert_bottom_vflip() {
    let result = convert(&options(PlacementMode::BottomVFlip));

    assert_eq!(result.file_name, "demo-bot_vflip.dpv");
    assert_eq!(
        rows(&result.text, "EComponent"),
        vec!["EComponent,0,1,2,4,25,5,-90,0.8,6,0,C3,10uF 10V,0"]
    );
}

#[test]
fn test_exclusions_and_global_overrides() {
    let options = ConvertOptions {
        exclude: vec!["C2".to_string(), "U1".to_string(), "Q7".to_string()],
        vision: Some(false),
        ..options(PlacementMode::Top)
    };
    let result = convert(&options);

    assert_eq!(
        rows(&result.text, "EComponent"),
        vec![
            "EComponent,0,1,1,1,10,5,0,0.5,2,0,C1,0.1uF 25V 10%,0",
            "EComponent,1,2,1,2,20,10,90,0.5,2,0,R1,10k 1%,0",
            "EComponent,2,3,1,3,21,10,-90,0.5,2,0,R2,4.7kR,0",
        ]
    );
    assert_eq!(result.summary.placed, 3);
    assert_eq!(result.summary.excluded, 1);
    assert_eq!(result.unused_exclusions, vec!["U1", "Q7"]);
}

#[test]
fn test_excluding_fiducials_is_ignored() {
    let options = ConvertOptions {
        exclude: vec!["FID2".to_string(), "C3".to_string()],
        ..options(PlacementMode::Top)
    };
    let result = convert(&options);

    assert_eq!(result.unused_exclusions, vec!["FID2", "C3"]);
    assert_eq!(result.summary.excluded, 0);
    assert_eq!(rows(&result.text, "CalibPoint").len(), 2);
}

#[test]
fn test_custom_output_name() {
    let options = ConvertOptions {
        file_name: Some("line,2.dpv".to_string()),
        ..options(PlacementMode::Top)
    };
    let result = convert(&options);

    assert_eq!(result.file_name, "line,2.dpv");
    assert!(result.text.contains("\r\nFILE,line2.dpv\r\n"), "Commas are stripped from the header");
}

#[test]
fn test_session_controls() {
    let mut session = Session::new(MachineConfig::default());
    session
        .load_board(&fixture_path("demo.kicad_pcb"))
        .expect("Should load board");
    session
        .load_reference(&fixture_path("reference.dpv"))
        .expect("Should load reference");

    let assignments = session.assignments();
    let mut controls = session.controls.clone();
    controls.place_all(&assignments, session.feeders(), false);
    session.controls = controls;

    let timestamp = NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(8, 5, 0))
        .expect("valid date");
    let text = session.render_dpv("none.dpv", timestamp).expect("Should render");
    assert!(rows(&text, "EComponent").is_empty());
    assert_eq!(session.summary().excluded, 4);

    session
        .load_board(&fixture_path("demo.kicad_pcb"))
        .expect("Should reload board");
    assert_eq!(session.summary().placed, 4, "Loading a board resets the controls");
}

#[test]
fn test_unsupported_version_still_converts() {
    let config = MachineConfig {
        supported_versions: (20240108, 20240108),
        ..MachineConfig::default()
    };
    let result = DpvGenCore::convert(
        &fixture_path("demo.kicad_pcb"),
        &fixture_path("reference.dpv"),
        &options(PlacementMode::Top),
        &config,
    )
    .expect("Conversion should succeed");

    assert_eq!(result.warnings.len(), 1);
    assert_eq!(rows(&result.text, "EComponent").len(), 4);
}
