//! Convert a board for every placement mode and write the programs next to it.

use dpvgen::prelude::*;
use dpvgen::ConvertOptions;
use std::path::Path;

fn main() -> Result<(), DpvGenError> {
    let mut args = std::env::args().skip(1);
    let (Some(board), Some(reference)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --example convert_board <board.kicad_pcb> <reference.dpv>");
        std::process::exit(1);
    };
    let board = Path::new(&board);
    let reference = Path::new(&reference);
    let dir = board.parent().unwrap_or_else(|| Path::new(""));

    for mode in PlacementMode::ALL {
        let options = ConvertOptions {
            mode,
            ..ConvertOptions::default()
        };
        let result = DpvGenCore::convert(board, reference, &options, &MachineConfig::default())?;
        if result.summary.placed == 0 {
            println!("{}: nothing to place", mode);
            continue;
        }

        let output = dir.join(&result.file_name);
        std::fs::write(&output, &result.text)?;
        println!(
            "{}: {} placed, {} fiducials -> {}",
            mode,
            result.summary.placed,
            result.summary.fiducials,
            output.display()
        );
        if !result.summary.unassigned.is_empty() {
            println!("  no feeder for {}", result.summary.unassigned.join(", "));
        }
    }

    Ok(())
}
