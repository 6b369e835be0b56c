//! Print the feeder assignment of a board's top side.

use dpvgen::prelude::*;
use dpvgen::OriginMode;
use std::path::Path;

fn main() -> Result<(), DpvGenError> {
    let mut args = std::env::args().skip(1);
    let Some(board) = args.next() else {
        eprintln!("Usage: cargo run --example show_assignments <board.kicad_pcb> [reference.dpv]");
        std::process::exit(1);
    };

    let mut session = Session::new(MachineConfig::default());
    session.origin = OriginMode::Board;
    let loaded = session.load_board(Path::new(&board))?;
    println!(
        "{}: {} x {} mm, {} SMD parts",
        loaded.filename,
        loaded.extents.width,
        loaded.extents.height,
        loaded.footprints.len()
    );

    if let Some(reference) = args.next() {
        let reference = session.load_reference(Path::new(&reference))?;
        println!("{} feeders", reference.feeders.len());
    }
    println!();

    for card in session.cards(false) {
        println!("{}", card.render_text());
    }
    Ok(())
}
