//! dpvgen CLI - turn KiCad boards into Charmhigh pick-and-place programs.

use clap::{Parser, Subcommand, ValueEnum};
use dpvgen::{
    discover_board_files, ConvertOptions, DpvGenCore, DpvGenError, MachineConfig,
    OriginMode, PlacementMode, Session, Side,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "dpvgen")]
#[command(about = "KiCad PCB to pick-and-place program converter", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Machine config (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a placement program for one board side
    Convert {
        /// Path to .kicad_pcb file
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Reference .dpv file with the feeder setup
        #[arg(short, long, value_name = "DPV")]
        reference: PathBuf,

        /// Board side and flip direction
        #[arg(short, long, value_enum, default_value = "top")]
        side: SideArg,

        /// Output file (default: <board>-<side>.dpv next to the board)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Components not to place, comma separated
        #[arg(long, value_delimiter = ',', value_name = "REF")]
        exclude: Vec<String>,

        /// Disable vacuum checks for all components
        #[arg(long)]
        no_vacuum: bool,

        /// Disable vision for all components
        #[arg(long)]
        no_vision: bool,
    },

    /// Show which feeder every component goes to
    Assign {
        /// Path to .kicad_pcb file
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Reference .dpv file with the feeder setup
        #[arg(short, long, value_name = "DPV")]
        reference: Option<PathBuf>,

        /// Board side and flip direction
        #[arg(short, long, value_enum, default_value = "top")]
        side: SideArg,

        /// Coordinates to show
        #[arg(long, value_enum, default_value = "machine")]
        origin: OriginArg,

        /// Also list feeders without components
        #[arg(long)]
        show_unused: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show board version, origin and size
    Info {
        /// Path to .kicad_pcb file
        #[arg(value_name = "BOARD")]
        board: PathBuf,
    },

    /// List KiCad boards below a directory
    List {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Top,
    BotHflip,
    BotVflip,
}

impl From<SideArg> for PlacementMode {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Top => PlacementMode::Top,
            SideArg::BotHflip => PlacementMode::BottomHFlip,
            SideArg::BotVflip => PlacementMode::BottomVFlip,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OriginArg {
    /// Machine coordinates
    Machine,
    /// KiCad board coordinates
    Board,
}

impl From<OriginArg> for OriginMode {
    fn from(origin: OriginArg) -> Self {
        match origin {
            OriginArg::Machine => OriginMode::Machine,
            OriginArg::Board => OriginMode::Board,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Convert {
            board,
            reference,
            side,
            output,
            exclude,
            no_vacuum,
            no_vision,
        } => {
            let options = ConvertOptions {
                mode: side.into(),
                exclude,
                vacuum: no_vacuum.then_some(false),
                vision: no_vision.then_some(false),
                file_name: output
                    .as_ref()
                    .and_then(|o| o.file_name())
                    .map(|n| n.to_string_lossy().to_string()),
                timestamp: Some(chrono::Local::now().naive_local()),
            };
            handle_convert(&board, &reference, output, &options, &config)
        }
        Commands::Assign {
            board,
            reference,
            side,
            origin,
            show_unused,
            format,
        } => handle_assign(&board, reference.as_deref(), side, origin, show_unused, format, config),
        Commands::Info { board } => handle_info(&board, config),
        Commands::List { dir } => handle_list(&dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MachineConfig, DpvGenError> {
    match path {
        Some(path) => MachineConfig::from_file(path),
        None => Ok(MachineConfig::default()),
    }
}

fn handle_convert(
    board: &Path,
    reference: &Path,
    output: Option<PathBuf>,
    options: &ConvertOptions,
    config: &MachineConfig,
) -> Result<(), DpvGenError> {
    let result = DpvGenCore::convert(board, reference, options, config)?;
    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }

    let output = output.unwrap_or_else(|| {
        board
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&result.file_name)
    });
    std::fs::write(&output, &result.text)?;

    let summary = &result.summary;
    println!("Wrote {}", output.display());
    println!("  Placed:     {}", summary.placed);
    println!("  Excluded:   {}", summary.excluded);
    println!("  Fiducials:  {}", summary.fiducials);
    if summary.unassigned.is_empty() {
        println!("  Unassigned: 0");
    } else {
        println!("  Unassigned: {} ({})", summary.unassigned.len(), summary.unassigned.join(", "));
    }
    Ok(())
}

fn handle_assign(
    board: &Path,
    reference: Option<&Path>,
    side: SideArg,
    origin: OriginArg,
    show_unused: bool,
    format: OutputFormat,
    config: MachineConfig,
) -> Result<(), DpvGenError> {
    let mut session = Session::new(config);
    session.mode = side.into();
    session.origin = origin.into();
    session.load_board(board)?;
    if let Some(reference) = reference {
        session.load_reference(reference)?;
    }

    let cards = session.cards(show_unused);
    match format {
        OutputFormat::Human => {
            for card in &cards {
                println!("{}", card.render_text());
            }
            if !session.can_export() {
                println!("No component has a feeder, nothing to place.");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "board": session.board().map(|b| b.filename.clone()),
                "mode": session.mode.name(),
                "cards": cards,
                "summary": session.summary(),
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| DpvGenError::Parse(e.to_string()))?;
            println!("{}", text);
        }
    }
    Ok(())
}

fn handle_info(board: &Path, config: MachineConfig) -> Result<(), DpvGenError> {
    let mut session = Session::new(config);
    let board = session.load_board(board)?;

    let version = match board.version {
        Some(v) => v.to_string(),
        None => "unknown".to_string(),
    };
    let marker = if board.version_ok() { "" } else { " (unsupported)" };
    println!("File:      {}", board.filename);
    println!("Version:   {}{}", version, marker);
    println!(
        "Origin:    {}, {} ({})",
        board.aux_origin.x,
        board.aux_origin.y,
        if board.aux_origin.explicit { "aux axis origin" } else { "lower left corner" }
    );
    println!("Size:      {} x {} mm", board.extents.width, board.extents.height);
    println!(
        "SMD parts: {} top, {} bottom",
        board.footprints.on_side(Side::Top).count(),
        board.footprints.on_side(Side::Bottom).count()
    );
    for group in board.footprints.groups() {
        println!("  {:<6} {}", group.designator, group.parts.len());
    }
    for warning in &board.warnings {
        eprintln!("Warning: {}", warning);
    }
    Ok(())
}

fn handle_list(dir: &Path) -> Result<(), DpvGenError> {
    let files = discover_board_files(dir)?;
    if files.is_empty() {
        println!("No .kicad_pcb files found in {}", dir.display());
        return Ok(());
    }
    for file in &files {
        let modified = file
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}", modified, file.path.display());
    }
    Ok(())
}
