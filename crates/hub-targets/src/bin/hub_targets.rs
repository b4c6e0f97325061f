//! hub-targets CLI: replay recorded contours through the targeting pipeline.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use hub_targets::replay::{run_replay, ReplayFrames};
use hub_targets::PipelineConfig;
use log::{info, LevelFilter};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "hub-targets")]
#[command(about = "Track reflective hub targets from contour streams")]
#[command(version)]
struct Cli {
    /// Log level for the stderr logger (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the frame task over a JSON replay of contours.
    Replay(ReplayArgs),

    /// Print the default pipeline configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Pipeline configuration (JSON). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded frames (JSON).
    #[arg(long)]
    frames: PathBuf,

    /// Where to write reports and the telemetry snapshot. Stdout if omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for annotated PNG frames.
    #[arg(long)]
    overlay_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    init_logging(cli.log_level)?;

    match cli.command {
        Commands::Replay(args) => run_replay_cmd(&args),
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
            Ok(())
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_level: LevelFilter) -> CliResult<()> {
    hub_targets::core::init_tracing(false);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) -> CliResult<()> {
    hub_targets::core::init_with_level(level)?;
    Ok(())
}

fn run_replay_cmd(args: &ReplayArgs) -> CliResult<()> {
    let config = match &args.config {
        Some(path) => {
            info!("loading config {}", path.display());
            PipelineConfig::load_json(path)?
        }
        None => PipelineConfig::default(),
    };
    let frames = ReplayFrames::load_json(&args.frames)?;
    let outcome = run_replay(config, frames, args.overlay_dir.as_deref())?;

    let json = serde_json::to_string_pretty(&outcome)?;
    match &args.out {
        Some(path) => {
            fs::write(path, json)?;
            info!("results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
