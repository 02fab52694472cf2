#![forbid(unsafe_code)]

mod characters;
mod constants;
mod output;
mod persist;
mod settings;
mod shell;
mod store;
mod update;

use std::path::PathBuf;
use std::sync::mpsc;

use clap::Parser;
use tracing::{Level as TraceLevel, debug};
use tracing_subscriber::FmtSubscriber;

use persist::AppPaths;
use shell::Session;

/// Per-character win-streak tracker with overlay file output
#[derive(Parser, Debug)]
#[command(name = "winstreak-tracker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding profiles.json and settings.json
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Directory the overlay artifacts are written to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let paths = AppPaths::resolve(args.config_dir, args.output_dir);
    debug!(config = %paths.config_dir.display(), output = %paths.output_dir.display(), "resolved paths");

    // Update workers and the stdin reader both feed the main loop
    let (update_tx, update_rx) = mpsc::channel();
    let (line_tx, line_rx) = mpsc::channel();

    let mut session = Session::new(paths, update_tx)?;
    session.start();

    let _input_handle = shell::spawn_input_reader(line_tx);

    shell::run(session, line_rx, update_rx)?;
    Ok(())
}
