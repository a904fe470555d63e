//! settle CLI - debounced directory watcher

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Settle - process files once they stop changing
#[derive(Parser)]
#[command(name = "settle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the inputs directory until a stop is requested
    Watch(WatchArgs),
    /// Request that a running watch stop
    Stop {
        /// Watch root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Clear a pending stop request
    Start {
        /// Watch root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Print RUNNING or STOP_REQUESTED
    Status {
        /// Watch root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Show the effective configuration
    Config {
        /// Watch root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Print an example config file instead
        #[arg(long)]
        example: bool,
    },
}

#[derive(Args)]
pub struct WatchArgs {
    /// Watch root (holds .settle/)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory to watch (default: <root>/inputs)
    #[arg(long)]
    pub inputs: Option<PathBuf>,

    /// Directory for reports (default: <root>/outputs)
    #[arg(long)]
    pub outputs: Option<PathBuf>,

    /// Scratch directory for processing (default: <root>/work)
    #[arg(long)]
    pub work_root: Option<PathBuf>,

    /// Mtime ledger file (default: <root>/.settle/state.json)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Quiet period in milliseconds
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Stop-marker poll interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Do not follow newly created subdirectories
    #[arg(long)]
    pub no_recursive: bool,

    /// Offline processing mode (true/false)
    #[arg(long, action = ArgAction::Set)]
    pub offline: Option<bool>,

    /// Model label passed to processing
    #[arg(long)]
    pub model: Option<String>,

    /// Eligible extension; repeat for several (default: md)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Log what would be processed without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Guard flushes the log file on exit
    let _log_guard = cli_lib::logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Watch(args) => cmd::watch::run(args).await,
        Commands::Stop { root } => cmd::stop::run(&root),
        Commands::Start { root } => cmd::start::run(&root),
        Commands::Status { root } => cmd::status::run(&root),
        Commands::Config { root, example } => cmd::config::run(&root, example),
    }
}
