use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay or run parking lane event logs through the transaction engine
#[derive(Parser, Debug)]
#[command(name = "lane-engine")]
#[command(about = "Process parking lane event logs into session reports", long_about = None)]
pub struct CliArgs {
    /// Input CSV event log
    #[arg(value_name = "INPUT", help = "Path to the input event-log CSV file")]
    pub input_file: PathBuf,

    /// Processing mode
    #[arg(
        long = "mode",
        value_name = "MODE",
        default_value = "replay",
        help = "Processing mode: 'replay' for deterministic replay or 'live' for concurrent lane tasks"
    )]
    pub mode: RunMode,

    /// Engine configuration file (lanes, tariffs, policy lists)
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "Path to a JSON engine configuration; defaults are used when omitted"
    )]
    pub config: Option<PathBuf>,
}

/// Available processing modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Single-threaded, simulated clock, byte-identical reruns
    Replay,
    /// One tokio task per lane, wall-clock timers
    Live,
}
