//! Lane Transaction Engine CLI
//!
//! Processes parking lane event logs into session reports.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- events.csv > sessions.csv
//! cargo run -- --mode replay events.csv > sessions.csv
//! cargo run -- --mode live --config site.json events.csv > sessions.csv
//! ```
//!
//! The program reads lane events from the input CSV, drives them through the
//! engine in the selected mode, and writes the final session report to
//! stdout. Logging goes to stderr and is controlled with `RUST_LOG`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, file not found, unwritable output, etc.)

use lane_transaction_engine::cli;
use lane_transaction_engine::config::EngineConfig;
use lane_transaction_engine::strategy;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let config = match &args.config {
        Some(path) => match EngineConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let strategy = strategy::create_strategy(args.mode, config);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
