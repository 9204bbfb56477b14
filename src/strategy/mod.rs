//! Processing strategy module
//!
//! Strategy pattern over the two complete pipelines the engine offers: a
//! deterministic single-threaded replay with a simulated clock, and a
//! concurrent live mode with one tokio task per lane and wall-clock timers.
//! Both read the same event-log format and produce the same session report,
//! so a recorded incident can be replayed offline and compared against what
//! the live engine did.

use std::io::Write;
use std::path::Path;

use crate::cli::RunMode;
use crate::config::EngineConfig;
use crate::types::LaneEngineError;

pub mod live;
pub mod replay;

pub use live::LiveStrategy;
pub use replay::ReplayStrategy;

/// A complete pipeline: read an event log, run the engine, write the report
///
/// # Errors
///
/// Implementations return an error only for fatal conditions: the input
/// cannot be opened, the runtime cannot be built, or the report cannot be
/// written. Per-record problems (malformed rows, unknown lanes, denied
/// passages) are logged and processing continues.
pub trait ProcessingStrategy: Send + Sync {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LaneEngineError>;
}

/// Select a strategy for the requested mode
pub fn create_strategy(mode: RunMode, config: EngineConfig) -> Box<dyn ProcessingStrategy> {
    match mode {
        RunMode::Replay => Box::new(ReplayStrategy::new(config)),
        RunMode::Live => Box::new(LiveStrategy::new(config)),
    }
}
