//! Live processing strategy
//!
//! Hosts the dispatcher and per-lane tasks on a multi-threaded tokio runtime
//! with real (wall-clock) timers. The event source is still a CSV log here;
//! a deployment wires real sensor feeds into [`EngineDispatcher::dispatch`]
//! and real drivers into [`LaneDevices`].

use std::io::Write;
use std::path::Path;

use tokio_util::compat::TokioAsyncReadCompatExt;

use crate::config::EngineConfig;
use crate::io::async_reader::AsyncEventLogReader;
use crate::io::csv_format::write_sessions_csv;
use crate::runtime::devices::LaneDevices;
use crate::runtime::dispatcher::EngineDispatcher;
use crate::strategy::ProcessingStrategy;
use crate::types::LaneEngineError;

const READ_BATCH_SIZE: usize = 256;

/// Concurrent strategy running one tokio task per lane
pub struct LiveStrategy {
    config: EngineConfig,
}

impl LiveStrategy {
    pub fn new(config: EngineConfig) -> Self {
        LiveStrategy { config }
    }
}

impl ProcessingStrategy for LiveStrategy {
    /// Feed the event source through the dispatcher and write the report
    ///
    /// Builds its own multi-threaded runtime so the caller stays synchronous,
    /// the same shape as the replay strategy.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), LaneEngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(num_cpus::get())
            .enable_all()
            .build()
            .map_err(|e| {
                LaneEngineError::configuration(format!("failed to build tokio runtime: {}", e))
            })?;

        runtime.block_on(async {
            let dispatcher = EngineDispatcher::start(&self.config, LaneDevices::logging())?;
            let store = dispatcher.store();

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| LaneEngineError::IoError {
                    message: format!("failed to open '{}': {}", input_path.display(), e),
                })?;
            let mut reader = AsyncEventLogReader::new(file.compat());

            loop {
                let batch = reader.read_batch(READ_BATCH_SIZE).await;
                if batch.is_empty() {
                    break;
                }
                for timed in batch {
                    // Unknown lanes are a data problem, not a reason to stop
                    // the remaining lanes.
                    if let Err(err) = dispatcher.dispatch(&timed.lane_id, timed.event, timed.at) {
                        tracing::warn!(lane = %timed.lane_id, %err, "dispatch failed");
                    }
                }
            }

            dispatcher.shutdown().await;
            write_sessions_csv(&store.all_sessions(), output)
        })
    }
}
