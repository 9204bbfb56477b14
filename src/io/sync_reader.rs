//! Synchronous event-log reader with iterator interface
//!
//! Provides a streaming iterator over timestamped lane events from a CSV
//! event log. Delegates format concerns to the `csv_format` module.
//!
//! # Design
//!
//! The reader deserializes rows one at a time, so memory usage is O(1) per
//! record regardless of log size. Fatal errors (file not found) surface from
//! `new()`; per-row parse errors are yielded as `Err` items so replay can log
//! and continue.

use crate::io::csv_format::{convert_event_record, EventRecord, TimedEvent};
use crate::types::LaneEngineError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Streaming reader over a lane event log
#[derive(Debug)]
pub struct EventLogReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl EventLogReader {
    /// Open an event log for streaming iteration
    ///
    /// The CSV reader trims whitespace and accepts rows with trailing
    /// columns omitted, since most event kinds leave the optional columns
    /// empty.
    pub fn new(path: &Path) -> Result<Self, LaneEngineError> {
        let file = File::open(path).map_err(|e| LaneEngineError::IoError {
            message: format!("failed to open '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(EventLogReader {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for EventLogReader {
    type Item = Result<TimedEvent, LaneEngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line_num += 1;
        let line = self.line_num;

        let mut records = self.reader.deserialize::<EventRecord>();
        match records.next()? {
            Ok(record) => Some(convert_event_record(record).map_err(|e| match e {
                LaneEngineError::ParseError { message, .. } => {
                    LaneEngineError::parse_error(Some(line), message)
                }
                other => other,
            })),
            Err(e) => Some(Err(LaneEngineError::parse_error(
                Some(line),
                e.to_string(),
            ))),
        }
    }
}
