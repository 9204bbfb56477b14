//! I/O module
//!
//! Handles event-log parsing and session report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (event conversion, report serialization)
//! - `sync_reader` - Synchronous event-log reader with iterator interface
//! - `async_reader` - Asynchronous event-log reader with batch interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncEventLogReader;
pub use csv_format::{convert_event_record, write_sessions_csv, EventRecord, TimedEvent};
pub use sync_reader::EventLogReader;
