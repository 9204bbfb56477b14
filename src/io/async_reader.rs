//! Asynchronous event-log reader with batch interface
//!
//! Streams timestamped lane events from an async byte source, converting
//! rows through the `csv_format` module. Used by the live strategy so lane
//! tasks are fed without blocking the runtime on file I/O.

use crate::io::csv_format::{convert_event_record, EventRecord, TimedEvent};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Asynchronous event-log reader
///
/// Maintains streaming behavior with constant memory usage; malformed rows
/// are logged and skipped so a single bad record never stalls a lane.
pub struct AsyncEventLogReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncEventLogReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        AsyncEventLogReader { csv_reader }
    }

    /// Read up to `batch_size` events
    ///
    /// Returns an empty vector at end of input. Parse failures are reported
    /// through tracing and do not appear in the batch.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<TimedEvent> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<EventRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => match convert_event_record(record) {
                    Ok(event) => batch.push(event),
                    Err(e) => tracing::warn!(%e, "skipping malformed event record"),
                },
                Some(Err(e)) => tracing::warn!(%e, "skipping unreadable event row"),
                None => break,
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InboundEvent;
    use futures::io::Cursor;

    const HEADER: &str = "ts,lane,event,plate,confidence,vehicle_class,displacement_cc,operator,detail\n";

    #[tokio::test]
    async fn test_read_batch_respects_size() {
        let content = format!(
            "{}\
             2023-10-27T08:30:00Z,LANE-IN-01,vehicle_detected,,,,,,\n\
             2023-10-27T08:30:02Z,LANE-IN-01,lpr_result,59T1-123.45,0.92,car,,,\n\
             2023-10-27T08:30:10Z,LANE-IN-01,lane_cleared,,,,,,\n",
            HEADER
        );
        let mut reader = AsyncEventLogReader::new(Cursor::new(content.into_bytes()));

        let batch = reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].event, InboundEvent::VehicleDetected);

        let batch = reader.read_batch(2).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event, InboundEvent::LaneCleared);

        assert!(reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let content = format!(
            "{}\
             2023-10-27T08:30:00Z,LANE-IN-01,nonsense,,,,,,\n\
             2023-10-27T08:30:05Z,LANE-IN-01,vehicle_detected,,,,,,\n",
            HEADER
        );
        let mut reader = AsyncEventLogReader::new(Cursor::new(content.into_bytes()));

        let batch = reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event, InboundEvent::VehicleDetected);
    }

    #[tokio::test]
    async fn test_empty_log() {
        let mut reader = AsyncEventLogReader::new(Cursor::new(HEADER.as_bytes().to_vec()));
        assert!(reader.read_batch(10).await.is_empty());
    }
}
