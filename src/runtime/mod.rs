//! Async runtime layer
//!
//! Hosts the lane state machines on tokio: one task per lane fed by a
//! bounded queue, with device traits at the hardware seam.
//!
//! # Components
//!
//! - `devices` - Device collaborator traits and stock implementations
//! - `dispatcher` - Per-lane routing with the queue overflow policy
//! - `lane_runtime` - The per-lane task that executes lane effects
//! - `queue` - Bounded lane queue with evict-oldest-droppable overflow

pub mod devices;
pub mod dispatcher;
pub mod lane_runtime;
pub mod queue;

pub use devices::{BarrierDriver, CameraTrigger, LaneDevices, NotificationSink};
pub use dispatcher::EngineDispatcher;
pub use lane_runtime::{LaneMessage, LaneRuntime};
pub use queue::{LaneQueue, PushOutcome};
