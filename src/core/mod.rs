//! Core decision logic: policy evaluation, pricing, the session store, the
//! audit trail, and the lane state machine that ties them together.
//!
//! Everything in this module is synchronous and deterministic; the async
//! plumbing lives in [`crate::runtime`].

pub mod audit;
pub mod lane;
pub mod policy;
pub mod pricing;
pub mod session_store;

pub use audit::AuditLog;
pub use lane::{LaneEffect, LaneState, LaneStateMachine};
pub use policy::PolicyEvaluator;
pub use pricing::compute_fee;
pub use session_store::SessionStore;
