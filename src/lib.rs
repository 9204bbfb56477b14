//! Lane Transaction Engine
//!
//! # Overview
//!
//! This library turns raw lane events from a parking facility (LPR captures,
//! induction-loop triggers, operator commands) into admission decisions and
//! priced parking sessions. It offers a deterministic replay pipeline for
//! recorded event logs and a concurrent live mode with one task per lane.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (sessions, events, policy inputs, tariffs)
//! - [`config`] - Engine configuration: lanes, timing, policy, tariffs
//! - [`core`] - Synchronous decision logic:
//!   - [`core::lane`] - The per-lane state machine
//!   - [`core::policy`] - Admission policy evaluation
//!   - [`core::pricing`] - Fee computation
//!   - [`core::session_store`] - Concurrent session store
//!   - [`core::audit`] - Append-only audit trail
//! - [`runtime`] - Async hosting: dispatcher, per-lane tasks, device seams
//! - [`io`] - Event-log parsing and session report output
//! - [`strategy`] - Replay and live processing pipelines
//! - [`cli`] - Command-line argument parsing
//!
//! # Decision flow
//!
//! A vehicle trips the loop, the lane requests an LPR capture, the policy
//! evaluator rules on the plate (blacklist, confidence, regulatory rules),
//! and the lane either opens the barrier (creating or completing a session)
//! or denies with an operator-visible reason. Every decision and override
//! lands in the audit trail with an attributable actor.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod runtime;
pub mod strategy;
pub mod types;
