//! # beacon-server
//!
//! HTTP observer for the beacon ranging engine.
//!
//! This library wires a ranging controller to its configured source and
//! exposes the published snapshots through read-only API handlers.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod engine;
pub mod logging;
pub mod state;
