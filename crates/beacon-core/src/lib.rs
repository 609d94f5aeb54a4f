//! # beacon-core
//!
//! Beacon ranging engine.
//!
//! This crate provides:
//! - Identity constraints selecting which beacons to range
//! - A registry holding the currently detected beacons and the last error
//! - A controller driving authorization and the ranging subscription
//! - An in-process simulated source, and a BlueZ source on Linux
//!
//! ## Architecture
//!
//! ```text
//! RangingSource --events--> RangingController --> BeaconRegistry --> Snapshot
//! ```
//!
//! - [`identity`] - Beacon identity and the constraint filter
//! - [`types`] - Samples, detected beacons, proximity/accuracy classes
//! - [`registry`] - The detected set and the last error
//! - [`source`] - Collaborator traits and the event channel
//! - [`controller`] - Ranging lifecycle state machine
//! - [`ibeacon`] - iBeacon advertisement decoding
//! - [`config`] - Configuration loading, saving and validation
//! - [`error`] - Error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

#[cfg(feature = "bluetooth")]
pub mod bluetooth;
pub mod config;
pub mod controller;
pub mod error;
pub mod ibeacon;
pub mod identity;
pub mod registry;
#[cfg(feature = "simulator")]
pub mod simulator;
pub mod source;
pub mod types;

// Re-export primary types for convenience
#[cfg(feature = "bluetooth")]
pub use bluetooth::BluezSource;
pub use config::{
    default_config_path, Config, ConfigError, ConfigResult, ConstraintConfig,
    SimulatedBeaconConfig, SourceConfig, SourceKind, ServerConfig,
};
pub use controller::{ControllerState, RangingController, SnapshotReceiver, StateReceiver};
pub use error::{BeaconError, RangingError, Result};
pub use identity::{BeaconIdentity, IdentityConstraint};
pub use registry::BeaconRegistry;
#[cfg(feature = "simulator")]
pub use simulator::{SimulatedBeacon, SimulatedSource, SimulatorHandle};
pub use source::{
    AuthorizationProvider, EventSender, RangingEvent, RangingSource, StaticAuthorization,
    SubscriptionHandle,
};
pub use types::{AccuracyClass, DetectedBeacon, ProximityClass, RawSample, Snapshot};
