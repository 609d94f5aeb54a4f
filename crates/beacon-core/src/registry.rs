//! The live set of detected beacons and the last observed ranging error.
//!
//! The registry has exactly one writer (the controller). Each batch replaces
//! the whole detected set in a single assignment, so a reader never sees a
//! half-applied batch. The error slot is independent of the detected set: a
//! successful batch does not clear it.

use tracing::{debug, trace};

use crate::error::RangingError;
use crate::types::{DetectedBeacon, RawSample, Snapshot};

/// Current detected set plus the last error.
#[derive(Debug, Clone, Default)]
pub struct BeaconRegistry {
    current_set: Vec<DetectedBeacon>,
    last_error: Option<RangingError>,
}

impl BeaconRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the detected set with the classification of `samples`.
    ///
    /// Source order is preserved. Nothing from earlier batches survives and
    /// `last_error` is left untouched.
    pub fn replace_detected_set(&mut self, samples: &[RawSample]) {
        let next: Vec<DetectedBeacon> = samples.iter().map(DetectedBeacon::from_sample).collect();

        trace!(
            previous = self.current_set.len(),
            next = next.len(),
            "Replacing detected set"
        );

        self.current_set = next;
    }

    /// Record a ranging error. The detected set is not modified.
    pub fn record_error(&mut self, err: RangingError) {
        debug!(error = %err, code = err.error_code(), "Recording ranging error");
        self.last_error = Some(err);
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            detected: self.current_set.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Beacons from the most recent batch.
    #[must_use]
    pub fn detected(&self) -> &[DetectedBeacon] {
        &self.current_set
    }

    /// The last recorded error.
    #[must_use]
    pub const fn last_error(&self) -> Option<&RangingError> {
        self.last_error.as_ref()
    }

    /// Number of currently detected beacons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current_set.len()
    }

    /// Whether no beacon is currently detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_set.is_empty()
    }
}
