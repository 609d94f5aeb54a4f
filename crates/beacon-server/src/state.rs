//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use beacon_core::{ControllerState, IdentityConstraint, Snapshot, SnapshotReceiver, StateReceiver};

/// Shared application state.
pub type SharedState = AppState;

/// Read side of a running ranging engine.
///
/// Handlers only ever see what the controller last published, so a request
/// never waits on the ranging task.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    constraint: IdentityConstraint,
    snapshots: SnapshotReceiver,
    states: StateReceiver,
    started_at: Instant,
}

impl AppState {
    /// Create state observing a controller through its watch channels.
    #[must_use]
    pub fn new(
        constraint: IdentityConstraint,
        snapshots: SnapshotReceiver,
        states: StateReceiver,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                constraint,
                snapshots,
                states,
                started_at: Instant::now(),
            }),
        }
    }

    /// Constraint being ranged.
    #[must_use]
    pub fn constraint(&self) -> IdentityConstraint {
        self.inner.constraint
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Latest published controller state.
    #[must_use]
    pub fn controller_state(&self) -> ControllerState {
        *self.inner.states.borrow()
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
impl AppState {
    /// State frozen at a fixed snapshot and controller state.
    pub(crate) fn fixed(snapshot: Snapshot, state: ControllerState) -> Self {
        let constraint =
            IdentityConstraint::parse("41462998-6CEB-4511-9D46-1F7E27AA6572", 18, 5).unwrap();
        let (_snapshot_tx, snapshots) = tokio::sync::watch::channel(snapshot);
        let (_state_tx, states) = tokio::sync::watch::channel(state);
        Self::new(constraint, snapshots, states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_state_reads_back() {
        let state = AppState::fixed(Snapshot::default(), ControllerState::Ranging);
        assert_eq!(state.controller_state(), ControllerState::Ranging);
        assert!(state.snapshot().is_empty());
        assert_eq!(state.constraint().major(), 18);
    }
}
