//! Ranging lifecycle.
//!
//! [`RangingController`] owns the [`BeaconRegistry`] and is the single
//! consumer of the event channel its collaborators report on. Everything
//! that mutates the registry goes through [`RangingController::handle_event`],
//! in delivery order.
//!
//! ```text
//! Idle --start--> Authorizing --granted--> Ranging
//!   \                 \                       |
//!    `----------------`------- stop ---------`--> Stopped
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};
use utoipa::ToSchema;

use crate::error::{BeaconError, RangingError, Result};
use crate::identity::IdentityConstraint;
use crate::registry::BeaconRegistry;
use crate::source::{
    AuthorizationProvider, EventSender, RangingEvent, RangingSource, SubscriptionHandle,
};
use crate::types::Snapshot;

/// Push channel observers can watch for new snapshots.
pub type SnapshotReceiver = watch::Receiver<Snapshot>;

/// Push channel observers can watch for lifecycle changes.
pub type StateReceiver = watch::Receiver<ControllerState>;

/// Lifecycle state of a [`RangingController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Created, not started.
    Idle,
    /// Waiting for the authorization answer.
    Authorizing,
    /// Subscribed to the source or receiving samples.
    Ranging,
    /// Terminal. Nothing is processed any more.
    Stopped,
}

impl ControllerState {
    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::Ranging => "ranging",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrates authorization, the ranging subscription and the registry.
pub struct RangingController<S: RangingSource, A: AuthorizationProvider> {
    source: S,
    authorization: A,
    registry: BeaconRegistry,
    state: ControllerState,
    constraint: Option<IdentityConstraint>,
    subscription: Option<SubscriptionHandle>,
    events_tx: mpsc::UnboundedSender<RangingEvent>,
    events_rx: mpsc::UnboundedReceiver<RangingEvent>,
    snapshots: watch::Sender<Snapshot>,
    states: watch::Sender<ControllerState>,
}

impl<S: RangingSource, A: AuthorizationProvider> RangingController<S, A> {
    /// Create an idle controller with an empty registry.
    pub fn new(source: S, authorization: A) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(Snapshot::default());
        let (states, _) = watch::channel(ControllerState::Idle);

        Self {
            source,
            authorization,
            registry: BeaconRegistry::new(),
            state: ControllerState::Idle,
            constraint: None,
            subscription: None,
            events_tx,
            events_rx,
            snapshots,
            states,
        }
    }

    /// Start ranging beacons that satisfy `constraint`.
    ///
    /// Moves to [`ControllerState::Authorizing`] and asks the authorization
    /// provider. Ranging begins once a grant is processed.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::InvalidTransition`] unless the controller is
    /// idle.
    pub fn start(&mut self, constraint: IdentityConstraint) -> Result<()> {
        if self.state != ControllerState::Idle {
            return Err(BeaconError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }

        info!(%constraint, "Starting beacon ranging");
        self.constraint = Some(constraint);
        self.set_state(ControllerState::Authorizing);
        self.authorization.request_authorization(self.event_sender());
        Ok(())
    }

    /// Stop ranging. Safe to call any number of times from any state.
    ///
    /// After this returns, every event still in flight is discarded.
    pub fn stop(&mut self) {
        if self.state == ControllerState::Stopped {
            trace!("Stop requested on a stopped controller");
            return;
        }

        if let Some(handle) = self.subscription.take() {
            debug!(%handle, "Unsubscribing from ranging source");
            self.source.stop_ranging(handle);
        }

        info!(from = %self.state, "Stopping beacon ranging");
        self.events_rx.close();
        self.set_state(ControllerState::Stopped);
    }

    /// Apply one event.
    pub fn handle_event(&mut self, event: RangingEvent) {
        if self.state == ControllerState::Stopped {
            debug!(kind = event.kind(), "Discarding event delivered after stop");
            return;
        }

        match event {
            RangingEvent::Authorization { granted } => self.on_authorization(granted),
            RangingEvent::Samples(samples) if self.state == ControllerState::Idle => {
                debug!(count = samples.len(), "Discarding samples delivered before start");
            }
            RangingEvent::Samples(samples) => {
                self.registry.replace_detected_set(&samples);
                self.set_state(ControllerState::Ranging);
                self.publish();
            }
            RangingEvent::Error(err) => {
                warn!(error = %err, state = %self.state, "Ranging error reported");
                self.registry.record_error(err);
                self.publish();
            }
        }
    }

    /// Apply every event that is already queued, without waiting.
    ///
    /// Returns how many events were taken off the channel.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }

    /// Wait for the next event and apply it.
    ///
    /// Returns `false` once the controller is stopped and nothing is left to
    /// take off the channel.
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Process events until `shutdown` resolves, then stop.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        while self.state != ControllerState::Stopped {
            let event = tokio::select! {
                () = &mut shutdown => None,
                event = self.events_rx.recv() => event,
            };

            let Some(event) = event else { break };
            self.handle_event(event);
        }

        self.stop();
    }

    /// Current registry contents. Never blocks.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    /// Watch snapshots as they are published.
    #[must_use]
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshots.subscribe()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> StateReceiver {
        self.states.subscribe()
    }

    /// A producer handle for the controller's event channel.
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(self.events_tx.clone())
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Constraint passed to [`RangingController::start`], if started.
    #[must_use]
    pub const fn constraint(&self) -> Option<IdentityConstraint> {
        self.constraint
    }

    /// Active subscription, if the source has been started.
    #[must_use]
    pub const fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscription
    }

    /// Read access to the registry.
    #[must_use]
    pub const fn registry(&self) -> &BeaconRegistry {
        &self.registry
    }

    fn on_authorization(&mut self, granted: bool) {
        if self.state == ControllerState::Idle || self.subscription.is_some() {
            debug!(granted, state = %self.state, "Ignoring unexpected authorization result");
            return;
        }
        let Some(constraint) = self.constraint else {
            return;
        };

        if !granted {
            warn!(%constraint, "Ranging authorization denied");
            self.registry.record_error(RangingError::AuthorizationDenied);
            self.publish();
            return;
        }

        match self.source.start_ranging(&constraint, self.event_sender()) {
            Ok(handle) => {
                info!(%constraint, %handle, "Ranging source started");
                self.subscription = Some(handle);
                self.set_state(ControllerState::Ranging);
            }
            Err(err) => {
                error!(%constraint, error = %err, "Failed to start ranging source");
                self.registry.record_error(as_ranging_error(err));
                self.publish();
            }
        }
    }

    fn set_state(&mut self, next: ControllerState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Controller state change");
            self.state = next;
            self.states.send_replace(next);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.registry.snapshot());
    }
}

impl<S: RangingSource, A: AuthorizationProvider> Drop for RangingController<S, A> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn as_ranging_error(err: BeaconError) -> RangingError {
    match err {
        BeaconError::AuthorizationDenied => RangingError::AuthorizationDenied,
        BeaconError::SourceFailure(detail) => RangingError::SourceFailure(detail),
        other => RangingError::SourceFailure(other.to_string()),
    }
}
