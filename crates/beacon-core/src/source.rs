//! Collaborators the controller depends on, and the channel they report on.
//!
//! A [`RangingSource`] and an [`AuthorizationProvider`] never call back into
//! the controller directly. They are handed an [`EventSender`] and push
//! typed [`RangingEvent`]s into the controller's single consumer channel,
//! from whatever thread or task they run on.

use std::fmt;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{RangingError, Result};
use crate::identity::IdentityConstraint;
use crate::types::RawSample;

/// A message delivered to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum RangingEvent {
    /// Answer to an authorization request.
    Authorization {
        /// Whether ranging is allowed.
        granted: bool,
    },
    /// One ranging callback worth of samples.
    Samples(Vec<RawSample>),
    /// A failure reported by the source.
    Error(RangingError),
}

impl RangingEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Authorization { .. } => "authorization",
            Self::Samples(_) => "samples",
            Self::Error(_) => "error",
        }
    }
}

/// Producer half of the controller's event channel.
///
/// Sending never blocks. Every method returns `false` once the controller
/// has been dropped, so producers can wind down.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<RangingEvent>,
}

impl EventSender {
    pub(crate) const fn new(tx: mpsc::UnboundedSender<RangingEvent>) -> Self {
        Self { tx }
    }

    /// Deliver an arbitrary event.
    pub fn send(&self, event: RangingEvent) -> bool {
        trace!(kind = event.kind(), "Delivering ranging event");
        self.tx.send(event).is_ok()
    }

    /// Deliver an authorization decision.
    pub fn authorization(&self, granted: bool) -> bool {
        self.send(RangingEvent::Authorization { granted })
    }

    /// Deliver a batch of samples.
    pub fn samples(&self, samples: Vec<RawSample>) -> bool {
        self.send(RangingEvent::Samples(samples))
    }

    /// Deliver a failure.
    pub fn error(&self, err: RangingError) -> bool {
        self.send(RangingEvent::Error(err))
    }

    /// Whether the controller is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Opaque token identifying an active ranging subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a source-chosen identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The source-chosen identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Something that ranges beacons matching a constraint.
///
/// Implementations deliver sample batches and failures through `events` at
/// their own cadence. The controller does no rate limiting.
pub trait RangingSource: Send {
    /// Begin ranging beacons that satisfy `constraint`.
    ///
    /// # Errors
    ///
    /// Returns an error if ranging cannot be started at all.
    fn start_ranging(
        &mut self,
        constraint: &IdentityConstraint,
        events: EventSender,
    ) -> Result<SubscriptionHandle>;

    /// Stop a subscription returned by [`RangingSource::start_ranging`].
    fn stop_ranging(&mut self, handle: SubscriptionHandle);
}

/// Grants or denies permission to range.
pub trait AuthorizationProvider: Send {
    /// Ask for authorization. The answer arrives later as
    /// [`RangingEvent::Authorization`] on `events`.
    fn request_authorization(&mut self, events: EventSender);
}

/// Provider that answers every request immediately with a fixed decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAuthorization {
    granted: bool,
}

impl StaticAuthorization {
    /// Provider that always grants.
    #[must_use]
    pub const fn granted() -> Self {
        Self { granted: true }
    }

    /// Provider that always denies.
    #[must_use]
    pub const fn denied() -> Self {
        Self { granted: false }
    }
}

impl AuthorizationProvider for StaticAuthorization {
    fn request_authorization(&mut self, events: EventSender) {
        events.authorization(self.granted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = EventSender::new(tx);
        assert!(sender.authorization(true));

        drop(rx);
        assert!(sender.is_closed());
        assert!(!sender.samples(Vec::new()));
    }

    #[test]
    fn test_static_authorization_answers_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        StaticAuthorization::denied().request_authorization(EventSender::new(tx.clone()));
        StaticAuthorization::granted().request_authorization(EventSender::new(tx));

        assert_eq!(
            rx.try_recv().unwrap(),
            RangingEvent::Authorization { granted: false }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            RangingEvent::Authorization { granted: true }
        );
    }

    #[test]
    fn test_events_arrive_in_send_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = EventSender::new(tx);
        sender.error(RangingError::source_failure("first"));
        sender.samples(Vec::new());

        assert_eq!(rx.try_recv().unwrap().kind(), "error");
        assert_eq!(rx.try_recv().unwrap().kind(), "samples");
    }

    #[test]
    fn test_subscription_handle_display() {
        assert_eq!(SubscriptionHandle::new(4).to_string(), "sub-4");
    }
}
