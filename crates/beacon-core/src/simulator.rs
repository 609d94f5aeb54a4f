//! In-process ranging source for tests and demos.
//!
//! [`SimulatedSource`] behaves like a radio that only reports beacons
//! matching the subscribed constraint. Batches are pushed by hand through a
//! [`SimulatorHandle`] or emitted periodically by
//! [`SimulatorHandle::spawn_periodic`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{BeaconError, RangingError, Result};
use crate::identity::{BeaconIdentity, IdentityConstraint};
use crate::source::{EventSender, RangingSource, SubscriptionHandle};
use crate::types::{ProximityClass, RawSample};

/// RSSI offsets applied tick by tick by the periodic emitter.
const RSSI_JITTER: [i16; 6] = [0, -1, 1, -2, 2, -1];

/// A beacon the simulator pretends to hear.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedBeacon {
    /// Advertised identity.
    pub identity: BeaconIdentity,
    /// Reported proximity bucket.
    pub proximity: ProximityClass,
    /// Reported accuracy radius in meters.
    pub accuracy_radius: f64,
    /// Baseline RSSI in dBm.
    pub rssi: i16,
}

impl SimulatedBeacon {
    /// Sample as measured at `timestamp`.
    #[must_use]
    pub fn sample(&self, timestamp: DateTime<Utc>) -> RawSample {
        self.sample_with_jitter(0, timestamp)
    }

    fn sample_with_jitter(&self, jitter: i16, timestamp: DateTime<Utc>) -> RawSample {
        RawSample {
            identity: self.identity,
            proximity_code: self.proximity.code(),
            accuracy_radius: self.accuracy_radius,
            rssi: self.rssi.saturating_add(jitter),
            timestamp,
        }
    }
}

#[derive(Debug)]
struct Subscription {
    handle: SubscriptionHandle,
    constraint: IdentityConstraint,
    events: EventSender,
    active: bool,
}

#[derive(Debug, Default)]
struct SimulatorInner {
    next_id: u64,
    subscriptions: Vec<Subscription>,
    fail_next_start: Option<String>,
}

/// Ranging source driven from test code.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSource {
    inner: Arc<Mutex<SimulatorInner>>,
}

impl SimulatedSource {
    /// Create a simulator with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for pushing events into subscriptions.
    #[must_use]
    pub fn handle(&self) -> SimulatorHandle {
        SimulatorHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl RangingSource for SimulatedSource {
    fn start_ranging(
        &mut self,
        constraint: &IdentityConstraint,
        events: EventSender,
    ) -> Result<SubscriptionHandle> {
        let mut inner = lock(&self.inner);

        if let Some(detail) = inner.fail_next_start.take() {
            return Err(BeaconError::SourceFailure(detail));
        }

        inner.next_id += 1;
        let handle = SubscriptionHandle::new(inner.next_id);
        inner.subscriptions.push(Subscription {
            handle,
            constraint: *constraint,
            events,
            active: true,
        });

        info!(%constraint, %handle, "Simulated ranging started");
        Ok(handle)
    }

    fn stop_ranging(&mut self, handle: SubscriptionHandle) {
        let mut inner = lock(&self.inner);
        if let Some(sub) = inner.subscriptions.iter_mut().find(|s| s.handle == handle) {
            sub.active = false;
            info!(%handle, "Simulated ranging stopped");
        }
    }
}

/// Clonable control surface of a [`SimulatedSource`].
#[derive(Debug, Clone)]
pub struct SimulatorHandle {
    inner: Arc<Mutex<SimulatorInner>>,
}

impl SimulatorHandle {
    /// Deliver a batch to every subscription, stopped ones included, the
    /// way a platform callback can still fire after ranging was stopped.
    ///
    /// Each subscription only receives samples matching its constraint.
    /// Returns how many subscriptions accepted the batch.
    pub fn push_samples(&self, samples: &[RawSample]) -> usize {
        self.deliver(samples, false)
    }

    /// Deliver a failure to every subscription.
    pub fn push_error(&self, err: &RangingError) -> usize {
        lock(&self.inner)
            .subscriptions
            .iter()
            .filter(|sub| sub.events.error(err.clone()))
            .count()
    }

    /// Make the next `start_ranging` call fail with `detail`.
    pub fn fail_next_start(&self, detail: impl Into<String>) {
        lock(&self.inner).fail_next_start = Some(detail.into());
    }

    /// Handles of subscriptions that have not been stopped.
    #[must_use]
    pub fn active_subscriptions(&self) -> Vec<SubscriptionHandle> {
        lock(&self.inner)
            .subscriptions
            .iter()
            .filter(|sub| sub.active)
            .map(|sub| sub.handle)
            .collect()
    }

    /// Whether at least one subscription existed and all are now stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let inner = lock(&self.inner);
        !inner.subscriptions.is_empty() && inner.subscriptions.iter().all(|sub| !sub.active)
    }

    /// Emit one batch of `beacons` every `interval` to active subscriptions.
    ///
    /// The task ends once every subscription has been stopped.
    #[must_use]
    pub fn spawn_periodic(&self, beacons: Vec<SimulatedBeacon>, interval: Duration) -> JoinHandle<()> {
        let handle = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut tick: usize = 0;

            loop {
                ticker.tick().await;
                if handle.is_finished() {
                    debug!("Simulated ranging finished, stopping emitter");
                    break;
                }

                let jitter = RSSI_JITTER[tick % RSSI_JITTER.len()];
                let now = Utc::now();
                let batch: Vec<RawSample> = beacons
                    .iter()
                    .map(|beacon| beacon.sample_with_jitter(jitter, now))
                    .collect();

                handle.deliver(&batch, true);
                tick = tick.wrapping_add(1);
            }
        })
    }

    fn deliver(&self, samples: &[RawSample], active_only: bool) -> usize {
        let inner = lock(&self.inner);
        inner
            .subscriptions
            .iter()
            .filter(|sub| sub.active || !active_only)
            .filter(|sub| {
                let matching: Vec<RawSample> = samples
                    .iter()
                    .filter(|s| sub.constraint.matches(&s.identity))
                    .cloned()
                    .collect();
                sub.events.samples(matching)
            })
            .count()
    }
}

fn lock(inner: &Mutex<SimulatorInner>) -> MutexGuard<'_, SimulatorInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::source::RangingEvent;
    use crate::types::ACCURACY_HUNDRED_METERS;

    fn beacon(minor: u16) -> SimulatedBeacon {
        SimulatedBeacon {
            identity: BeaconIdentity::new(Uuid::from_u128(1), 10, minor),
            proximity: ProximityClass::Far,
            accuracy_radius: ACCURACY_HUNDRED_METERS,
            rssi: -80,
        }
    }

    fn subscribe(
        source: &mut SimulatedSource,
        minor: u16,
    ) -> (SubscriptionHandle, mpsc::UnboundedReceiver<RangingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let constraint = IdentityConstraint::new(Uuid::from_u128(1), 10, minor);
        let handle = source
            .start_ranging(&constraint, EventSender::new(tx))
            .unwrap();
        (handle, rx)
    }

    #[test]
    fn test_push_filters_by_constraint() {
        let mut source = SimulatedSource::new();
        let (_, mut rx) = subscribe(&mut source, 2);

        let now = Utc::now();
        let delivered = source
            .handle()
            .push_samples(&[beacon(1).sample(now), beacon(2).sample(now)]);
        assert_eq!(delivered, 1);

        match rx.try_recv().unwrap() {
            RangingEvent::Samples(samples) => {
                assert_eq!(samples.len(), 1);
                assert_eq!(samples[0].identity.minor, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_stop_marks_subscription_inactive() {
        let mut source = SimulatedSource::new();
        let handle = source.handle();
        let (sub, _rx) = subscribe(&mut source, 2);
        assert_eq!(handle.active_subscriptions(), vec![sub]);
        assert!(!handle.is_finished());

        source.stop_ranging(sub);
        assert!(handle.active_subscriptions().is_empty());
        assert!(handle.is_finished());
    }

    #[test]
    fn test_fail_next_start() {
        let mut source = SimulatedSource::new();
        source.handle().fail_next_start("no radio");

        let (tx, _rx) = mpsc::unbounded_channel();
        let constraint = IdentityConstraint::new(Uuid::nil(), 0, 0);
        let err = source
            .start_ranging(&constraint, EventSender::new(tx))
            .unwrap_err();
        assert!(matches!(err, BeaconError::SourceFailure(ref d) if d == "no radio"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_emitter_stops_with_subscription() {
        let mut source = SimulatedSource::new();
        let handle = source.handle();
        let (sub, mut rx) = subscribe(&mut source, 2);

        let task = handle.spawn_periodic(vec![beacon(2)], Duration::from_millis(100));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, RangingEvent::Samples(ref s) if s.len() == 1));

        source.stop_ranging(sub);
        task.await.unwrap();
    }
}
