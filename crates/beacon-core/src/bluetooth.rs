//! BlueZ-backed ranging source (Linux only).
//!
//! Runs LE discovery through `bluer`, decodes iBeacon manufacturer data and
//! emits one batch per interval with every device advertising the
//! constrained identity that was heard within the staleness window.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use bluer::{AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport};
use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{BeaconError, RangingError, Result};
use crate::ibeacon;
use crate::identity::IdentityConstraint;
use crate::source::{EventSender, RangingSource, SubscriptionHandle};
use crate::types::RawSample;

/// Ranging source using the default BlueZ adapter.
#[derive(Debug)]
pub struct BluezSource {
    batch_interval: Duration,
    stale_after: Duration,
    next_id: u64,
    tasks: HashMap<SubscriptionHandle, JoinHandle<()>>,
}

impl BluezSource {
    /// Create a source emitting a batch every `batch_interval`.
    #[must_use]
    pub fn new(batch_interval: Duration, stale_after: Duration) -> Self {
        Self {
            batch_interval,
            stale_after,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }
}

impl RangingSource for BluezSource {
    fn start_ranging(
        &mut self,
        constraint: &IdentityConstraint,
        events: EventSender,
    ) -> Result<SubscriptionHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BeaconError::SourceFailure(format!("No async runtime: {e}")))?;

        self.next_id += 1;
        let handle = SubscriptionHandle::new(self.next_id);
        let task = runtime.spawn(range(
            *constraint,
            events,
            self.batch_interval,
            self.stale_after,
        ));
        self.tasks.insert(handle, task);

        info!(%constraint, %handle, "BlueZ ranging started");
        Ok(handle)
    }

    fn stop_ranging(&mut self, handle: SubscriptionHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
            info!(%handle, "BlueZ ranging stopped");
        }
    }
}

impl Drop for BluezSource {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

async fn range(
    constraint: IdentityConstraint,
    events: EventSender,
    batch_interval: Duration,
    stale_after: Duration,
) {
    if let Err(err) = discover(&constraint, &events, batch_interval, stale_after).await {
        warn!(%constraint, error = %err, "BlueZ discovery failed");
        events.error(RangingError::source_failure(err.to_string()));
    }
}

async fn discover(
    constraint: &IdentityConstraint,
    events: &EventSender,
    batch_interval: Duration,
    stale_after: Duration,
) -> bluer::Result<()> {
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    adapter
        .set_discovery_filter(DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            duplicate_data: true,
            ..DiscoveryFilter::default()
        })
        .await?;

    debug!(adapter = adapter.name(), "Starting LE discovery");
    let discovery = adapter.discover_devices_with_changes().await?;
    let mut discovery = std::pin::pin!(discovery);

    let mut heard: HashMap<Address, (RawSample, Instant)> = HashMap::new();
    let mut ticker = tokio::time::interval(batch_interval);

    loop {
        tokio::select! {
            event = discovery.next() => {
                let Some(event) = event else { break };
                if let AdapterEvent::DeviceAdded(address) = event {
                    if let Some(sample) = read_sample(&adapter, address, constraint).await {
                        heard.insert(address, (sample, Instant::now()));
                    }
                }
            }
            _ = ticker.tick() => {
                let batch = fresh_batch(&mut heard, Instant::now(), stale_after);
                if !events.samples(batch) {
                    debug!("Controller gone, ending discovery");
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn read_sample(
    adapter: &bluer::Adapter,
    address: Address,
    constraint: &IdentityConstraint,
) -> Option<RawSample> {
    let device = adapter.device(address).ok()?;
    let data = device.manufacturer_data().await.ok().flatten()?;
    let payload = data.get(&ibeacon::APPLE_COMPANY_ID)?;
    let advertisement = ibeacon::parse_manufacturer_data(ibeacon::APPLE_COMPANY_ID, payload)?;

    if !constraint.matches(&advertisement.identity) {
        return None;
    }

    let rssi = device.rssi().await.ok().flatten().unwrap_or(0);
    Some(advertisement.to_sample(rssi, Utc::now()))
}

/// Drop entries older than `stale_after` and return the rest, closest first.
fn fresh_batch<K: Eq + Hash>(
    heard: &mut HashMap<K, (RawSample, Instant)>,
    now: Instant,
    stale_after: Duration,
) -> Vec<RawSample> {
    heard.retain(|_, (_, seen_at)| now.saturating_duration_since(*seen_at) <= stale_after);

    let mut batch: Vec<RawSample> = heard.values().map(|(sample, _)| sample.clone()).collect();
    batch.sort_by(|a, b| {
        let key = |s: &RawSample| {
            if s.accuracy_radius < 0.0 {
                f64::INFINITY
            } else {
                s.accuracy_radius
            }
        };
        key(a).total_cmp(&key(b))
    });
    batch
}
