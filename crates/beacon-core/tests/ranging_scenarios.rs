//! End-to-end ranging scenarios against the simulated source.

#![cfg(feature = "simulator")]

use std::time::Duration;

use beacon_core::types::{ACCURACY_NEAREST_TEN_METERS, PROXIMITY_CODE_NEAR};
use beacon_core::{
    AccuracyClass, ControllerState, IdentityConstraint, ProximityClass, RangingController,
    RangingError, RawSample, SimulatedBeacon, SimulatedSource, StaticAuthorization,
};
use chrono::Utc;
use tokio_test::{assert_pending, task};

const DEMO_UUID: &str = "41462998-6CEB-4511-9D46-1F7E27AA6572";

fn demo_constraint() -> IdentityConstraint {
    IdentityConstraint::parse(DEMO_UUID, 18, 5).unwrap()
}

fn demo_sample(rssi: i16) -> RawSample {
    RawSample {
        identity: demo_constraint().identity(),
        proximity_code: PROXIMITY_CODE_NEAR,
        accuracy_radius: ACCURACY_NEAREST_TEN_METERS,
        rssi,
        timestamp: Utc::now(),
    }
}

fn ranging_controller() -> (
    RangingController<SimulatedSource, StaticAuthorization>,
    beacon_core::SimulatorHandle,
) {
    let source = SimulatedSource::new();
    let handle = source.handle();
    let mut controller = RangingController::new(source, StaticAuthorization::granted());
    controller.start(demo_constraint()).unwrap();
    controller.process_pending();
    assert_eq!(controller.state(), ControllerState::Ranging);
    (controller, handle)
}

#[test]
fn test_single_beacon_is_classified() {
    let (mut controller, simulator) = ranging_controller();

    simulator.push_samples(&[demo_sample(-59)]);
    controller.process_pending();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.detected.len(), 1);
    let beacon = &snapshot.detected[0];
    assert_eq!(beacon.identity(), demo_constraint().identity());
    assert_eq!(beacon.proximity, ProximityClass::Near);
    assert_eq!(beacon.accuracy, AccuracyClass::NearestTenMeters);
    assert_eq!(beacon.rssi, -59);
    assert!(snapshot.last_error.is_none());
}

#[test]
fn test_error_and_data_are_reported_together() {
    let (mut controller, simulator) = ranging_controller();

    simulator.push_error(&RangingError::source_failure("denied"));
    simulator.push_samples(&[demo_sample(-61)]);
    controller.process_pending();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.detected.len(), 1);
    assert_eq!(
        snapshot.last_error,
        Some(RangingError::source_failure("denied"))
    );
}

#[test]
fn test_only_latest_batch_is_visible() {
    let (mut controller, simulator) = ranging_controller();

    for rssi in [-70, -65, -60] {
        simulator.push_samples(&[demo_sample(rssi), demo_sample(rssi - 1)]);
    }
    simulator.push_samples(&[demo_sample(-50)]);
    controller.process_pending();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.detected.len(), 1);
    assert_eq!(snapshot.detected[0].rssi, -50);
}

#[test]
fn test_non_matching_beacons_are_filtered_by_source() {
    let (mut controller, simulator) = ranging_controller();

    let mut other = demo_sample(-40);
    other.identity.minor = 6;
    simulator.push_samples(&[other, demo_sample(-59)]);
    controller.process_pending();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.detected.len(), 1);
    assert_eq!(snapshot.detected[0].minor, 5);
}

#[test]
fn test_late_sample_after_stop_is_discarded() {
    let (mut controller, simulator) = ranging_controller();
    simulator.push_samples(&[demo_sample(-59)]);
    controller.process_pending();
    let before = controller.snapshot();

    controller.stop();
    simulator.push_samples(&[demo_sample(-30), demo_sample(-31)]);
    simulator.push_error(&RangingError::source_failure("late"));
    controller.process_pending();

    assert_eq!(controller.snapshot(), before);
    assert!(simulator.active_subscriptions().is_empty());
}

#[test]
fn test_second_stop_is_a_no_op() {
    let (mut controller, simulator) = ranging_controller();
    controller.stop();
    let snapshot = controller.snapshot();

    controller.stop();

    assert_eq!(controller.state(), ControllerState::Stopped);
    assert_eq!(controller.snapshot(), snapshot);
    assert!(simulator.is_finished());
}

#[test]
fn test_denied_authorization_surfaces_error() {
    let source = SimulatedSource::new();
    let simulator = source.handle();
    let mut controller = RangingController::new(source, StaticAuthorization::denied());
    controller.start(demo_constraint()).unwrap();
    controller.process_pending();

    assert_eq!(
        controller.snapshot().last_error,
        Some(RangingError::AuthorizationDenied)
    );
    assert!(simulator.active_subscriptions().is_empty());
    assert_ne!(controller.state(), ControllerState::Ranging);
}

#[test]
fn test_source_start_failure_surfaces_error() {
    let source = SimulatedSource::new();
    source.handle().fail_next_start("adapter powered off");
    let mut controller = RangingController::new(source, StaticAuthorization::granted());
    controller.start(demo_constraint()).unwrap();
    controller.process_pending();

    assert_eq!(
        controller.snapshot().last_error,
        Some(RangingError::source_failure("adapter powered off"))
    );
}

#[test]
fn test_next_event_waits_for_delivery() {
    let (mut controller, _simulator) = ranging_controller();

    let mut next = task::spawn(controller.next_event());
    assert_pending!(next.poll());
}

#[tokio::test(start_paused = true)]
async fn test_periodic_source_feeds_observers() {
    let (mut controller, simulator) = ranging_controller();
    let mut snapshots = controller.subscribe();

    let emitter = simulator.spawn_periodic(
        vec![SimulatedBeacon {
            identity: demo_constraint().identity(),
            proximity: ProximityClass::Near,
            accuracy_radius: ACCURACY_NEAREST_TEN_METERS,
            rssi: -59,
        }],
        Duration::from_millis(500),
    );

    let watcher = async {
        for _ in 0..2 {
            snapshots.changed().await.unwrap();
        }
        snapshots.borrow().clone()
    };

    let (observed, ()) = tokio::join!(watcher, controller.run_until(async {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }));

    assert_eq!(observed.detected.len(), 1);
    assert_eq!(observed.detected[0].proximity, ProximityClass::Near);
    assert_eq!(controller.state(), ControllerState::Stopped);

    emitter.await.unwrap();
}
