//! Samples, detected beacons and their classifications.
//!
//! A [`RawSample`] is what a ranging source reports for one beacon in one
//! ranging callback. The registry turns each sample into a
//! [`DetectedBeacon`], classifying the raw proximity code and the accuracy
//! radius along the way.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::RangingError;
use crate::identity::BeaconIdentity;

// ============================================================================
// Proximity
// ============================================================================

/// Raw proximity code for "unknown".
pub const PROXIMITY_CODE_UNKNOWN: i64 = 0;
/// Raw proximity code for "immediate".
pub const PROXIMITY_CODE_IMMEDIATE: i64 = 1;
/// Raw proximity code for "near".
pub const PROXIMITY_CODE_NEAR: i64 = 2;
/// Raw proximity code for "far".
pub const PROXIMITY_CODE_FAR: i64 = 3;

/// Coarse distance bucket.
///
/// The derived ordering (`Immediate < Near < Far < Unknown`) exists for
/// display sorting only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ProximityClass {
    /// Within a few centimetres to tens of centimetres.
    Immediate,
    /// Within a few metres.
    Near,
    /// Tens of metres.
    Far,
    /// The source could not tell.
    Unknown,
}

impl ProximityClass {
    /// Classify a raw proximity code. Codes the engine does not know map to
    /// [`ProximityClass::Unknown`].
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            PROXIMITY_CODE_IMMEDIATE => Self::Immediate,
            PROXIMITY_CODE_NEAR => Self::Near,
            PROXIMITY_CODE_FAR => Self::Far,
            _ => Self::Unknown,
        }
    }

    /// The raw code a source would report for this class.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Immediate => PROXIMITY_CODE_IMMEDIATE,
            Self::Near => PROXIMITY_CODE_NEAR,
            Self::Far => PROXIMITY_CODE_FAR,
            Self::Unknown => PROXIMITY_CODE_UNKNOWN,
        }
    }

    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "Immediate",
            Self::Near => "Near",
            Self::Far => "Far",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ProximityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Accuracy
// ============================================================================

/// Sentinel radius (meters) for [`AccuracyClass::BestForNavigation`].
pub const ACCURACY_BEST_FOR_NAVIGATION: f64 = 0.0;
/// Sentinel radius (meters) for [`AccuracyClass::Best`].
pub const ACCURACY_BEST: f64 = 1.0;
/// Sentinel radius (meters) for [`AccuracyClass::NearestTenMeters`].
pub const ACCURACY_NEAREST_TEN_METERS: f64 = 10.0;
/// Sentinel radius (meters) for [`AccuracyClass::HundredMeters`].
pub const ACCURACY_HUNDRED_METERS: f64 = 100.0;
/// Sentinel radius (meters) for [`AccuracyClass::Kilometer`].
pub const ACCURACY_KILOMETER: f64 = 1_000.0;
/// Sentinel radius (meters) for [`AccuracyClass::ThreeKilometers`].
pub const ACCURACY_THREE_KILOMETERS: f64 = 3_000.0;

/// Named accuracy radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyClass {
    /// Highest possible accuracy.
    BestForNavigation,
    /// Best available accuracy.
    Best,
    /// Within ten metres.
    NearestTenMeters,
    /// Within a hundred metres.
    HundredMeters,
    /// Within a kilometre.
    Kilometer,
    /// Within three kilometres.
    ThreeKilometers,
    /// The radius is not one of the named sentinels.
    Unclassified,
}

impl AccuracyClass {
    const NAMED: [(f64, Self); 6] = [
        (ACCURACY_BEST_FOR_NAVIGATION, Self::BestForNavigation),
        (ACCURACY_BEST, Self::Best),
        (ACCURACY_NEAREST_TEN_METERS, Self::NearestTenMeters),
        (ACCURACY_HUNDRED_METERS, Self::HundredMeters),
        (ACCURACY_KILOMETER, Self::Kilometer),
        (ACCURACY_THREE_KILOMETERS, Self::ThreeKilometers),
    ];

    /// Classify an accuracy radius.
    ///
    /// Matching is exact: only a radius equal to one of the sentinels gets a
    /// named class. Everything else, including negative ("unknown") radii and
    /// NaN, is [`AccuracyClass::Unclassified`].
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn from_radius(radius: f64) -> Self {
        // -0.0 compares equal to the 0.0 sentinel
        if radius.is_sign_negative() {
            return Self::Unclassified;
        }
        Self::NAMED
            .iter()
            .find(|(sentinel, _)| *sentinel == radius)
            .map_or(Self::Unclassified, |&(_, class)| class)
    }

    /// The sentinel radius for a named class.
    #[must_use]
    pub fn sentinel_radius(self) -> Option<f64> {
        Self::NAMED
            .iter()
            .find(|(_, class)| *class == self)
            .map(|&(radius, _)| radius)
    }

    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BestForNavigation => "BestForNavigation",
            Self::Best => "Best",
            Self::NearestTenMeters => "NearestTenMeters",
            Self::HundredMeters => "HundredMeters",
            Self::Kilometer => "Kilometer",
            Self::ThreeKilometers => "ThreeKilometers",
            Self::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for AccuracyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Samples and detected beacons
// ============================================================================

/// One beacon as reported by a ranging source in a single callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Advertised identity.
    pub identity: BeaconIdentity,
    /// Raw proximity code (see `PROXIMITY_CODE_*`).
    pub proximity_code: i64,
    /// Accuracy radius in meters; negative means unknown.
    pub accuracy_radius: f64,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// When the source measured this sample.
    pub timestamp: DateTime<Utc>,
}

/// A beacon in the current detected set.
///
/// Built fresh from a [`RawSample`] on every ranging batch and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DetectedBeacon {
    /// Proximity UUID.
    pub uuid: Uuid,
    /// Major value.
    pub major: u16,
    /// Minor value.
    pub minor: u16,
    /// Classified proximity bucket.
    pub proximity: ProximityClass,
    /// Classified accuracy radius.
    pub accuracy: AccuracyClass,
    /// Accuracy radius in meters as reported.
    pub accuracy_radius: f64,
    /// Signal strength in dBm.
    #[schema(example = -59)]
    pub rssi: i16,
    /// When the sample was measured.
    pub observed_at: DateTime<Utc>,
}

impl DetectedBeacon {
    /// Classify a raw sample.
    #[must_use]
    pub fn from_sample(sample: &RawSample) -> Self {
        Self {
            uuid: sample.identity.uuid,
            major: sample.identity.major,
            minor: sample.identity.minor,
            proximity: ProximityClass::from_code(sample.proximity_code),
            accuracy: AccuracyClass::from_radius(sample.accuracy_radius),
            accuracy_radius: sample.accuracy_radius,
            rssi: sample.rssi,
            observed_at: sample.timestamp,
        }
    }

    /// Identity key of this beacon.
    #[must_use]
    pub const fn identity(&self) -> BeaconIdentity {
        BeaconIdentity::new(self.uuid, self.major, self.minor)
    }
}

impl From<&RawSample> for DetectedBeacon {
    fn from(sample: &RawSample) -> Self {
        Self::from_sample(sample)
    }
}

/// Read-only view of the registry handed to observers.
///
/// The detected set and the error are independent: a snapshot can carry
/// fresh beacons and an older error at the same time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Beacons in the most recent batch, in source order.
    pub detected: Vec<DetectedBeacon>,
    /// The most recent ranging error, if any was ever recorded.
    pub last_error: Option<RangingError>,
}

impl Snapshot {
    /// Whether no beacon is currently detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(proximity_code: i64, accuracy_radius: f64) -> RawSample {
        RawSample {
            identity: BeaconIdentity::new(Uuid::nil(), 1, 2),
            proximity_code,
            accuracy_radius,
            rssi: -59,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_proximity_from_code() {
        assert_eq!(ProximityClass::from_code(0), ProximityClass::Unknown);
        assert_eq!(ProximityClass::from_code(1), ProximityClass::Immediate);
        assert_eq!(ProximityClass::from_code(2), ProximityClass::Near);
        assert_eq!(ProximityClass::from_code(3), ProximityClass::Far);
        assert_eq!(ProximityClass::from_code(42), ProximityClass::Unknown);
        assert_eq!(ProximityClass::from_code(-1), ProximityClass::Unknown);
    }

    #[test]
    fn test_proximity_display_ordering() {
        let mut classes = vec![
            ProximityClass::Unknown,
            ProximityClass::Far,
            ProximityClass::Immediate,
            ProximityClass::Near,
        ];
        classes.sort();
        assert_eq!(
            classes,
            vec![
                ProximityClass::Immediate,
                ProximityClass::Near,
                ProximityClass::Far,
                ProximityClass::Unknown,
            ]
        );
    }

    #[test]
    fn test_accuracy_exact_sentinels() {
        assert_eq!(AccuracyClass::from_radius(0.0), AccuracyClass::BestForNavigation);
        assert_eq!(AccuracyClass::from_radius(1.0), AccuracyClass::Best);
        assert_eq!(AccuracyClass::from_radius(10.0), AccuracyClass::NearestTenMeters);
        assert_eq!(AccuracyClass::from_radius(100.0), AccuracyClass::HundredMeters);
        assert_eq!(AccuracyClass::from_radius(1_000.0), AccuracyClass::Kilometer);
        assert_eq!(AccuracyClass::from_radius(3_000.0), AccuracyClass::ThreeKilometers);
    }

    #[test]
    fn test_accuracy_non_sentinel_is_unclassified() {
        assert_eq!(AccuracyClass::from_radius(7.3), AccuracyClass::Unclassified);
        assert_eq!(AccuracyClass::from_radius(-1.0), AccuracyClass::Unclassified);
        assert_eq!(AccuracyClass::from_radius(-0.0), AccuracyClass::Unclassified);
        assert_eq!(AccuracyClass::from_radius(10.000_001), AccuracyClass::Unclassified);
        assert_eq!(AccuracyClass::from_radius(5_000.0), AccuracyClass::Unclassified);
        assert_eq!(AccuracyClass::from_radius(f64::NAN), AccuracyClass::Unclassified);
    }

    #[test]
    fn test_sentinel_radius_round_trip() {
        assert_eq!(
            AccuracyClass::NearestTenMeters.sentinel_radius(),
            Some(ACCURACY_NEAREST_TEN_METERS)
        );
        assert_eq!(AccuracyClass::Unclassified.sentinel_radius(), None);
    }

    #[test]
    fn test_detected_beacon_from_sample() {
        let raw = sample(PROXIMITY_CODE_NEAR, ACCURACY_NEAREST_TEN_METERS);
        let beacon = DetectedBeacon::from_sample(&raw);
        assert_eq!(beacon.identity(), raw.identity);
        assert_eq!(beacon.proximity, ProximityClass::Near);
        assert_eq!(beacon.accuracy, AccuracyClass::NearestTenMeters);
        assert_eq!(beacon.rssi, -59);
        assert_eq!(beacon.observed_at, raw.timestamp);
    }

    #[test]
    fn test_detected_beacon_serialization() {
        let beacon = DetectedBeacon::from_sample(&sample(PROXIMITY_CODE_FAR, 7.3));
        let json = serde_json::to_string(&beacon).unwrap();
        assert!(json.contains("\"proximity\":\"far\""));
        assert!(json.contains("\"accuracy\":\"unclassified\""));
    }
}
