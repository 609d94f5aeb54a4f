//! iBeacon advertisement decoding.
//!
//! An iBeacon is a BLE advertisement carrying Apple manufacturer data:
//!
//! ```text
//! company 0x004C | 0x02 0x15 | uuid (16) | major (2, BE) | minor (2, BE) | power (1, i8)
//! ```
//!
//! `power` is the calibrated RSSI at one metre, used to estimate distance.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::identity::BeaconIdentity;
use crate::types::{
    RawSample, PROXIMITY_CODE_FAR, PROXIMITY_CODE_IMMEDIATE, PROXIMITY_CODE_NEAR,
    PROXIMITY_CODE_UNKNOWN,
};

/// Bluetooth SIG company identifier assigned to Apple.
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Beacon type byte followed by the remaining payload length.
const IBEACON_PREFIX: [u8; 2] = [0x02, 0x15];

/// Length of the manufacturer payload after the company identifier.
pub const IBEACON_PAYLOAD_LEN: usize = 23;

/// Path-loss exponent for free space.
const PATH_LOSS_EXPONENT: f64 = 2.0;

/// Distance (m) under which a beacon is "immediate".
pub const IMMEDIATE_MAX_METERS: f64 = 0.5;

/// Distance (m) under which a beacon is "near".
pub const NEAR_MAX_METERS: f64 = 4.0;

/// A decoded iBeacon advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised identity.
    pub identity: BeaconIdentity,
    /// Calibrated RSSI at one metre, in dBm.
    pub measured_power: i8,
}

impl Advertisement {
    /// Encode back into manufacturer payload bytes.
    #[must_use]
    pub fn to_manufacturer_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(IBEACON_PAYLOAD_LEN);
        data.extend_from_slice(&IBEACON_PREFIX);
        data.extend_from_slice(self.identity.uuid.as_bytes());
        data.extend_from_slice(&self.identity.major.to_be_bytes());
        data.extend_from_slice(&self.identity.minor.to_be_bytes());
        data.extend_from_slice(&self.measured_power.to_be_bytes());
        data
    }

    /// Turn a reception of this advertisement into a ranging sample.
    #[must_use]
    pub fn to_sample(&self, rssi: i16, timestamp: DateTime<Utc>) -> RawSample {
        let distance = estimate_distance(rssi, self.measured_power);
        RawSample {
            identity: self.identity,
            proximity_code: proximity_code_for_distance(distance),
            accuracy_radius: distance,
            rssi,
            timestamp,
        }
    }
}

/// Decode manufacturer data, returning `None` for anything that is not an
/// iBeacon frame.
#[must_use]
pub fn parse_manufacturer_data(company_id: u16, data: &[u8]) -> Option<Advertisement> {
    if company_id != APPLE_COMPANY_ID || data.len() != IBEACON_PAYLOAD_LEN {
        return None;
    }
    if data[..2] != IBEACON_PREFIX {
        return None;
    }

    let uuid = Uuid::from_slice(&data[2..18]).ok()?;
    let major = u16::from_be_bytes([data[18], data[19]]);
    let minor = u16::from_be_bytes([data[20], data[21]]);
    let measured_power = i8::from_be_bytes([data[22]]);

    Some(Advertisement {
        identity: BeaconIdentity::new(uuid, major, minor),
        measured_power,
    })
}

/// Estimate distance in metres from RSSI using a log-distance path-loss
/// model. Returns `-1.0` when the RSSI is unknown (`0`) or the calibration
/// is missing.
#[must_use]
pub fn estimate_distance(rssi: i16, measured_power: i8) -> f64 {
    if rssi == 0 || measured_power == 0 {
        return -1.0;
    }
    let exponent = (f64::from(measured_power) - f64::from(rssi)) / (10.0 * PATH_LOSS_EXPONENT);
    10f64.powf(exponent)
}

/// Raw proximity code for an estimated distance.
#[must_use]
pub fn proximity_code_for_distance(distance: f64) -> i64 {
    if distance.is_nan() || distance < 0.0 {
        PROXIMITY_CODE_UNKNOWN
    } else if distance < IMMEDIATE_MAX_METERS {
        PROXIMITY_CODE_IMMEDIATE
    } else if distance < NEAR_MAX_METERS {
        PROXIMITY_CODE_NEAR
    } else {
        PROXIMITY_CODE_FAR
    }
}
