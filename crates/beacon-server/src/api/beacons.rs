//! Detected beacon endpoints.
//!
//! Both handlers read the latest published snapshot and never touch the
//! ranging task directly.

use std::cmp::Reverse;

use axum::extract::State;
use axum::Json;
use beacon_core::{ControllerState, DetectedBeacon, RangingError, Snapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

// ============================================================================
// Response Types
// ============================================================================

/// The last ranging error, as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "code": "AUTHORIZATION_DENIED",
    "message": "Ranging authorization was denied. Grant location access to enable beacon ranging."
}))]
pub struct RangingErrorBody {
    /// Machine-readable error code.
    #[schema(example = "SOURCE_FAILURE")]
    pub code: String,

    /// Human-readable description.
    pub message: String,
}

impl From<&RangingError> for RangingErrorBody {
    fn from(error: &RangingError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Current detected set response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "uuid": "41462998-6ceb-4511-9d46-1f7e27aa6572",
    "major": 18,
    "minor": 5,
    "state": "ranging",
    "beacons": [
        {
            "uuid": "41462998-6ceb-4511-9d46-1f7e27aa6572",
            "major": 18,
            "minor": 5,
            "proximity": "near",
            "accuracy": "nearest_ten_meters",
            "accuracy_radius": 10.0,
            "rssi": -59,
            "observed_at": "2025-01-15T03:30:00Z"
        }
    ],
    "error": null,
    "generated_at_utc": "2025-01-15T03:30:01Z"
}))]
pub struct BeaconsResponse {
    /// Proximity UUID being ranged.
    pub uuid: Uuid,

    /// Major value being ranged.
    #[schema(example = 18)]
    pub major: u16,

    /// Minor value being ranged.
    #[schema(example = 5)]
    pub minor: u16,

    /// Controller lifecycle state.
    pub state: ControllerState,

    /// Beacons from the latest ranging batch, in source order.
    pub beacons: Vec<DetectedBeacon>,

    /// The most recent ranging error, if any has occurred.
    #[schema(nullable)]
    pub error: Option<RangingErrorBody>,

    /// UTC timestamp of when this response was built.
    #[schema(example = "2025-01-15T03:30:01Z")]
    pub generated_at_utc: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the currently detected beacons.
#[utoipa::path(
    get,
    path = "/api/beacons",
    tag = "beacons",
    operation_id = "getBeacons",
    summary = "Get the current detected set",
    description = "Returns the beacons reported by the latest ranging batch \
        together with the most recent ranging error. Data and an error may \
        both be present at the same time.",
    responses(
        (status = 200, description = "Current detected set", body = BeaconsResponse)
    )
)]
pub async fn get_beacons(State(state): State<SharedState>) -> Json<BeaconsResponse> {
    let snapshot = state.snapshot();
    let constraint = state.constraint();

    Json(BeaconsResponse {
        uuid: constraint.uuid(),
        major: constraint.major(),
        minor: constraint.minor(),
        state: state.controller_state(),
        error: snapshot.last_error.as_ref().map(RangingErrorBody::from),
        beacons: snapshot.detected,
        generated_at_utc: Utc::now().to_rfc3339(),
    })
}

/// Return the closest detected beacon.
///
/// Closest means the best proximity class, then the strongest signal.
#[utoipa::path(
    get,
    path = "/api/beacons/nearest",
    tag = "beacons",
    operation_id = "getNearestBeacon",
    summary = "Get the nearest detected beacon",
    description = "Returns the detected beacon with the best proximity class. \
        Ties are broken by the strongest RSSI.",
    responses(
        (status = 200, description = "Nearest beacon", body = DetectedBeacon),
        (status = 404, description = "No beacon is currently detected", body = crate::api::error::ErrorResponse),
        (status = 503, description = "Nothing detected and ranging reported an error", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_nearest(State(state): State<SharedState>) -> ApiResult<Json<DetectedBeacon>> {
    let snapshot = state.snapshot();
    nearest(&snapshot).map(Json)
}

fn nearest(snapshot: &Snapshot) -> ApiResult<DetectedBeacon> {
    if let Some(beacon) = snapshot
        .detected
        .iter()
        .min_by_key(|beacon| (beacon.proximity, Reverse(beacon.rssi)))
    {
        return Ok(beacon.clone());
    }

    match &snapshot.last_error {
        Some(error) => Err(ApiError::ServiceUnavailable {
            error_code: error.error_code().to_lowercase(),
            message: "No beacon detected and ranging reported an error".to_string(),
            details: Some(error.to_string()),
        }),
        None => Err(ApiError::NotFound {
            error_code: "no_beacon_detected".to_string(),
            message: "No beacon matching the constraint is currently detected".to_string(),
        }),
    }
}
