//! OpenAPI specification generation for the beacon API.

use axum::Json;
use beacon_core::{AccuracyClass, ControllerState, DetectedBeacon, ProximityClass};
use utoipa::OpenApi;

use super::beacons::{BeaconsResponse, RangingErrorBody};
use super::error::ErrorResponse;
use super::health::HealthResponse;

/// Serve the OpenAPI specification as JSON.
///
/// This endpoint is available at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Main OpenAPI document structure for the beacon server.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "beaconwatch API",
        version = "0.1.0",
        description = r#"
# beaconwatch API

Read-only view of a beacon ranging session.

The server ranges a single beacon identity (UUID, major, minor). Every ranging
batch replaces the detected set as a whole, and the most recent ranging error
stays visible until a newer one replaces it.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local beaconwatch server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks"
        ),
        (
            name = "beacons",
            description = "Detected beacons and ranging errors"
        )
    ),
    paths(
        super::health::health_check,
        super::beacons::get_beacons,
        super::beacons::get_nearest,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            BeaconsResponse,
            RangingErrorBody,
            DetectedBeacon,
            ProximityClass,
            AccuracyClass,
            ControllerState,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "beaconwatch API");
        assert!(spec.paths.paths.contains_key("/api/beacons"));
        assert!(spec.paths.paths.contains_key("/health"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = ApiDoc::openapi().to_pretty_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("BeaconsResponse"));
    }
}
