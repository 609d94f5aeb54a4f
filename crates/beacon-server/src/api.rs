//! HTTP API routes and handlers.
//!
//! - `beacons` - The current detected set and the nearest beacon
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod beacons;
pub mod error;
pub mod health;
pub mod openapi;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /beacons           - Current detected set and last error
/// ├── /beacons/nearest   - Closest detected beacon
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/beacons", get(beacons::get_beacons))
                .route("/beacons/nearest", get(beacons::get_nearest))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use beacon_core::{ControllerState, Snapshot};

    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn test_openapi_route_is_served() {
        let state = AppState::fixed(Snapshot::default(), ControllerState::Idle);
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();
        assert!(response.text().contains("beaconwatch API"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let state = AppState::fixed(Snapshot::default(), ControllerState::Idle);
        let server = TestServer::new(create_router(state)).unwrap();

        server
            .get("/api/passes")
            .expect_failure()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
