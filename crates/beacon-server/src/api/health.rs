//! Health check API endpoint.
//!
//! Provides a simple health check endpoint for monitoring and load balancers.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use beacon_core::ControllerState;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "controller_state": "ranging",
    "uptime_secs": 42
}))]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Ranging controller lifecycle state.
    pub controller_state: ControllerState,

    /// Seconds since the engine started.
    #[schema(example = 42)]
    pub uptime_secs: u64,
}

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
///
/// The service is healthy whenever it answers. A denied or failing ranging
/// session shows up in `/api/beacons`, not here.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns basic service status information. Use this endpoint \
        for load balancer health checks and monitoring.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        controller_state: state.controller_state(),
        uptime_secs: state.uptime_secs(),
    })
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use beacon_core::Snapshot;

    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            controller_state: ControllerState::Stopped,
            uptime_secs: 0,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"controller_state\":\"stopped\""));
    }

    #[tokio::test]
    async fn test_health_check_reports_controller_state() {
        let state = AppState::fixed(Snapshot::default(), ControllerState::Ranging);
        let server = TestServer::new(router().with_state(state)).unwrap();

        let response = server.get("/").await;
        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.controller_state, ControllerState::Ranging);
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
