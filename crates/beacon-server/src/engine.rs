//! Ranging engine wiring.
//!
//! Builds the configured source, starts a controller against the configured
//! constraint and drives it on its own task until shutdown.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use beacon_core::{
    AuthorizationProvider, Config, ConfigResult, RangingController, RangingSource,
    SimulatedBeacon, SimulatedBeaconConfig, SimulatedSource, SourceKind, StaticAuthorization,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::state::AppState;

/// Environment variable overriding the configuration path.
pub const CONFIG_PATH_VAR: &str = "BEACON_CONFIG";

/// A running ranging engine.
pub struct Engine {
    /// Read side handed to the HTTP layer.
    pub state: AppState,
    task: JoinHandle<()>,
    emitter: Option<JoinHandle<()>>,
}

impl Engine {
    /// Wait for the engine task to finish after shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine task panicked.
    pub async fn join(self) -> anyhow::Result<()> {
        let result = self.task.await.context("ranging engine task failed");
        if let Some(emitter) = self.emitter {
            emitter.abort();
        }
        result
    }
}

/// Resolve the configuration path from `BEACON_CONFIG` or the platform default.
#[must_use]
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_VAR)
        .map_or_else(beacon_core::default_config_path, PathBuf::from)
}

/// Load and validate configuration, using defaults when the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but is unreadable or invalid.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load_or_default(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Start ranging as described by `config`, running until `shutdown` resolves.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the requested source
/// is not compiled in.
pub fn spawn<F>(config: &Config, shutdown: F) -> anyhow::Result<Engine>
where
    F: Future<Output = ()> + Send + 'static,
{
    let authorization = authorization_for(config);

    match config.source.kind {
        SourceKind::Simulator => {
            let source = SimulatedSource::new();
            let simulator = source.handle();
            let beacons = config
                .source
                .simulated
                .iter()
                .map(SimulatedBeaconConfig::to_beacon)
                .collect::<ConfigResult<Vec<SimulatedBeacon>>>()?;

            let mut engine = drive(config, source, authorization, shutdown)?;
            info!(beacons = beacons.len(), "Simulated beacons broadcasting");
            engine.emitter = Some(simulator.spawn_periodic(beacons, config.source.batch_interval()));
            Ok(engine)
        }
        #[cfg(feature = "bluetooth")]
        SourceKind::Bluetooth => {
            let source = beacon_core::BluezSource::new(
                config.source.batch_interval(),
                config.source.stale_after(),
            );
            drive(config, source, authorization, shutdown)
        }
        #[cfg(not(feature = "bluetooth"))]
        SourceKind::Bluetooth => {
            anyhow::bail!("source.kind = \"bluetooth\" requires the `bluetooth` feature")
        }
    }
}

fn drive<S, A, F>(config: &Config, source: S, authorization: A, shutdown: F) -> anyhow::Result<Engine>
where
    S: RangingSource + 'static,
    A: AuthorizationProvider + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let constraint = config.constraint()?;
    let mut controller = RangingController::new(source, authorization);
    let state = AppState::new(constraint, controller.subscribe(), controller.subscribe_state());
    controller.start(constraint)?;

    let task = tokio::spawn(async move {
        controller.run_until(shutdown).await;
        info!("Ranging engine stopped");
    });

    Ok(Engine {
        state,
        task,
        emitter: None,
    })
}

const fn authorization_for(config: &Config) -> StaticAuthorization {
    if config.source.authorize {
        StaticAuthorization::granted()
    } else {
        StaticAuthorization::denied()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use beacon_core::{ControllerState, ProximityClass, RangingError};
    use tempfile::TempDir;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_engine_publishes_configured_beacon() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let engine = spawn(&Config::default(), async move {
            let _ = rx.await;
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let snapshot = engine.state.snapshot();
        assert_eq!(engine.state.controller_state(), ControllerState::Ranging);
        assert_eq!(snapshot.detected.len(), 1);
        assert_eq!(snapshot.detected[0].minor, 5);
        assert_eq!(snapshot.detected[0].proximity, ProximityClass::Near);

        let state = engine.state.clone();
        tx.send(()).unwrap();
        engine.join().await.unwrap();
        assert_eq!(state.controller_state(), ControllerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_engine_reports_error() {
        let mut config = Config::default();
        config.source.authorize = false;

        let engine = spawn(&config, std::future::pending()).unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let snapshot = engine.state.snapshot();
        assert!(snapshot.detected.is_empty());
        assert_eq!(snapshot.last_error, Some(RangingError::AuthorizationDenied));
    }

    #[cfg(not(feature = "bluetooth"))]
    #[tokio::test]
    async fn test_bluetooth_source_requires_feature() {
        let mut config = Config::default();
        config.source.kind = SourceKind::Bluetooth;
        assert!(spawn(&config, std::future::pending()).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 4000\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.constraint.major, 18);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[constraint]\nuuid = \"zzz\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }
}
