//! Configuration loading, saving and validation.
//!
//! The configuration is a TOML file:
//!
//! ```toml
//! [constraint]
//! uuid = "41462998-6CEB-4511-9D46-1F7E27AA6572"
//! major = 18
//! minor = 5
//!
//! [source]
//! kind = "simulator"
//! batch_interval_ms = 1000
//! stale_after_ms = 5000
//! authorize = true
//!
//! [server]
//! bind_address = "127.0.0.1"
//! port = 3000
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::identity::IdentityConstraint;
use crate::types::{ProximityClass, ACCURACY_NEAREST_TEN_METERS};

#[cfg(feature = "simulator")]
use crate::simulator::SimulatedBeacon;

/// UUID ranged when nothing else is configured.
pub const DEFAULT_UUID: &str = "41462998-6CEB-4511-9D46-1F7E27AA6572";
/// Major ranged when nothing else is configured.
pub const DEFAULT_MAJOR: u16 = 18;
/// Minor ranged when nothing else is configured.
pub const DEFAULT_MINOR: u16 = 5;

/// Errors raised while handling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// One field holds an invalid value.
    #[error("Invalid {field}: {message}")]
    ValidationError {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which ranging source backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// In-process simulator.
    #[default]
    Simulator,
    /// BlueZ adapter (requires the `bluetooth` feature).
    Bluetooth,
}

/// Identity the engine ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Proximity UUID, hyphenated.
    pub uuid: String,
    /// Major value.
    pub major: u16,
    /// Minor value.
    pub minor: u16,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            uuid: DEFAULT_UUID.to_string(),
            major: DEFAULT_MAJOR,
            minor: DEFAULT_MINOR,
        }
    }
}

/// A beacon the simulator should report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBeaconConfig {
    /// Proximity UUID, hyphenated.
    pub uuid: String,
    /// Major value.
    pub major: u16,
    /// Minor value.
    pub minor: u16,
    /// Reported proximity.
    pub proximity: ProximityClass,
    /// Reported accuracy radius in meters.
    pub accuracy_radius: f64,
    /// Baseline RSSI in dBm.
    pub rssi: i16,
}

impl SimulatedBeaconConfig {
    /// Convert into a simulator beacon.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the UUID is malformed.
    #[cfg(feature = "simulator")]
    pub fn to_beacon(&self) -> ConfigResult<SimulatedBeacon> {
        let constraint = IdentityConstraint::parse(&self.uuid, self.major, self.minor)
            .map_err(|e| ConfigError::ValidationError {
                field: "source.simulated.uuid".to_string(),
                message: e.to_string(),
            })?;

        Ok(SimulatedBeacon {
            identity: constraint.identity(),
            proximity: self.proximity,
            accuracy_radius: self.accuracy_radius,
            rssi: self.rssi,
        })
    }
}

/// Ranging source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Backend selection.
    pub kind: SourceKind,
    /// How often a batch is emitted.
    pub batch_interval_ms: u64,
    /// Beacons not heard for this long drop out of the batch.
    pub stale_after_ms: u64,
    /// Whether the static authorization provider grants ranging.
    pub authorize: bool,
    /// Beacons reported by the simulator.
    pub simulated: Vec<SimulatedBeaconConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            batch_interval_ms: 1_000,
            stale_after_ms: 5_000,
            authorize: true,
            simulated: vec![
                SimulatedBeaconConfig {
                    uuid: DEFAULT_UUID.to_string(),
                    major: DEFAULT_MAJOR,
                    minor: DEFAULT_MINOR,
                    proximity: ProximityClass::Near,
                    accuracy_radius: ACCURACY_NEAREST_TEN_METERS,
                    rssi: -59,
                },
                SimulatedBeaconConfig {
                    uuid: DEFAULT_UUID.to_string(),
                    major: DEFAULT_MAJOR,
                    minor: DEFAULT_MINOR + 1,
                    proximity: ProximityClass::Far,
                    accuracy_radius: 7.3,
                    rssi: -88,
                },
            ],
        }
    }
}

impl SourceConfig {
    /// Batch interval as a [`Duration`].
    #[must_use]
    pub const fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    /// Staleness window as a [`Duration`].
    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

/// HTTP observer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_address: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `bind_address` is not an IP address.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::ValidationError {
                field: "server.bind_address".to_string(),
                message: format!("'{}' is not an IP address", self.bind_address),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity to range.
    pub constraint: ConstraintConfig,
    /// Ranging source.
    pub source: SourceConfig,
    /// HTTP observer.
    pub server: ServerConfig,
}

impl Config {
    /// Load and validate configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, or a read,
    /// parse or validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::NotFound(missing)) => {
                debug!(path = %missing.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the single failure, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.constraint() {
            errors.push(e);
        }

        if self.source.batch_interval_ms == 0 {
            errors.push(ConfigError::ValidationError {
                field: "source.batch_interval_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.source.stale_after_ms < self.source.batch_interval_ms {
            errors.push(ConfigError::ValidationError {
                field: "source.stale_after_ms".to_string(),
                message: "must not be shorter than source.batch_interval_ms".to_string(),
            });
        }

        for (index, beacon) in self.source.simulated.iter().enumerate() {
            if IdentityConstraint::parse(&beacon.uuid, beacon.major, beacon.minor).is_err() {
                errors.push(ConfigError::ValidationError {
                    field: format!("source.simulated[{index}].uuid"),
                    message: format!("'{}' is not a hyphenated UUID", beacon.uuid),
                });
            }
        }

        if let Err(e) = self.server.socket_addr() {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// The identity constraint described by `[constraint]`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the UUID is malformed.
    pub fn constraint(&self) -> ConfigResult<IdentityConstraint> {
        IdentityConstraint::parse(&self.constraint.uuid, self.constraint.major, self.constraint.minor)
            .map_err(|e| ConfigError::ValidationError {
                field: "constraint.uuid".to_string(),
                message: e.to_string(),
            })
    }
}

/// Default configuration file location.
///
/// `~/.config/beaconwatch/config.toml` on Linux, the platform equivalent
/// elsewhere, or `./beaconwatch.toml` if no home directory is known.
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "beaconwatch").map_or_else(
        || PathBuf::from("./beaconwatch.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}
