//! Beacon identity and the constraint used to select beacons for ranging.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{BeaconError, Result};

/// The identity triple a beacon advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct BeaconIdentity {
    /// Proximity UUID shared by a deployment.
    pub uuid: Uuid,
    /// Group within the deployment.
    pub major: u16,
    /// Individual beacon within the group.
    pub minor: u16,
}

impl BeaconIdentity {
    /// Create a new identity.
    #[must_use]
    pub const fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self { uuid, major, minor }
    }
}

impl fmt::Display for BeaconIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{}/{}", self.uuid, self.major, self.minor)
    }
}

/// Immutable filter describing which advertisements are of interest.
///
/// Equality is structural. Once built the constraint cannot change; a new
/// constraint means a new controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct IdentityConstraint {
    uuid: Uuid,
    major: u16,
    minor: u16,
}

impl IdentityConstraint {
    /// Build a constraint from an already-parsed UUID.
    #[must_use]
    pub const fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self { uuid, major, minor }
    }

    /// Build a constraint from the textual UUID form.
    ///
    /// Only the hyphenated form (`8-4-4-4-12` hex digits, any case) is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::InvalidConstraint`] if `uuid` is not a
    /// well-formed hyphenated UUID.
    pub fn parse(uuid: &str, major: u16, minor: u16) -> Result<Self> {
        let trimmed = uuid.trim();
        if trimmed.len() != 36 {
            return Err(BeaconError::InvalidConstraint {
                input: uuid.to_string(),
                reason: format!("expected 36 characters, got {}", trimmed.len()),
            });
        }

        let parsed = Uuid::try_parse(trimmed).map_err(|e| BeaconError::InvalidConstraint {
            input: uuid.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(parsed, major, minor))
    }

    /// Proximity UUID.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Major value.
    #[must_use]
    pub const fn major(&self) -> u16 {
        self.major
    }

    /// Minor value.
    #[must_use]
    pub const fn minor(&self) -> u16 {
        self.minor
    }

    /// The identity this constraint selects.
    #[must_use]
    pub const fn identity(&self) -> BeaconIdentity {
        BeaconIdentity::new(self.uuid, self.major, self.minor)
    }

    /// Whether an advertised identity satisfies this constraint.
    #[must_use]
    pub fn matches(&self, identity: &BeaconIdentity) -> bool {
        self.identity() == *identity
    }
}

impl fmt::Display for IdentityConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identity().fmt(f)
    }
}

impl FromStr for IdentityConstraint {
    type Err = BeaconError;

    /// Parses the `UUID/major/minor` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| BeaconError::InvalidConstraint {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split('/');
        let (Some(uuid), Some(major), Some(minor), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected UUID/major/minor"));
        };

        let major = major
            .trim()
            .parse::<u16>()
            .map_err(|_| invalid("major must be an integer between 0 and 65535"))?;
        let minor = minor
            .trim()
            .parse::<u16>()
            .map_err(|_| invalid("minor must be an integer between 0 and 65535"))?;

        Self::parse(uuid, major, minor)
    }
}
