//! Beacon registry entries

use std::fmt;

use beacon_protocol::BeaconIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name given to beacons created without one
pub const DEFAULT_BEACON_NAME: &str = "New Beacon";

/// Unique identifier for a beacon in the registry
///
/// Stable across renames, edits and restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeaconId(pub Uuid);

impl BeaconId {
    /// Allocate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the raw id value
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Short prefix used in logs and listings
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for BeaconId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A user-configured beacon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    /// Unique id
    pub id: BeaconId,
    /// Display name
    pub name: String,
    /// Identity broadcast when this beacon is on air
    pub identity: BeaconIdentity,
    /// Whether the user wants this beacon broadcasting
    pub enabled: bool,
    /// Pinned to the top of listings
    pub favorite: bool,
}

impl Beacon {
    /// Create a new, disabled beacon with a fresh id
    pub fn new(name: impl Into<String>, identity: BeaconIdentity) -> Self {
        Self {
            id: BeaconId::new(),
            name: name.into(),
            identity,
            enabled: false,
            favorite: false,
        }
    }

    /// Name for display, falling back to the default for blank names
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            DEFAULT_BEACON_NAME
        } else {
            &self.name
        }
    }
}
