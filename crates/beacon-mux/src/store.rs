//! Beacon list persistence
//!
//! The enabled flag is written for reference but never trusted on load:
//! every session starts with nothing on air.

use std::path::{Path, PathBuf};

use beacon_protocol::{BeaconIdentity, Uuid};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::state::{Beacon, BeaconId};

/// Current on-disk schema version
pub const STORE_VERSION: u32 = 1;

/// Load and save the beacon list
pub trait BeaconStore: Send {
    /// Load all persisted beacons, disabled
    fn load(&self) -> Result<Vec<Beacon>, StoreError>;

    /// Replace the persisted list
    fn save(&mut self, beacons: &[Beacon]) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    beacons: Vec<Beacon>,
    saves: usize,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with beacons
    pub fn with_beacons(beacons: Vec<Beacon>) -> Self {
        Self { beacons, saves: 0 }
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl BeaconStore for MemoryStore {
    fn load(&self) -> Result<Vec<Beacon>, StoreError> {
        Ok(self
            .beacons
            .iter()
            .cloned()
            .map(|mut b| {
                b.enabled = false;
                b
            })
            .collect())
    }

    fn save(&mut self, beacons: &[Beacon]) -> Result<(), StoreError> {
        self.beacons = beacons.to_vec();
        self.saves += 1;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    beacons: Vec<StoredBeacon>,
}

/// One persisted entry; numbers are wide so out-of-range values can be clamped
#[derive(Serialize, Deserialize)]
struct StoredBeacon {
    id: String,
    #[serde(default)]
    name: String,
    uuid: String,
    major: i64,
    minor: i64,
    measured_power: i64,
    #[serde(default)]
    favorite: bool,
    #[serde(default)]
    enabled: bool,
}

impl From<&Beacon> for StoredBeacon {
    fn from(beacon: &Beacon) -> Self {
        Self {
            id: beacon.id.to_string(),
            name: beacon.name.clone(),
            uuid: beacon.identity.uuid_string(),
            major: beacon.identity.major.into(),
            minor: beacon.identity.minor.into(),
            measured_power: beacon.identity.measured_power.into(),
            favorite: beacon.favorite,
            enabled: beacon.enabled,
        }
    }
}

impl StoredBeacon {
    fn into_beacon(self) -> Option<Beacon> {
        let id = match Uuid::parse_str(self.id.trim()) {
            Ok(id) => BeaconId(id),
            Err(e) => {
                warn!("Skipping stored beacon with bad id {:?}: {}", self.id, e);
                return None;
            }
        };
        let proximity_uuid = match Uuid::parse_str(self.uuid.trim()) {
            Ok(uuid) => uuid,
            Err(e) => {
                warn!("Skipping stored beacon {} with bad uuid {:?}: {}", id, self.uuid, e);
                return None;
            }
        };

        Some(Beacon {
            id,
            name: self.name,
            identity: BeaconIdentity::from_raw_saturating(
                proximity_uuid,
                self.major,
                self.minor,
                self.measured_power,
            ),
            enabled: false,
            favorite: self.favorite,
        })
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BeaconStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Beacon>, StoreError> {
        if !self.path.exists() {
            debug!("No beacon file at {}", self.path.display());
            return Ok(Vec::new());
        }

        let json = std::fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&json)?;
        if file.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion(file.version));
        }

        let beacons: Vec<Beacon> = file
            .beacons
            .into_iter()
            .filter_map(StoredBeacon::into_beacon)
            .collect();
        info!(
            "Loaded {} beacons from {}",
            beacons.len(),
            self.path.display()
        );
        Ok(beacons)
    }

    fn save(&mut self, beacons: &[Beacon]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = StoreFile {
            version: STORE_VERSION,
            beacons: beacons.iter().map(StoredBeacon::from).collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)?;

        debug!("Saved {} beacons to {}", beacons.len(), self.path.display());
        Ok(())
    }
}
