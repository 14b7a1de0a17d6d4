//! Beacon registry
//!
//! In-memory list of the user's beacons with enable/favorite flags and the
//! admission rule that caps how many may be enabled at once.

use beacon_protocol::{BeaconIdentity, DEFAULT_MAJOR, DEFAULT_MEASURED_POWER, DEFAULT_MINOR};
use tracing::{debug, info, warn};

use crate::error::{AdmissionError, BroadcastError};
use crate::state::{Beacon, BeaconId};

/// Events emitted by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A beacon was added
    Added(BeaconId),
    /// A beacon's name or identity changed
    Updated(BeaconId),
    /// An enabled beacon is being removed and must leave the air first
    Withdrawn(BeaconId),
    /// A beacon was removed
    Removed(BeaconId),
    /// A beacon's enabled flag changed
    EnabledChanged { id: BeaconId, enabled: bool },
    /// A beacon's favorite flag changed
    FavoriteChanged { id: BeaconId, favorite: bool },
}

/// The user's beacons, in insertion order
#[derive(Debug)]
pub struct BeaconRegistry {
    beacons: Vec<Beacon>,
    enabled_count: usize,
    max_enabled: usize,
    event_buffer: Vec<RegistryEvent>,
}

impl BeaconRegistry {
    /// Create an empty registry admitting at most `max_enabled` enabled beacons
    pub fn new(max_enabled: usize) -> Self {
        Self {
            beacons: Vec::new(),
            enabled_count: 0,
            max_enabled: max_enabled.max(1),
            event_buffer: Vec::new(),
        }
    }

    /// Replace the registry contents with persisted beacons
    ///
    /// Every beacon comes back disabled; broadcasting never resumes on its
    /// own. Entries repeating an earlier id are dropped.
    pub fn load(&mut self, beacons: impl IntoIterator<Item = Beacon>) {
        self.beacons.clear();
        self.enabled_count = 0;

        for mut beacon in beacons {
            if self.index_of(beacon.id).is_some() {
                warn!("Skipping duplicate beacon id {}", beacon.id);
                continue;
            }
            beacon.enabled = false;
            self.beacons.push(beacon);
        }

        info!("Loaded {} beacons", self.beacons.len());
    }

    /// Add a new disabled beacon
    pub fn add(&mut self, name: impl Into<String>, identity: BeaconIdentity) -> BeaconId {
        let beacon = Beacon::new(name, identity);
        let id = beacon.id;

        info!("Added beacon: {} ({})", beacon.display_name(), identity);
        self.beacons.push(beacon);
        self.event_buffer.push(RegistryEvent::Added(id));

        id
    }

    /// Add a beacon from user-supplied fields
    ///
    /// A fresh proximity UUID is generated when `uuid` is `None`. Missing
    /// numeric fields fall back to their defaults.
    pub fn add_parsed(
        &mut self,
        name: impl Into<String>,
        uuid: Option<&str>,
        major: Option<u16>,
        minor: Option<u16>,
        measured_power: Option<i8>,
    ) -> Result<BeaconId, BroadcastError> {
        let major = major.unwrap_or(DEFAULT_MAJOR);
        let minor = minor.unwrap_or(DEFAULT_MINOR);
        let power = measured_power.unwrap_or(DEFAULT_MEASURED_POWER);

        let identity = match uuid {
            Some(s) => BeaconIdentity::parse(s, major, minor, power)?,
            None => BeaconIdentity::generate(major, minor, power),
        };

        Ok(self.add(name, identity))
    }

    /// Replace a beacon's name and identity
    ///
    /// Returns whether the beacon is enabled, so the caller knows whether the
    /// new identity has to reach the air.
    pub fn update(
        &mut self,
        id: BeaconId,
        name: impl Into<String>,
        identity: BeaconIdentity,
    ) -> Result<bool, BroadcastError> {
        let beacon = self.get_mut(id)?;
        beacon.name = name.into();
        beacon.identity = identity;
        let enabled = beacon.enabled;

        debug!("Updated beacon {}: {}", id, identity);
        self.event_buffer.push(RegistryEvent::Updated(id));
        Ok(enabled)
    }

    /// Remove a beacon
    ///
    /// Always succeeds for a known id. An enabled beacon produces a
    /// [`RegistryEvent::Withdrawn`] ahead of the removal.
    pub fn remove(&mut self, id: BeaconId) -> Option<Beacon> {
        let index = self.index_of(id)?;
        let beacon = self.beacons.remove(index);

        if beacon.enabled {
            self.enabled_count -= 1;
            self.event_buffer.push(RegistryEvent::Withdrawn(id));
        }
        self.event_buffer.push(RegistryEvent::Removed(id));

        info!("Removed beacon: {} ({})", beacon.display_name(), id);
        Some(beacon)
    }

    /// Flip a beacon's favorite flag, returning the new value
    pub fn toggle_favorite(&mut self, id: BeaconId) -> Result<bool, BroadcastError> {
        let beacon = self.get_mut(id)?;
        beacon.favorite = !beacon.favorite;
        let favorite = beacon.favorite;

        self.event_buffer
            .push(RegistryEvent::FavoriteChanged { id, favorite });
        Ok(favorite)
    }

    /// Enable or disable a beacon
    ///
    /// Disabling always succeeds. Enabling fails with
    /// [`AdmissionError::CapacityExceeded`] once the ceiling is reached, and
    /// leaves the registry untouched.
    pub fn set_enabled(&mut self, id: BeaconId, want: bool) -> Result<(), BroadcastError> {
        let index = self.index_of(id).ok_or(BroadcastError::BeaconNotFound(id))?;

        if self.beacons[index].enabled == want {
            return Ok(());
        }

        if want && self.enabled_count >= self.max_enabled {
            warn!(
                "Refusing to enable {}: {} of {} slots in use",
                id, self.enabled_count, self.max_enabled
            );
            return Err(AdmissionError::CapacityExceeded {
                limit: self.max_enabled,
            }
            .into());
        }

        self.beacons[index].enabled = want;
        if want {
            self.enabled_count += 1;
        } else {
            self.enabled_count -= 1;
        }

        self.event_buffer
            .push(RegistryEvent::EnabledChanged { id, enabled: want });
        Ok(())
    }

    /// Number of enabled beacons
    pub fn enabled_count(&self) -> usize {
        self.enabled_count
    }

    /// Ceiling on simultaneously enabled beacons
    pub fn max_enabled(&self) -> usize {
        self.max_enabled
    }

    /// Look up a beacon
    pub fn get(&self, id: BeaconId) -> Option<&Beacon> {
        self.beacons.iter().find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: BeaconId) -> Result<&mut Beacon, BroadcastError> {
        self.beacons
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(BroadcastError::BeaconNotFound(id))
    }

    fn index_of(&self, id: BeaconId) -> Option<usize> {
        self.beacons.iter().position(|b| b.id == id)
    }

    /// All beacons in insertion order
    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    /// Enabled beacons in insertion order
    pub fn enabled(&self) -> impl Iterator<Item = &Beacon> {
        self.beacons.iter().filter(|b| b.enabled)
    }

    /// Beacons ordered for listing: favorites first, otherwise insertion order
    pub fn display_order(&self) -> Vec<&Beacon> {
        let mut list: Vec<&Beacon> = self.beacons.iter().collect();
        list.sort_by_key(|b| !b.favorite);
        list
    }

    /// Number of beacons
    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}
