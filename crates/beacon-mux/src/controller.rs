//! Broadcast controller
//!
//! Owns the registry, the rotation scheduler and the radio adapter, and is
//! the single source of truth for what is on air. Every change to the
//! on-air set is pushed to the radio as stop-then-start.

use std::time::Duration;

use beacon_protocol::{AdvertisementPayload, BeaconIdentity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapter::{PowerState, RadioAdapter};
use crate::error::{AdmissionError, BroadcastError};
use crate::events::BroadcastEvent;
use crate::registry::{BeaconRegistry, RegistryEvent};
use crate::rotation::{RotationPhase, RotationScheduler, RotationUpdate};
use crate::state::{Beacon, BeaconId};

/// Concurrent advertisements the host radio stack allows
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Time each rotation window stays on air (ms)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5_000;

/// Broadcaster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Physical slot count
    pub max_concurrent: usize,
    /// Ceiling on enabled beacons; above `max_concurrent` the slots rotate
    pub max_enabled: usize,
    /// Rotation tick interval (ms)
    pub tick_interval_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_enabled: DEFAULT_MAX_CONCURRENT,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl BroadcastConfig {
    /// Rotation tick interval, never shorter than 1ms
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Snapshot of broadcaster state for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastStatus {
    /// Last reported radio power state
    pub power: PowerState,
    /// Whether the radio acknowledged advertising
    pub advertising: bool,
    /// Scheduler phase
    pub phase: RotationPhase,
    /// Slot occupants, oldest first
    pub on_air: Vec<BeaconId>,
    /// Enabled beacons in rotation order
    pub active: Vec<BeaconId>,
    /// Status line
    pub message: String,
    /// Whether the system is asleep
    pub suspended: bool,
    /// Whether broadcasting restarts on wake
    pub restart_pending: bool,
}

/// The broadcast controller
pub struct BroadcastController<A: RadioAdapter> {
    config: BroadcastConfig,
    registry: BeaconRegistry,
    scheduler: RotationScheduler,
    adapter: A,
    power: PowerState,
    advertising: bool,
    suspended: bool,
    restart_pending: bool,
    start_failed: bool,
    status_message: String,
    event_buffer: Vec<BroadcastEvent>,
}

impl<A: RadioAdapter> BroadcastController<A> {
    /// Create a controller with default configuration
    pub fn new(adapter: A) -> Self {
        Self::with_config(BroadcastConfig::default(), adapter)
    }

    /// Create with custom configuration
    pub fn with_config(config: BroadcastConfig, adapter: A) -> Self {
        let power = adapter.power_state();

        Self {
            registry: BeaconRegistry::new(config.max_enabled.max(1)),
            scheduler: RotationScheduler::new(config.max_concurrent.max(1)),
            config,
            adapter,
            power,
            advertising: false,
            suspended: false,
            restart_pending: false,
            start_failed: false,
            status_message: "Ready".to_string(),
            event_buffer: Vec::new(),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Registry view
    pub fn registry(&self) -> &BeaconRegistry {
        &self.registry
    }

    /// Scheduler view
    pub fn scheduler(&self) -> &RotationScheduler {
        &self.scheduler
    }

    /// Radio adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Mutable radio adapter
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// All beacons in insertion order
    pub fn beacons(&self) -> &[Beacon] {
        self.registry.beacons()
    }

    /// Last reported power state
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Whether the radio acknowledged advertising
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// Whether the system is asleep
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether broadcasting restarts on wake
    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    /// Current status line
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Whether the rotation tick should fire
    pub fn ticking_enabled(&self) -> bool {
        self.scheduler.is_rotating() && self.power.is_ready() && !self.suspended
    }

    /// Snapshot for observers
    pub fn status(&self) -> BroadcastStatus {
        BroadcastStatus {
            power: self.power,
            advertising: self.advertising,
            phase: self.scheduler.phase(),
            on_air: self.scheduler.on_air(),
            active: self.scheduler.active_set().to_vec(),
            message: self.status_message.clone(),
            suspended: self.suspended,
            restart_pending: self.restart_pending,
        }
    }

    // -------------------------------------------------------------------------
    // Registry operations
    // -------------------------------------------------------------------------

    /// Replace the registry contents with persisted beacons, all disabled
    pub fn load_beacons(&mut self, beacons: impl IntoIterator<Item = Beacon>) {
        self.registry.load(beacons);
        self.registry.drain_events();
        self.sync_enabled_set();
    }

    /// Add a new disabled beacon
    pub fn add_beacon(&mut self, name: impl Into<String>, identity: BeaconIdentity) -> BeaconId {
        let id = self.registry.add(name, identity);
        self.process_registry_events();
        id
    }

    /// Add a beacon from user-supplied fields
    pub fn add_beacon_parsed(
        &mut self,
        name: impl Into<String>,
        uuid: Option<&str>,
        major: Option<u16>,
        minor: Option<u16>,
        measured_power: Option<i8>,
    ) -> Result<BeaconId, BroadcastError> {
        let id = self
            .registry
            .add_parsed(name, uuid, major, minor, measured_power)?;
        self.process_registry_events();
        Ok(id)
    }

    /// Replace a beacon's name and identity
    ///
    /// An on-air beacon is re-advertised with its new identity right away.
    pub fn edit_beacon(
        &mut self,
        id: BeaconId,
        name: impl Into<String>,
        identity: BeaconIdentity,
    ) -> Result<(), BroadcastError> {
        self.registry.update(id, name, identity)?;
        self.process_registry_events();

        if self.scheduler.is_on_air(id) {
            self.push_broadcast();
        }
        Ok(())
    }

    /// Remove a beacon, withdrawing it from broadcast first if needed
    pub fn remove_beacon(&mut self, id: BeaconId) -> Result<Beacon, BroadcastError> {
        let beacon = self
            .registry
            .remove(id)
            .ok_or(BroadcastError::BeaconNotFound(id))?;
        self.process_registry_events();
        Ok(beacon)
    }

    /// Flip a beacon's favorite flag
    pub fn toggle_favorite(&mut self, id: BeaconId) -> Result<bool, BroadcastError> {
        let favorite = self.registry.toggle_favorite(id)?;
        self.process_registry_events();
        Ok(favorite)
    }

    /// Enable or disable a beacon
    ///
    /// A refused enable surfaces as a transient status notice and an
    /// [`BroadcastEvent::AdmissionRejected`]; nothing else changes.
    pub fn set_enabled(&mut self, id: BeaconId, enabled: bool) -> Result<(), BroadcastError> {
        match self.registry.set_enabled(id, enabled) {
            Ok(()) => {
                self.process_registry_events();
                Ok(())
            }
            Err(BroadcastError::Admission(AdmissionError::CapacityExceeded { limit })) => {
                self.event_buffer
                    .push(BroadcastEvent::AdmissionRejected { id, limit });
                self.set_status(format!("At most {} beacons can broadcast at once", limit));
                Err(AdmissionError::CapacityExceeded { limit }.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Translate registry events and converge the scheduler when the
    /// enabled set changed
    fn process_registry_events(&mut self) {
        let mut needs_sync = false;
        let mut withdrawn = Vec::new();

        for event in self.registry.drain_events() {
            match event {
                RegistryEvent::Added(id) => {
                    self.event_buffer.push(BroadcastEvent::BeaconAdded { id });
                }
                RegistryEvent::Updated(id) => {
                    self.event_buffer.push(BroadcastEvent::BeaconUpdated { id });
                }
                RegistryEvent::Withdrawn(id) => {
                    withdrawn.push(id);
                    needs_sync = true;
                }
                RegistryEvent::Removed(id) => {
                    self.event_buffer.push(BroadcastEvent::BeaconRemoved {
                        id,
                        withdrawn: withdrawn.contains(&id),
                    });
                }
                RegistryEvent::EnabledChanged { id, enabled } => {
                    self.event_buffer
                        .push(BroadcastEvent::EnabledChanged { id, enabled });
                    needs_sync = true;
                }
                RegistryEvent::FavoriteChanged { id, favorite } => {
                    self.event_buffer
                        .push(BroadcastEvent::FavoriteChanged { id, favorite });
                }
            }
        }

        if needs_sync {
            self.sync_enabled_set();
        }
    }

    // -------------------------------------------------------------------------
    // Rotation
    // -------------------------------------------------------------------------

    /// Converge the scheduler's active set onto the registry's enabled set
    pub fn sync_enabled_set(&mut self) {
        let enabled: Vec<BeaconId> = self.registry.enabled().map(|b| b.id).collect();
        let stale: Vec<BeaconId> = self
            .scheduler
            .active_set()
            .iter()
            .filter(|id| !enabled.contains(id))
            .copied()
            .collect();

        let from = self.scheduler.phase();
        let mut changed = false;

        for id in stale {
            changed |= self.scheduler.deactivate(id).on_air_changed();
        }
        for id in enabled {
            if !self.scheduler.contains(id) {
                changed |= self.scheduler.activate(id).on_air_changed();
            }
        }

        let to = self.scheduler.phase();
        self.apply(from, to, changed);
    }

    /// Advance the rotation one step
    pub fn tick(&mut self) -> RotationUpdate {
        let update = self.scheduler.tick();
        self.apply(update.from, update.to, update.on_air_changed());
        update
    }

    fn apply(&mut self, from: RotationPhase, to: RotationPhase, on_air_changed: bool) {
        if from != to {
            info!("Rotation phase {} -> {}", from.name(), to.name());
            self.event_buffer
                .push(BroadcastEvent::PhaseChanged { from, to });
        }

        if on_air_changed {
            self.event_buffer.push(BroadcastEvent::OnAirChanged {
                on_air: self.scheduler.on_air(),
            });
            self.push_broadcast();
        }
    }

    /// Present the current on-air set to the radio
    fn push_broadcast(&mut self) {
        let on_air = self.scheduler.on_air();

        if self.suspended {
            if !on_air.is_empty() {
                self.restart_pending = true;
            }
            debug!("Suspended; broadcast deferred until wake");
            return;
        }

        if !self.power.is_ready() {
            if !on_air.is_empty() {
                debug!(
                    "Radio {}; deferring broadcast of {} beacons",
                    self.power,
                    on_air.len()
                );
                self.set_status("Bluetooth is not ready".to_string());
            }
            return;
        }

        self.adapter.stop_advertising();
        self.start_failed = false;

        if on_air.is_empty() {
            self.set_advertising(false);
            self.set_status("Broadcasting stopped".to_string());
            return;
        }

        let mut started = 0;
        for id in on_air {
            let Some(beacon) = self.registry.get(id) else {
                warn!("On-air beacon {} missing from registry", id);
                continue;
            };
            let payload = AdvertisementPayload::for_identity(&beacon.identity);
            debug!(
                "Starting {} ({}): {}",
                beacon.display_name(),
                id.short(),
                payload.record
            );

            match self.adapter.start_advertising(&payload) {
                Ok(()) => started += 1,
                Err(e) => {
                    let err = BroadcastError::from(e);
                    self.start_failed = true;
                    self.report_error("Radio", err.to_string());
                }
            }
        }

        if started == 0 {
            self.set_advertising(false);
        } else if !self.start_failed {
            // a partial failure keeps its message on the status line
            self.set_status("Broadcasting started".to_string());
        }
    }

    // -------------------------------------------------------------------------
    // Radio and system signals
    // -------------------------------------------------------------------------

    /// React to a radio power-state change
    ///
    /// Leaving the ready state freezes rotation without touching bookkeeping.
    /// Returning to ready re-issues the current on-air set, or marks a
    /// restart for wake if the system is asleep.
    pub fn handle_power_state(&mut self, state: PowerState) {
        if state == self.power {
            return;
        }

        let was_ready = self.power.is_ready();
        self.power = state;
        info!("Radio power state: {}", state);
        self.event_buffer
            .push(BroadcastEvent::PowerStateChanged { state });
        self.set_status(state.status_message().to_string());

        if !state.is_ready() {
            self.set_advertising(false);
        } else if !was_ready && !self.scheduler.on_air().is_empty() {
            if self.suspended {
                debug!("Radio ready while asleep; broadcast restarts on wake");
                self.restart_pending = true;
            } else {
                info!("Radio ready; resuming broadcast");
                self.push_broadcast();
            }
        }
    }

    /// Handle the radio's asynchronous acknowledgment of a start request
    pub fn handle_advertising_ack(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                if self.suspended || self.scheduler.on_air().is_empty() {
                    debug!("Ignoring stale advertising acknowledgment");
                    return;
                }
                self.set_advertising(true);
                if !self.start_failed {
                    self.set_status("Broadcasting iBeacon signal".to_string());
                }
            }
            Err(message) => {
                self.start_failed = true;
                self.set_advertising(false);
                self.report_error("Radio", format!("Failed to start: {}", message));
            }
        }
    }

    /// System is going to sleep
    ///
    /// Stops the radio if broadcasting and remembers to restart on wake. The
    /// rotation state is left untouched and ticks stop until [`resume`].
    ///
    /// [`resume`]: Self::resume
    pub fn suspend(&mut self) {
        if self.suspended {
            return;
        }

        let broadcasting = self.power.is_ready() && !self.scheduler.on_air().is_empty();
        self.suspended = true;

        if broadcasting {
            info!("Suspending; stopping broadcast until wake");
            self.adapter.stop_advertising();
            self.restart_pending = true;
            self.set_advertising(false);
            self.set_status("Broadcasting paused for sleep".to_string());
        }
    }

    /// System woke up
    pub fn resume(&mut self) {
        if !self.suspended {
            return;
        }
        self.suspended = false;

        if self.restart_pending {
            info!("Resuming broadcast after wake");
            self.push_broadcast();
            self.restart_pending = false;
        }
    }

    // -------------------------------------------------------------------------
    // Status and events
    // -------------------------------------------------------------------------

    fn set_advertising(&mut self, advertising: bool) {
        if self.advertising != advertising {
            self.advertising = advertising;
            self.event_buffer
                .push(BroadcastEvent::AdvertisingChanged { advertising });
        }
    }

    fn set_status(&mut self, message: String) {
        if self.status_message != message {
            debug!("Status: {}", message);
            self.status_message = message.clone();
            self.event_buffer.push(BroadcastEvent::Status { message });
        }
    }

    fn report_error(&mut self, source: &str, message: String) {
        warn!("{}: {}", source, message);
        self.set_status(message.clone());
        self.event_buffer.push(BroadcastEvent::Error {
            source: source.to_string(),
            message,
        });
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<BroadcastEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}
