//! Virtual beacon radio
//!
//! A synchronous, in-memory radio that behaves like a platform advertising
//! stack: it honours power state, caps concurrent advertisements, and
//! records every call for inspection.

use std::time::Instant;

use beacon_mux::{AdapterError, PowerState, RadioAdapter, DEFAULT_MAX_CONCURRENT};
use beacon_protocol::{AdvertisementPayload, AdvertisementRecord, BeaconIdentity};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A call made against the virtual radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCall {
    /// Start advertising this record
    Start(AdvertisementRecord),
    /// Stop all advertising
    Stop,
}

/// A simulated advertising radio
#[derive(Debug)]
pub struct VirtualRadio {
    /// Unique identifier for this virtual radio
    id: String,
    /// Current power state
    power: PowerState,
    /// Concurrent advertisement ceiling
    max_payloads: usize,
    /// Payloads currently on air
    advertising: Vec<AdvertisementPayload>,
    /// Every call received, in order
    calls: Vec<RadioCall>,
    /// Failure to inject into the next start
    fail_next_start: Option<String>,
    /// Last state change timestamp
    last_change: Instant,
}

/// Configuration for creating a virtual radio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualRadioConfig {
    /// Display name/identifier
    pub id: String,
    /// Power state at creation
    pub initial_power: PowerState,
    /// Concurrent advertisement ceiling
    pub max_payloads: usize,
}

impl Default for VirtualRadioConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Radio".to_string(),
            initial_power: PowerState::On,
            max_payloads: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl VirtualRadio {
    /// Create a powered-on virtual radio with default settings
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(VirtualRadioConfig {
            id: id.into(),
            ..Default::default()
        })
    }

    /// Create a virtual radio from configuration
    pub fn from_config(config: VirtualRadioConfig) -> Self {
        Self {
            id: config.id,
            power: config.initial_power,
            max_payloads: config.max_payloads.max(1),
            advertising: Vec::new(),
            calls: Vec::new(),
            fail_next_start: None,
            last_change: Instant::now(),
        }
    }

    /// Get the radio's unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Concurrent advertisement ceiling
    pub fn max_payloads(&self) -> usize {
        self.max_payloads
    }

    /// Change the power state
    ///
    /// Leaving the ready state drops everything on air, as a real stack does.
    pub fn set_power_state(&mut self, state: PowerState) {
        if self.power == state {
            return;
        }
        debug!("Virtual radio {} power {} -> {}", self.id, self.power, state);
        self.power = state;
        if !state.is_ready() {
            self.advertising.clear();
        }
        self.last_change = Instant::now();
    }

    /// Make the next start request fail with `reason`
    pub fn fail_next_start(&mut self, reason: impl Into<String>) {
        self.fail_next_start = Some(reason.into());
    }

    /// Payloads currently on air
    pub fn advertising(&self) -> &[AdvertisementPayload] {
        &self.advertising
    }

    /// Identities currently on air, decoded from their records
    pub fn advertised_identities(&self) -> Vec<BeaconIdentity> {
        self.advertising.iter().map(|p| p.record.identity()).collect()
    }

    /// Whether anything is on air
    pub fn is_advertising(&self) -> bool {
        !self.advertising.is_empty()
    }

    /// Every call received so far
    pub fn calls(&self) -> &[RadioCall] {
        &self.calls
    }

    /// Take and clear the call log
    pub fn take_calls(&mut self) -> Vec<RadioCall> {
        std::mem::take(&mut self.calls)
    }

    /// Get last state change time
    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    /// Get a summary string of the radio state
    pub fn state_summary(&self) -> String {
        format!(
            "{}: {} advertising {}/{}",
            self.id,
            self.power,
            self.advertising.len(),
            self.max_payloads
        )
    }
}

impl RadioAdapter for VirtualRadio {
    fn power_state(&self) -> PowerState {
        self.power
    }

    fn start_advertising(&mut self, payload: &AdvertisementPayload) -> Result<(), AdapterError> {
        self.calls.push(RadioCall::Start(payload.record));

        if !self.power.is_ready() {
            return Err(AdapterError::NotReady(self.power));
        }
        if let Some(reason) = self.fail_next_start.take() {
            debug!("Virtual radio {} failing start: {}", self.id, reason);
            return Err(AdapterError::Rejected(reason));
        }
        if self.advertising.len() >= self.max_payloads {
            return Err(AdapterError::Rejected(format!(
                "advertising limit of {} reached",
                self.max_payloads
            )));
        }

        debug!("Virtual radio {} advertising {}", self.id, payload.record);
        self.advertising.push(*payload);
        self.last_change = Instant::now();
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.calls.push(RadioCall::Stop);
        if !self.advertising.is_empty() {
            self.advertising.clear();
            self.last_change = Instant::now();
        }
    }
}
