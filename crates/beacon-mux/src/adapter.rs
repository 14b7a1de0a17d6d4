//! Radio adapter seam
//!
//! The broadcaster never talks to RF hardware directly. It drives a
//! [`RadioAdapter`], which may be an in-process simulation or a channel to
//! a task that owns the platform radio stack.

use std::fmt;

use beacon_protocol::AdvertisementPayload;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::error::AdapterError;

/// Power/authorization state reported by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PowerState {
    /// Radio is powered off
    Off,
    /// Radio is powered on and usable
    On,
    /// App is not allowed to use the radio
    Unauthorized,
    /// Hardware does not support advertising
    Unsupported,
    /// Radio stack is restarting
    Resetting,
    /// State not yet reported
    #[default]
    Unknown,
}

impl PowerState {
    /// Whether advertising requests can be issued
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Human-readable status line for this state
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Off => "Bluetooth is powered off",
            Self::On => "Bluetooth is ready",
            Self::Unauthorized => "Bluetooth access is not authorized",
            Self::Unsupported => "Bluetooth Low Energy is not supported",
            Self::Resetting => "Bluetooth is resetting...",
            Self::Unknown => "Bluetooth state is unknown",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Unauthorized => "unauthorized",
            Self::Unsupported => "unsupported",
            Self::Resetting => "resetting",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Radio operations the broadcaster depends on
///
/// Calls are fire-and-forget: a successful `start_advertising` only means the
/// request was accepted. The radio acknowledges asynchronously, and that
/// acknowledgment is fed back to the controller on its own context.
///
/// `stop_advertising` withdraws every payload currently being advertised.
/// Several `start_advertising` calls after a stop present several payloads at
/// once, up to the stack's concurrency ceiling.
pub trait RadioAdapter: Send {
    /// Current power state
    fn power_state(&self) -> PowerState;

    /// Begin advertising a payload
    fn start_advertising(&mut self, payload: &AdvertisementPayload) -> Result<(), AdapterError>;

    /// Stop all advertising
    fn stop_advertising(&mut self);
}

impl<A: RadioAdapter + ?Sized> RadioAdapter for Box<A> {
    fn power_state(&self) -> PowerState {
        (**self).power_state()
    }

    fn start_advertising(&mut self, payload: &AdvertisementPayload) -> Result<(), AdapterError> {
        (**self).start_advertising(payload)
    }

    fn stop_advertising(&mut self) {
        (**self).stop_advertising()
    }
}

/// Request forwarded to a radio task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioRequest {
    /// Start advertising this payload
    Start(AdvertisementPayload),
    /// Stop all advertising
    Stop,
}

/// Adapter that forwards requests to a radio task over a channel
///
/// The task owning the real (or simulated) radio publishes its power state
/// through a `watch` channel and acknowledges starts back to the broadcast
/// actor.
pub struct ChannelRadioAdapter {
    request_tx: mpsc::Sender<RadioRequest>,
    power_rx: watch::Receiver<PowerState>,
}

impl ChannelRadioAdapter {
    /// Create an adapter from its channel ends
    pub fn new(request_tx: mpsc::Sender<RadioRequest>, power_rx: watch::Receiver<PowerState>) -> Self {
        Self {
            request_tx,
            power_rx,
        }
    }

    fn forward(&self, request: RadioRequest) -> Result<(), AdapterError> {
        self.request_tx
            .try_send(request)
            .map_err(|e| AdapterError::Rejected(format!("radio task unavailable: {}", e)))
    }
}

impl RadioAdapter for ChannelRadioAdapter {
    fn power_state(&self) -> PowerState {
        *self.power_rx.borrow()
    }

    fn start_advertising(&mut self, payload: &AdvertisementPayload) -> Result<(), AdapterError> {
        let state = self.power_state();
        if !state.is_ready() {
            return Err(AdapterError::NotReady(state));
        }
        debug!("Forwarding start for record {}", payload.record);
        self.forward(RadioRequest::Start(*payload))
    }

    fn stop_advertising(&mut self) {
        if let Err(e) = self.forward(RadioRequest::Stop) {
            warn!("Failed to forward stop: {}", e);
        }
    }
}
