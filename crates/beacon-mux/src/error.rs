//! Error types for the broadcaster

use thiserror::Error;

use crate::adapter::PowerState;
use crate::state::BeaconId;

/// Reasons a beacon may not be enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Enabling would exceed the radio's concurrent advertisement limit
    #[error("at most {limit} beacons can be enabled at once")]
    CapacityExceeded {
        /// Configured concurrency ceiling
        limit: usize,
    },
}

/// Errors reported by a radio adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Radio is not powered on or not authorized
    #[error("radio not ready: {0}")]
    NotReady(PowerState),

    /// Radio refused the request
    #[error("{0}")]
    Rejected(String),
}

/// Errors from loading or saving the beacon list
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed file contents
    #[error("invalid beacon file: {0}")]
    Format(#[from] serde_json::Error),

    /// File written by an unknown schema version
    #[error("unsupported beacon file version {0}")]
    UnsupportedVersion(u32),
}

/// Errors that can occur in the broadcaster
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Beacon not found
    #[error("beacon not found: {0}")]
    BeaconNotFound(BeaconId),

    /// Enable request rejected
    #[error("cannot enable beacon: {0}")]
    Admission(#[from] AdmissionError),

    /// Supplied identity could not be parsed
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] beacon_protocol::ParseError),

    /// Radio not ready for broadcasting
    #[error("radio unavailable: {0}")]
    RadioUnavailable(PowerState),

    /// Radio refused to start advertising
    #[error("failed to start advertising: {0}")]
    AdapterStartFailure(String),

    /// Persistence error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<AdapterError> for BroadcastError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::NotReady(state) => Self::RadioUnavailable(state),
            AdapterError::Rejected(msg) => Self::AdapterStartFailure(msg),
        }
    }
}
