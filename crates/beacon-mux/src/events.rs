//! Unified event stream for the broadcaster
//!
//! Everything observers need to mirror broadcaster state (registry changes,
//! rotation, radio status, errors) is emitted through a single event stream,
//! in the order the changes happened.

use crate::adapter::PowerState;
use crate::rotation::RotationPhase;
use crate::state::BeaconId;

/// Unified event enum for all broadcaster activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastEvent {
    // -------------------------------------------------------------------------
    // Registry events
    // -------------------------------------------------------------------------
    /// A beacon was added
    BeaconAdded {
        /// Id of the new beacon
        id: BeaconId,
    },

    /// A beacon's name or identity changed
    BeaconUpdated {
        /// Id of the edited beacon
        id: BeaconId,
    },

    /// A beacon was removed
    BeaconRemoved {
        /// Id of the removed beacon
        id: BeaconId,
        /// Whether it had to be withdrawn from broadcast first
        withdrawn: bool,
    },

    /// A beacon was enabled or disabled
    EnabledChanged {
        /// Id of the beacon
        id: BeaconId,
        /// New enabled flag
        enabled: bool,
    },

    /// A beacon's favorite flag changed
    FavoriteChanged {
        /// Id of the beacon
        id: BeaconId,
        /// New favorite flag
        favorite: bool,
    },

    /// Enabling a beacon was refused because every slot is taken
    AdmissionRejected {
        /// Beacon the user tried to enable
        id: BeaconId,
        /// Concurrency ceiling
        limit: usize,
    },

    // -------------------------------------------------------------------------
    // Rotation events
    // -------------------------------------------------------------------------
    /// The set of beacons occupying slots changed
    OnAirChanged {
        /// Slot occupants, oldest first
        on_air: Vec<BeaconId>,
    },

    /// The scheduler moved between idle, steady and rotating
    PhaseChanged {
        /// Previous phase
        from: RotationPhase,
        /// New phase
        to: RotationPhase,
    },

    // -------------------------------------------------------------------------
    // Radio events
    // -------------------------------------------------------------------------
    /// The radio reported a new power state
    PowerStateChanged {
        /// New power state
        state: PowerState,
    },

    /// The radio acknowledged or lost advertising
    AdvertisingChanged {
        /// Whether the radio is advertising
        advertising: bool,
    },

    /// Human-readable status line changed
    Status {
        /// Status text
        message: String,
    },

    /// A non-fatal error occurred
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl BroadcastEvent {
    /// Check if this is a registry event
    pub fn is_registry(&self) -> bool {
        matches!(
            self,
            BroadcastEvent::BeaconAdded { .. }
                | BroadcastEvent::BeaconUpdated { .. }
                | BroadcastEvent::BeaconRemoved { .. }
                | BroadcastEvent::EnabledChanged { .. }
                | BroadcastEvent::FavoriteChanged { .. }
                | BroadcastEvent::AdmissionRejected { .. }
        )
    }

    /// Check if this event changes what is on air
    pub fn is_rotation(&self) -> bool {
        matches!(
            self,
            BroadcastEvent::OnAirChanged { .. } | BroadcastEvent::PhaseChanged { .. }
        )
    }

    /// Get the beacon id if this event concerns a single beacon
    pub fn beacon_id(&self) -> Option<BeaconId> {
        match self {
            BroadcastEvent::BeaconAdded { id }
            | BroadcastEvent::BeaconUpdated { id }
            | BroadcastEvent::BeaconRemoved { id, .. }
            | BroadcastEvent::EnabledChanged { id, .. }
            | BroadcastEvent::FavoriteChanged { id, .. }
            | BroadcastEvent::AdmissionRejected { id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let id = BeaconId::new();

        let added = BroadcastEvent::BeaconAdded { id };
        assert!(added.is_registry());
        assert!(!added.is_rotation());
        assert_eq!(added.beacon_id(), Some(id));

        let on_air = BroadcastEvent::OnAirChanged { on_air: vec![id] };
        assert!(on_air.is_rotation());
        assert!(!on_air.is_registry());
        assert_eq!(on_air.beacon_id(), None);

        let power = BroadcastEvent::PowerStateChanged {
            state: PowerState::Off,
        };
        assert!(!power.is_registry());
        assert!(!power.is_rotation());
    }
}
