//! Rotation scheduler
//!
//! Maps an unbounded, ordered set of enabled beacons onto a bounded number
//! of physical advertising slots. When more beacons are enabled than there
//! are slots, each tick slides the on-air window forward by one beacon in
//! activation order, so every enabled beacon gets air time.
//!
//! The scheduler is pure bookkeeping. It never touches the radio and never
//! owns a timer; callers react to the [`RotationUpdate`] each operation
//! returns.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::BeaconId;

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationPhase {
    /// Nothing enabled
    Idle,
    /// Every enabled beacon fits on air
    Steady,
    /// More beacons than slots; ticks rotate the window
    Rotating,
}

impl RotationPhase {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Steady => "Steady",
            Self::Rotating => "Rotating",
        }
    }
}

/// Outcome of a scheduler operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationUpdate {
    /// Phase before the operation
    pub from: RotationPhase,
    /// Phase after the operation
    pub to: RotationPhase,
    /// Beacons that went on air
    pub admitted: Vec<BeaconId>,
    /// Beacons that left the air
    pub withdrawn: Vec<BeaconId>,
}

impl RotationUpdate {
    fn unchanged(phase: RotationPhase) -> Self {
        Self {
            from: phase,
            to: phase,
            admitted: Vec::new(),
            withdrawn: Vec::new(),
        }
    }

    /// Whether the on-air set changed
    pub fn on_air_changed(&self) -> bool {
        !self.admitted.is_empty() || !self.withdrawn.is_empty()
    }

    /// Whether the periodic tick needs to be armed
    pub fn starts_rotation(&self) -> bool {
        self.to == RotationPhase::Rotating && self.from != RotationPhase::Rotating
    }

    /// Whether the periodic tick needs to be cancelled
    pub fn stops_rotation(&self) -> bool {
        self.from == RotationPhase::Rotating && self.to != RotationPhase::Rotating
    }
}

/// Round-robin scheduler over a bounded number of slots
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    capacity: usize,
    /// Enabled beacons in activation order
    active_set: Vec<BeaconId>,
    /// Index of the next beacon to bring on air; wraps to 0 before use
    cursor: usize,
    /// Slot occupants, oldest first
    on_air: VecDeque<BeaconId>,
}

impl RotationScheduler {
    /// Create a scheduler with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            active_set: Vec::new(),
            cursor: 0,
            on_air: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of physical slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current phase
    pub fn phase(&self) -> RotationPhase {
        match self.active_set.len() {
            0 => RotationPhase::Idle,
            n if n <= self.capacity => RotationPhase::Steady,
            _ => RotationPhase::Rotating,
        }
    }

    /// Whether the window is rotating
    pub fn is_rotating(&self) -> bool {
        self.phase() == RotationPhase::Rotating
    }

    /// Enabled beacons in rotation order
    pub fn active_set(&self) -> &[BeaconId] {
        &self.active_set
    }

    /// Beacons currently occupying slots, oldest first
    pub fn on_air(&self) -> Vec<BeaconId> {
        self.on_air.iter().copied().collect()
    }

    /// Whether a beacon currently occupies a slot
    pub fn is_on_air(&self, id: BeaconId) -> bool {
        self.on_air.contains(&id)
    }

    /// Whether a beacon is in the active set
    pub fn contains(&self, id: BeaconId) -> bool {
        self.active_set.contains(&id)
    }

    /// Rotation cursor
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Add a beacon to the end of the rotation order
    ///
    /// While slots are free the beacon goes on air immediately. Otherwise it
    /// waits for its turn and the current occupants are left alone.
    pub fn activate(&mut self, id: BeaconId) -> RotationUpdate {
        let from = self.phase();
        if self.contains(id) {
            return RotationUpdate::unchanged(from);
        }

        self.active_set.push(id);
        let mut update = RotationUpdate::unchanged(from);

        if self.on_air.len() < self.capacity {
            self.on_air.push_back(id);
            self.cursor = self.active_set.len();
            update.admitted.push(id);
        }

        update.to = self.phase();
        debug!(
            "Activated {} ({} -> {}, {} active)",
            id.short(),
            from.name(),
            update.to.name(),
            self.active_set.len()
        );
        update
    }

    /// Remove a beacon from the rotation
    ///
    /// An on-air beacon is withdrawn and its slot is refilled in the same
    /// update, so the on-air count never drops below
    /// `min(capacity, active)`.
    pub fn deactivate(&mut self, id: BeaconId) -> RotationUpdate {
        let from = self.phase();
        let Some(index) = self.active_set.iter().position(|b| *b == id) else {
            return RotationUpdate::unchanged(from);
        };

        self.active_set.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }

        let mut update = RotationUpdate::unchanged(from);
        if let Some(slot) = self.on_air.iter().position(|b| *b == id) {
            self.on_air.remove(slot);
            update.withdrawn.push(id);
        }

        match self.phase() {
            RotationPhase::Idle => {
                self.cursor = 0;
                self.on_air.clear();
            }
            RotationPhase::Steady => {
                for candidate in &self.active_set {
                    if !self.on_air.contains(candidate) {
                        self.on_air.push_back(*candidate);
                        update.admitted.push(*candidate);
                    }
                }
                self.cursor = self.active_set.len();
            }
            RotationPhase::Rotating => {
                if self.on_air.len() < self.capacity {
                    if let Some(next) = self.next_eligible() {
                        self.on_air.push_back(next);
                        update.admitted.push(next);
                    }
                }
            }
        }

        update.to = self.phase();
        debug!(
            "Deactivated {} ({} -> {}, {} active)",
            id.short(),
            from.name(),
            update.to.name(),
            self.active_set.len()
        );
        update
    }

    /// Advance the rotation by one step
    ///
    /// Evicts the longest-serving slot occupant and brings in the next
    /// beacon in rotation order. A no-op unless rotating.
    pub fn tick(&mut self) -> RotationUpdate {
        let phase = self.phase();
        let mut update = RotationUpdate::unchanged(phase);
        if phase != RotationPhase::Rotating {
            return update;
        }

        let Some(next) = self.next_eligible() else {
            return update;
        };

        if let Some(evicted) = self.on_air.pop_front() {
            update.withdrawn.push(evicted);
        }
        self.on_air.push_back(next);
        update.admitted.push(next);

        debug!(
            "Rotation tick: {:?} -> {} (cursor {})",
            update.withdrawn.iter().map(|b| b.short()).collect::<Vec<_>>(),
            next.short(),
            self.cursor
        );
        update
    }

    /// Next beacon at or after the cursor that is not already on air
    fn next_eligible(&mut self) -> Option<BeaconId> {
        let n = self.active_set.len();
        for _ in 0..n {
            if self.cursor >= n {
                self.cursor = 0;
            }
            let candidate = self.active_set[self.cursor];
            self.cursor += 1;
            if !self.on_air.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
