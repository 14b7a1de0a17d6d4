//! Broadcast Actor
//!
//! Async task that owns the broadcast controller and the beacon store. User
//! commands, radio callbacks and the rotation tick are all handled in one
//! `select!` loop, so nothing else ever mutates broadcaster state.
//!
//! # Example
//!
//! ```rust,ignore
//! use beacon_mux::actor::{run_broadcast_actor, BroadcastCommand};
//! use beacon_mux::{BroadcastController, MemoryStore};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(64);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! let controller = BroadcastController::new(adapter);
//! tokio::spawn(run_broadcast_actor(controller, MemoryStore::new(), cmd_rx, event_tx));
//! ```

use beacon_protocol::BeaconIdentity;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::adapter::{PowerState, RadioAdapter};
use crate::controller::{BroadcastController, BroadcastStatus};
use crate::error::BroadcastError;
use crate::events::BroadcastEvent;
use crate::state::{Beacon, BeaconId};
use crate::store::BeaconStore;

/// Commands sent to the broadcast actor
#[derive(Debug)]
pub enum BroadcastCommand {
    /// Add a new, disabled beacon
    AddBeacon {
        /// Display name
        name: String,
        /// Identity to broadcast
        identity: BeaconIdentity,
        /// Channel to send back the new id
        response: oneshot::Sender<BeaconId>,
    },

    /// Replace a beacon's name and identity
    EditBeacon {
        /// Beacon to edit
        id: BeaconId,
        /// New display name
        name: String,
        /// New identity
        identity: BeaconIdentity,
        /// Result of the edit
        response: oneshot::Sender<Result<(), BroadcastError>>,
    },

    /// Remove a beacon
    RemoveBeacon {
        /// Beacon to remove
        id: BeaconId,
        /// The removed beacon, if it existed
        response: oneshot::Sender<Result<Beacon, BroadcastError>>,
    },

    /// Flip a beacon's favorite flag
    ToggleFavorite {
        /// Beacon to update
        id: BeaconId,
        /// New favorite flag
        response: oneshot::Sender<Result<bool, BroadcastError>>,
    },

    /// Enable or disable a beacon
    SetEnabled {
        /// Beacon to update
        id: BeaconId,
        /// Desired enabled flag
        enabled: bool,
        /// Result, including admission rejection
        response: oneshot::Sender<Result<(), BroadcastError>>,
    },

    /// Radio power state changed
    PowerStateChanged {
        /// New state
        state: PowerState,
    },

    /// Radio acknowledged a start request
    AdvertisingStarted {
        /// `Err` carries the radio's failure description
        result: Result<(), String>,
    },

    /// System is going to sleep
    Suspend,

    /// System woke up
    Resume,

    /// Query the broadcaster status
    QueryStatus {
        /// Channel to send back the snapshot
        response: oneshot::Sender<BroadcastStatus>,
    },

    /// Query the beacon list
    ListBeacons {
        /// Channel to send back all beacons in insertion order
        response: oneshot::Sender<Vec<Beacon>>,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Forward buffered controller events to observers
async fn flush_events<A: RadioAdapter>(
    controller: &mut BroadcastController<A>,
    event_tx: &mpsc::Sender<BroadcastEvent>,
) {
    for event in controller.drain_events() {
        let _ = event_tx.send(event).await;
    }
}

/// Save the beacon list, reporting failures as events
async fn persist<A: RadioAdapter, S: BeaconStore>(
    controller: &BroadcastController<A>,
    store: &mut S,
    event_tx: &mpsc::Sender<BroadcastEvent>,
) {
    if let Err(e) = store.save(controller.beacons()) {
        warn!("Failed to save beacons: {}", e);
        let _ = event_tx
            .send(BroadcastEvent::Error {
                source: "Store".to_string(),
                message: e.to_string(),
            })
            .await;
    }
}

/// Handle one command; returns false on shutdown
async fn handle_command<A: RadioAdapter, S: BeaconStore>(
    controller: &mut BroadcastController<A>,
    store: &mut S,
    event_tx: &mpsc::Sender<BroadcastEvent>,
    cmd: BroadcastCommand,
) -> bool {
    let mut dirty = false;

    match cmd {
        BroadcastCommand::AddBeacon {
            name,
            identity,
            response,
        } => {
            let id = controller.add_beacon(name, identity);
            info!("Added beacon {} ({})", id.short(), identity);
            let _ = response.send(id);
            dirty = true;
        }

        BroadcastCommand::EditBeacon {
            id,
            name,
            identity,
            response,
        } => {
            let result = controller.edit_beacon(id, name, identity);
            dirty = result.is_ok();
            let _ = response.send(result);
        }

        BroadcastCommand::RemoveBeacon { id, response } => {
            let result = controller.remove_beacon(id);
            if let Ok(beacon) = &result {
                info!("Removed beacon {} ({})", beacon.display_name(), id.short());
                dirty = true;
            }
            let _ = response.send(result);
        }

        BroadcastCommand::ToggleFavorite { id, response } => {
            let result = controller.toggle_favorite(id);
            dirty = result.is_ok();
            let _ = response.send(result);
        }

        BroadcastCommand::SetEnabled {
            id,
            enabled,
            response,
        } => {
            let result = controller.set_enabled(id, enabled);
            match &result {
                Ok(()) => dirty = true,
                Err(e) => warn!("Cannot set {} enabled={}: {}", id.short(), enabled, e),
            }
            let _ = response.send(result);
        }

        BroadcastCommand::PowerStateChanged { state } => {
            controller.handle_power_state(state);
        }

        BroadcastCommand::AdvertisingStarted { result } => {
            controller.handle_advertising_ack(result);
        }

        BroadcastCommand::Suspend => {
            controller.suspend();
        }

        BroadcastCommand::Resume => {
            controller.resume();
        }

        BroadcastCommand::QueryStatus { response } => {
            let _ = response.send(controller.status());
        }

        BroadcastCommand::ListBeacons { response } => {
            let _ = response.send(controller.beacons().to_vec());
        }

        BroadcastCommand::Shutdown => {
            info!("Broadcast actor shutting down");
            return false;
        }
    }

    flush_events(controller, event_tx).await;
    if dirty {
        persist(controller, store, event_tx).await;
    }
    true
}

/// Run the broadcast actor
///
/// Loads the persisted beacon list (everything starts disabled), then
/// processes commands until shutdown or until every command sender is
/// dropped. The radio is stopped on exit.
pub async fn run_broadcast_actor<A: RadioAdapter, S: BeaconStore>(
    mut controller: BroadcastController<A>,
    mut store: S,
    mut cmd_rx: mpsc::Receiver<BroadcastCommand>,
    event_tx: mpsc::Sender<BroadcastEvent>,
) {
    match store.load() {
        Ok(beacons) => controller.load_beacons(beacons),
        Err(e) => {
            warn!("Failed to load beacons: {}", e);
            let _ = event_tx
                .send(BroadcastEvent::Error {
                    source: "Store".to_string(),
                    message: e.to_string(),
                })
                .await;
        }
    }
    flush_events(&mut controller, &event_tx).await;
    info!(
        "Broadcast actor started ({} beacons, {} slots)",
        controller.beacons().len(),
        controller.scheduler().capacity()
    );

    // Rotation timer, only polled while rotating on a ready radio
    let period = controller.config().tick_interval();
    let mut rotation_timer = interval_at(Instant::now() + period, period);
    rotation_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticking = controller.ticking_enabled();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                if !handle_command(&mut controller, &mut store, &event_tx, cmd).await {
                    break;
                }
            }

            _ = rotation_timer.tick(), if ticking => {
                controller.tick();
                flush_events(&mut controller, &event_tx).await;
            }
        }

        let now_ticking = controller.ticking_enabled();
        if now_ticking && !ticking {
            debug!("Rotation timer armed ({:?})", period);
            rotation_timer.reset();
        } else if !now_ticking && ticking {
            debug!("Rotation timer paused");
        }
        ticking = now_ticking;
    }

    if !controller.scheduler().on_air().is_empty() {
        controller.adapter_mut().stop_advertising();
    }
    info!("Broadcast actor stopped");
}
