//! Virtual radio actor task
//!
//! Owns a [`VirtualRadio`] and serves a [`ChannelRadioAdapter`] held by the
//! broadcast actor. The task uses a select! loop to:
//! - Apply start/stop requests and acknowledge starts back to the actor
//! - Handle power changes, failure injection and shutdown from a channel
//! - Emit state snapshots via a broadcast channel

use beacon_mux::{BroadcastCommand, ChannelRadioAdapter, PowerState, RadioAdapter, RadioRequest};
use beacon_protocol::BeaconIdentity;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::radio::VirtualRadio;

/// Capacity of the request channel between adapter and task
const REQUEST_CHANNEL_SIZE: usize = 64;

/// Commands that can be sent to a virtual radio task
#[derive(Debug)]
pub enum VirtualRadioCommand {
    /// Change the simulated power state
    SetPowerState(PowerState),
    /// Make the next start request fail
    FailNextStart(String),
    /// Query the current state
    Snapshot(oneshot::Sender<VirtualRadioState>),
    /// Shutdown the virtual radio task
    Shutdown,
}

/// Snapshot of the virtual radio, emitted whenever it changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualRadioState {
    /// Current power state
    pub power: PowerState,
    /// Identities on air, in start order
    pub advertising: Vec<BeaconIdentity>,
}

impl VirtualRadioState {
    fn of(radio: &VirtualRadio) -> Self {
        Self {
            power: radio.power_state(),
            advertising: radio.advertised_identities(),
        }
    }
}

/// Task side of a virtual radio channel
pub struct VirtualRadioIo {
    /// Requests forwarded by the adapter
    pub request_rx: mpsc::Receiver<RadioRequest>,
    /// Power state published to the adapter
    pub power_tx: watch::Sender<PowerState>,
}

/// Create a connected adapter and task-side channel ends
pub fn create_virtual_radio_channel(initial_power: PowerState) -> (ChannelRadioAdapter, VirtualRadioIo) {
    let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
    let (power_tx, power_rx) = watch::channel(initial_power);

    (
        ChannelRadioAdapter::new(request_tx, power_rx),
        VirtualRadioIo {
            request_rx,
            power_tx,
        },
    )
}

/// Run the virtual radio task
///
/// Start requests are acknowledged to the broadcast actor with
/// [`BroadcastCommand::AdvertisingStarted`]; power changes are published on
/// the watch channel first and then reported with
/// [`BroadcastCommand::PowerStateChanged`], so the adapter never sees a
/// stale state after the actor does.
pub async fn run_virtual_radio_task(
    mut radio: VirtualRadio,
    io: VirtualRadioIo,
    mut cmd_rx: mpsc::Receiver<VirtualRadioCommand>,
    actor_tx: mpsc::Sender<BroadcastCommand>,
    state_tx: broadcast::Sender<VirtualRadioState>,
) {
    let VirtualRadioIo {
        mut request_rx,
        power_tx,
    } = io;

    info!("Starting virtual radio task for {}", radio.id());
    let _ = power_tx.send(radio.power_state());
    let _ = state_tx.send(VirtualRadioState::of(&radio));

    loop {
        tokio::select! {
            request = request_rx.recv() => {
                let Some(request) = request else {
                    debug!("Request channel closed for virtual radio {}", radio.id());
                    break;
                };

                match request {
                    RadioRequest::Start(payload) => {
                        let result = radio.start_advertising(&payload).map_err(|e| e.to_string());
                        if let Err(e) = &result {
                            warn!("Virtual radio {} start failed: {}", radio.id(), e);
                        }
                        let _ = actor_tx
                            .send(BroadcastCommand::AdvertisingStarted { result })
                            .await;
                    }
                    RadioRequest::Stop => {
                        radio.stop_advertising();
                    }
                }
                let _ = state_tx.send(VirtualRadioState::of(&radio));
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualRadioCommand::SetPowerState(state)) => {
                        info!("Virtual radio {} power set to {}", radio.id(), state);
                        radio.set_power_state(state);
                        let _ = power_tx.send(state);
                        let _ = actor_tx
                            .send(BroadcastCommand::PowerStateChanged { state })
                            .await;
                        let _ = state_tx.send(VirtualRadioState::of(&radio));
                    }
                    Some(VirtualRadioCommand::FailNextStart(reason)) => {
                        radio.fail_next_start(reason);
                    }
                    Some(VirtualRadioCommand::Snapshot(response)) => {
                        let _ = response.send(VirtualRadioState::of(&radio));
                    }
                    Some(VirtualRadioCommand::Shutdown) => {
                        info!("Shutdown requested for virtual radio {}", radio.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual radio {}", radio.id());
                        break;
                    }
                }
            }
        }
    }

    info!("Virtual radio task ended for {}", radio.id());
}
