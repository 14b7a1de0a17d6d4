//! Beacon Broadcast Multiplexer
//!
//! This crate multiplexes any number of user-configured beacons onto the
//! few advertising slots a radio stack allows at once.
//!
//! # Architecture
//!
//! - **BeaconRegistry**: the known beacons, their enabled/favorite flags and
//!   the admission rule capping how many may be enabled
//! - **RotationScheduler**: maps the enabled set onto `K` physical slots,
//!   sliding a window over the set on every tick once it outgrows them
//! - **BroadcastController**: drives a [`RadioAdapter`] from the scheduler's
//!   on-air set and reacts to power-state and sleep/wake signals
//! - **Broadcast actor**: owns the controller and store in a single tokio
//!   task; all mutations and the rotation tick are serialized through it
//!
//! All changes are reported through a unified [`BroadcastEvent`] stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use beacon_mux::{BroadcastController, RadioAdapter};
//! use beacon_protocol::BeaconIdentity;
//!
//! fn demo<A: RadioAdapter>(adapter: A) {
//!     let mut controller = BroadcastController::new(adapter);
//!     let lobby = controller.add_beacon("Lobby", BeaconIdentity::default());
//!     if let Err(e) = controller.set_enabled(lobby, true) {
//!         eprintln!("{}", e);
//!     }
//!
//!     for event in controller.drain_events() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod actor;
pub mod adapter;
pub mod controller;
pub mod error;
pub mod events;
pub mod registry;
pub mod rotation;
pub mod state;
pub mod store;

// Re-export actor types
pub use actor::{run_broadcast_actor, BroadcastCommand};

// Re-export radio seam
pub use adapter::{ChannelRadioAdapter, PowerState, RadioAdapter, RadioRequest};

// Re-export event types
pub use events::BroadcastEvent;

pub use controller::{
    BroadcastConfig, BroadcastController, BroadcastStatus, DEFAULT_MAX_CONCURRENT,
    DEFAULT_TICK_INTERVAL_MS,
};
pub use error::{AdapterError, AdmissionError, BroadcastError, StoreError};
pub use registry::{BeaconRegistry, RegistryEvent};
pub use rotation::{RotationPhase, RotationScheduler, RotationUpdate};
pub use state::{Beacon, BeaconId, DEFAULT_BEACON_NAME};
pub use store::{BeaconStore, JsonFileStore, MemoryStore, STORE_VERSION};
