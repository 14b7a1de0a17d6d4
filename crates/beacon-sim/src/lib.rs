//! Beacon Radio Simulation Library
//!
//! This crate provides a simulated advertising radio for exercising the
//! broadcaster without Bluetooth hardware. It includes:
//!
//! - **VirtualRadio**: a synchronous [`RadioAdapter`] with settable power
//!   state, an advertisement ceiling and a call log
//! - **run_virtual_radio_task**: an async task serving a
//!   [`ChannelRadioAdapter`] and acknowledging starts back to the broadcast
//!   actor, like a platform stack's delegate callbacks
//!
//! [`RadioAdapter`]: beacon_mux::RadioAdapter
//! [`ChannelRadioAdapter`]: beacon_mux::ChannelRadioAdapter
//!
//! # Example
//!
//! ```rust
//! use beacon_mux::{PowerState, RadioAdapter};
//! use beacon_protocol::{AdvertisementPayload, BeaconIdentity};
//! use beacon_sim::VirtualRadio;
//!
//! let mut radio = VirtualRadio::new("sim-0");
//! let payload = AdvertisementPayload::for_identity(&BeaconIdentity::default());
//! radio.start_advertising(&payload).unwrap();
//! assert!(radio.is_advertising());
//!
//! radio.set_power_state(PowerState::Off);
//! assert!(!radio.is_advertising());
//! ```

pub mod radio;
pub mod radio_task;

pub use radio::{RadioCall, VirtualRadio, VirtualRadioConfig};
pub use radio_task::{
    create_virtual_radio_channel, run_virtual_radio_task, VirtualRadioCommand, VirtualRadioIo,
    VirtualRadioState,
};
