//! Beacon Protocol Library
//!
//! This crate provides the identity model and the binary advertisement
//! format for proximity beacons:
//!
//! - **BeaconIdentity**: proximity UUID, major, minor and measured power
//! - **AdvertisementRecord**: the fixed 21-byte record scanners decode
//! - **AdvertisementPayload**: a record tagged with the vendor data key
//!   the radio stack expects
//!
//! # Record layout
//!
//! All multi-byte fields are big-endian:
//!
//! | Offset | Length | Field |
//! |---|---|---|
//! | 0 | 16 | proximity UUID |
//! | 16 | 2 | major |
//! | 18 | 2 | minor |
//! | 20 | 1 | measured power (two's complement) |
//!
//! # Example
//!
//! ```rust
//! use beacon_protocol::{decode, encode, BeaconIdentity};
//!
//! let identity = BeaconIdentity::parse("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0", 1, 2, -59).unwrap();
//! let record = encode(&identity);
//!
//! assert_eq!(record.as_bytes().len(), 21);
//! assert_eq!(decode(record.as_bytes()).unwrap(), identity);
//! ```

pub mod error;
pub mod identity;
pub mod record;

pub use error::ParseError;
pub use identity::{
    BeaconIdentity, DEFAULT_MAJOR, DEFAULT_MEASURED_POWER, DEFAULT_MINOR,
};
pub use record::{decode, encode, AdvertisementPayload, AdvertisementRecord, BEACON_DATA_KEY, RECORD_LEN};
pub use uuid::Uuid;
