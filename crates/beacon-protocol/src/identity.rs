//! Beacon identity
//!
//! The identity triple (plus calibration power) a scanner uses to
//! recognize a beacon.

use std::fmt;

use uuid::Uuid;

use crate::error::ParseError;

/// Major value used when none is supplied
pub const DEFAULT_MAJOR: u16 = 1;

/// Minor value used when none is supplied
pub const DEFAULT_MINOR: u16 = 1;

/// Typical calibration RSSI at 1 meter
pub const DEFAULT_MEASURED_POWER: i8 = -59;

/// Identity broadcast by a single beacon
///
/// Every field is always defined, so any value of this type can be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeaconIdentity {
    /// 128-bit identifier of the beacon family
    pub proximity_uuid: Uuid,
    /// First subdivision within the proximity UUID
    pub major: u16,
    /// Second subdivision within the proximity UUID
    pub minor: u16,
    /// Expected RSSI at 1 meter, in dBm
    pub measured_power: i8,
}

impl BeaconIdentity {
    /// Create an identity from already-typed fields
    pub fn new(proximity_uuid: Uuid, major: u16, minor: u16, measured_power: i8) -> Self {
        Self {
            proximity_uuid,
            major,
            minor,
            measured_power,
        }
    }

    /// Create an identity with a freshly generated proximity UUID
    pub fn generate(major: u16, minor: u16, measured_power: i8) -> Self {
        Self::new(Uuid::new_v4(), major, minor, measured_power)
    }

    /// Parse an identity from a user-supplied UUID string
    ///
    /// Accepts any textual form `uuid` understands (hyphenated, simple,
    /// braced, urn), case-insensitively.
    pub fn parse(
        uuid: &str,
        major: u16,
        minor: u16,
        measured_power: i8,
    ) -> Result<Self, ParseError> {
        let proximity_uuid = Uuid::parse_str(uuid.trim())
            .map_err(|_| ParseError::InvalidUuid(uuid.to_string()))?;
        Ok(Self::new(proximity_uuid, major, minor, measured_power))
    }

    /// Build an identity from untyped numeric values, saturating each one
    /// into its field's range
    pub fn from_raw_saturating(proximity_uuid: Uuid, major: i64, minor: i64, measured_power: i64) -> Self {
        Self::new(
            proximity_uuid,
            major.clamp(0, u16::MAX as i64) as u16,
            minor.clamp(0, u16::MAX as i64) as u16,
            measured_power.clamp(i8::MIN as i64, i8::MAX as i64) as i8,
        )
    }

    /// Canonical upper-case hyphenated form of the proximity UUID
    pub fn uuid_string(&self) -> String {
        format!("{:X}", self.proximity_uuid.hyphenated())
    }
}

impl Default for BeaconIdentity {
    fn default() -> Self {
        Self::generate(DEFAULT_MAJOR, DEFAULT_MINOR, DEFAULT_MEASURED_POWER)
    }
}

impl fmt::Display for BeaconIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} major={} minor={} power={}dBm",
            self.uuid_string(),
            self.major,
            self.minor,
            self.measured_power
        )
    }
}
