//! Advertisement record codec
//!
//! Encodes a [`BeaconIdentity`] into the fixed 21-byte record carried in the
//! beacon advertisement, and decodes it back.

use std::fmt;

use tracing::trace;
use uuid::Uuid;

use crate::error::ParseError;
use crate::identity::BeaconIdentity;

/// Size of an encoded advertisement record in bytes
pub const RECORD_LEN: usize = 21;

/// Vendor-defined key the radio stack uses to recognize beacon data
pub const BEACON_DATA_KEY: &str = "kCBAdvDataAppleBeaconKey";

const UUID_END: usize = 16;
const MAJOR_END: usize = 18;
const MINOR_END: usize = 20;

/// Encoded beacon advertisement record
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvertisementRecord([u8; RECORD_LEN]);

impl AdvertisementRecord {
    /// Raw record bytes
    pub fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    /// Decode the identity carried in this record
    pub fn identity(&self) -> BeaconIdentity {
        identity_from_array(&self.0)
    }
}

impl TryFrom<&[u8]> for AdvertisementRecord {
    type Error = ParseError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; RECORD_LEN] =
            bytes.try_into().map_err(|_| ParseError::InvalidLength {
                expected: RECORD_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for AdvertisementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdvertisementRecord({})", self)
    }
}

impl fmt::Display for AdvertisementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// Record tagged with the data key it is advertised under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisementPayload {
    /// Vendor data key
    pub key: &'static str,
    /// Encoded record
    pub record: AdvertisementRecord,
}

impl AdvertisementPayload {
    /// Wrap a record under [`BEACON_DATA_KEY`]
    pub fn new(record: AdvertisementRecord) -> Self {
        Self {
            key: BEACON_DATA_KEY,
            record,
        }
    }

    /// Encode an identity and wrap it in one step
    pub fn for_identity(identity: &BeaconIdentity) -> Self {
        Self::new(encode(identity))
    }
}

/// Encode an identity into its advertisement record
pub fn encode(identity: &BeaconIdentity) -> AdvertisementRecord {
    let mut bytes = [0u8; RECORD_LEN];
    bytes[..UUID_END].copy_from_slice(identity.proximity_uuid.as_bytes());
    bytes[UUID_END..MAJOR_END].copy_from_slice(&identity.major.to_be_bytes());
    bytes[MAJOR_END..MINOR_END].copy_from_slice(&identity.minor.to_be_bytes());
    bytes[MINOR_END] = identity.measured_power.to_be_bytes()[0];
    AdvertisementRecord(bytes)
}

/// Decode an identity from raw record bytes
///
/// The input must be exactly [`RECORD_LEN`] bytes long.
pub fn decode(bytes: &[u8]) -> Result<BeaconIdentity, ParseError> {
    let record = AdvertisementRecord::try_from(bytes).inspect_err(|e| {
        trace!("Rejecting advertisement record: {}", e);
    })?;
    Ok(record.identity())
}

fn identity_from_array(bytes: &[u8; RECORD_LEN]) -> BeaconIdentity {
    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(&bytes[..UUID_END]);

    BeaconIdentity {
        proximity_uuid: Uuid::from_bytes(uuid),
        major: u16::from_be_bytes([bytes[UUID_END], bytes[UUID_END + 1]]),
        minor: u16::from_be_bytes([bytes[MAJOR_END], bytes[MAJOR_END + 1]]),
        measured_power: i8::from_be_bytes([bytes[MINOR_END]]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_byte_layout() {
        let identity = BeaconIdentity::new(Uuid::nil(), 0x0102, 0x0304, -59);
        let record = encode(&identity);
        let bytes = record.as_bytes();

        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(&bytes[..16], &[0u8; 16]);
        assert_eq!(&bytes[16..18], &[0x01, 0x02]);
        assert_eq!(&bytes[18..20], &[0x03, 0x04]);
        assert_eq!(bytes[20], 0xC5);
    }

    #[test]
    fn test_uuid_canonical_byte_order() {
        let identity =
            BeaconIdentity::parse("E2C56DB5-DFFB-48D2-B060-D0F5A71096E0", 0, 0, 0).unwrap();
        let record = encode(&identity);

        assert_eq!(
            &record.as_bytes()[..16],
            &[
                0xE2, 0xC5, 0x6D, 0xB5, 0xDF, 0xFB, 0x48, 0xD2, 0xB0, 0x60, 0xD0, 0xF5, 0xA7,
                0x10, 0x96, 0xE0
            ]
        );
    }

    #[test]
    fn test_power_extremes() {
        let max = encode(&BeaconIdentity::new(Uuid::nil(), 0, 0, i8::MAX));
        assert_eq!(max.as_bytes()[20], 0x7F);

        let min = encode(&BeaconIdentity::new(Uuid::nil(), 0, 0, i8::MIN));
        assert_eq!(min.as_bytes()[20], 0x80);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            decode(&[0u8; 20]),
            Err(ParseError::InvalidLength {
                expected: 21,
                actual: 20
            })
        );
        assert_eq!(
            decode(&[0u8; 22]),
            Err(ParseError::InvalidLength {
                expected: 21,
                actual: 22
            })
        );
    }

    #[test]
    fn test_display_is_spaced_hex() {
        let record = encode(&BeaconIdentity::new(Uuid::nil(), 0xABCD, 1, -1));
        let s = record.to_string();
        assert!(s.starts_with("00 00"));
        assert!(s.ends_with("AB CD 00 01 FF"));
    }

    #[test]
    fn test_payload_uses_beacon_key() {
        let payload = AdvertisementPayload::for_identity(&BeaconIdentity::default());
        assert_eq!(payload.key, "kCBAdvDataAppleBeaconKey");
    }

    fn identity() -> impl Strategy<Value = BeaconIdentity> {
        (any::<[u8; 16]>(), any::<u16>(), any::<u16>(), any::<i8>()).prop_map(
            |(uuid, major, minor, power)| {
                BeaconIdentity::new(Uuid::from_bytes(uuid), major, minor, power)
            },
        )
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(id in identity()) {
            let record = encode(&id);
            prop_assert_eq!(decode(record.as_bytes()).unwrap(), id);
        }
    }
}
