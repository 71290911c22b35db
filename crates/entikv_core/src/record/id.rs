//! Record identifiers.

use std::fmt;

/// Identifier of a record within a [`RecordStore`](crate::record::RecordStore).
///
/// A record id is either null (absent), a 64-bit integer, or an opaque byte
/// string. The total order is variant tag first (`Null < Int64 < Bytes`),
/// then the value: numeric for integers, lexicographic for bytes.
///
/// The canonical byte form produced by [`as_bytes`](Self::as_bytes) is the
/// physical key in record stores and the trailing component of index
/// composite keys: an `Int64` encodes as 8 big-endian two's-complement
/// bytes, a `Bytes` id is used verbatim, and null has no byte form.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordId {
    /// The absent id. Rejected by every mutating record-store call.
    #[default]
    Null,
    /// 64-bit integer id.
    Int64(i64),
    /// Opaque byte-string id.
    Bytes(Vec<u8>),
}

impl RecordId {
    /// Creates an integer record id.
    #[must_use]
    pub const fn from_long(id: i64) -> Self {
        Self::Int64(id)
    }

    /// Creates a byte-string record id, copying the bytes.
    ///
    /// An exactly-8-byte buffer is decoded as the canonical big-endian
    /// `Int64` encoding so that `as_bytes` round-trips; any other length
    /// stays a byte-string id.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        match <[u8; 8]>::try_from(data) {
            Ok(raw) => Self::Int64(i64::from_be_bytes(raw)),
            Err(_) => Self::Bytes(data.to_vec()),
        }
    }

    /// Returns the null record id.
    #[must_use]
    pub const fn null() -> Self {
        Self::Null
    }

    /// Returns true for the null id.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for an integer id.
    #[must_use]
    pub const fn is_long(&self) -> bool {
        matches!(self, Self::Int64(_))
    }

    /// Returns the integer value, if this is an integer id.
    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Int64(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the canonical byte encoding, or `None` for the null id.
    #[must_use]
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Null => None,
            Self::Int64(id) => Some(id.to_be_bytes().to_vec()),
            Self::Bytes(data) => Some(data.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "RecordId(null)"),
            Self::Int64(id) => write!(f, "RecordId({id})"),
            Self::Bytes(data) => {
                write!(f, "RecordId(0x")?;
                for byte in data {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int64_encodes_big_endian() {
        let id = RecordId::from_long(1);
        assert_eq!(id.as_bytes().unwrap(), vec![0, 0, 0, 0, 0, 0, 0, 1]);

        let id = RecordId::from_long(-1);
        assert_eq!(id.as_bytes().unwrap(), vec![0xff; 8]);
    }

    #[test]
    fn int64_round_trips_through_bytes() {
        for value in [0i64, 1, -1, 42, i64::MIN, i64::MAX] {
            let id = RecordId::from_long(value);
            let decoded = RecordId::from_bytes(&id.as_bytes().unwrap());
            assert_eq!(decoded, id, "round trip failed for {value}");
        }
    }

    #[test]
    fn non_eight_byte_buffers_stay_bytes() {
        let id = RecordId::from_bytes(b"abc");
        assert_eq!(id, RecordId::Bytes(b"abc".to_vec()));
        assert_eq!(id.as_bytes().unwrap(), b"abc".to_vec());
    }

    #[test]
    fn null_has_no_bytes() {
        assert!(RecordId::null().is_null());
        assert_eq!(RecordId::null().as_bytes(), None);
    }

    #[test]
    fn order_is_tag_then_value() {
        assert!(RecordId::null() < RecordId::from_long(i64::MIN));
        assert!(RecordId::from_long(i64::MAX) < RecordId::Bytes(vec![]));
        assert!(RecordId::from_long(1) < RecordId::from_long(2));
        assert!(RecordId::Bytes(vec![1]) < RecordId::Bytes(vec![1, 0]));
        assert!(RecordId::Bytes(vec![1]) < RecordId::Bytes(vec![2]));
    }

    #[test]
    fn display_forms() {
        assert_eq!(RecordId::null().to_string(), "RecordId(null)");
        assert_eq!(RecordId::from_long(42).to_string(), "RecordId(42)");
        assert_eq!(
            RecordId::Bytes(vec![0x2a, 0x2b]).to_string(),
            "RecordId(0x2a2b)"
        );
    }

    #[test]
    fn accessors() {
        let id = RecordId::from_long(7);
        assert!(id.is_long());
        assert_eq!(id.as_long(), Some(7));
        assert_eq!(RecordId::Bytes(vec![1]).as_long(), None);
    }
}
