//! Composite-key encoding for index entries.
//!
//! An index entry's physical key combines the application key and the
//! record id so a single ordered store can hold several record ids per
//! application key while still sorting by the key first:
//!
//! ```text
//! [u32 big-endian length of key][key bytes][record id bytes]
//! ```
//!
//! The length prefix makes the record-id suffix recoverable without a
//! delimiter. The byte layout is a stable interoperability contract and
//! must not change.

use crate::error::{StorageError, StorageResult};
use crate::record::RecordId;

/// Width of the big-endian length prefix.
const LEN_PREFIX: usize = 4;

/// Encodes `(key, record_id)` into a composite physical key.
///
/// A null record id contributes no trailing bytes, which makes
/// `composite(key, Null)` the inclusive lower bound of all entries for
/// `key`.
#[must_use]
pub fn composite_key(key: &[u8], record_id: &RecordId) -> Vec<u8> {
    let id_bytes = record_id.as_bytes().unwrap_or_default();
    let mut composite = Vec::with_capacity(LEN_PREFIX + key.len() + id_bytes.len());
    composite.extend_from_slice(&(key.len() as u32).to_be_bytes());
    composite.extend_from_slice(key);
    composite.extend_from_slice(&id_bytes);
    composite
}

/// Exclusive upper bound for all composite entries whose application key is
/// exactly `key`.
///
/// Appends a `0xFF` sentinel to the key before composing. This relies on
/// the key-encoding constraint that application keys are unstructured byte
/// strings compared lexicographically, where `key ++ 0xFF` sorts after
/// `key ++ anything-shorter`; it is not a general successor for arbitrary
/// encodings.
#[must_use]
pub fn composite_upper_bound(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0xFF);
    composite_key(&next, &RecordId::null())
}

/// Splits a composite key back into `(application key, record id)`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidArgument`] if the buffer is shorter than
/// its length prefix claims.
pub fn parse_composite_key(composite: &[u8]) -> StorageResult<(Vec<u8>, RecordId)> {
    if composite.len() < LEN_PREFIX {
        return Err(StorageError::invalid_argument("composite key too short"));
    }

    let key_len =
        u32::from_be_bytes([composite[0], composite[1], composite[2], composite[3]]) as usize;
    if composite.len() < LEN_PREFIX + key_len {
        return Err(StorageError::invalid_argument("composite key truncated"));
    }

    let key = composite[LEN_PREFIX..LEN_PREFIX + key_len].to_vec();
    let id_bytes = &composite[LEN_PREFIX + key_len..];
    let record_id = if id_bytes.is_empty() {
        RecordId::null()
    } else {
        RecordId::from_bytes(id_bytes)
    };

    Ok((key, record_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_len_key_id() {
        let composite = composite_key(b"name", &RecordId::from_long(1));

        assert_eq!(&composite[..4], &[0, 0, 0, 4]);
        assert_eq!(&composite[4..8], b"name");
        assert_eq!(&composite[8..], &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn null_record_id_contributes_nothing() {
        let composite = composite_key(b"name", &RecordId::null());
        assert_eq!(composite.len(), 4 + 4);
    }

    #[test]
    fn parse_round_trips() {
        let id = RecordId::from_long(42);
        let composite = composite_key(b"age", &id);

        let (key, parsed) = parse_composite_key(&composite).unwrap();
        assert_eq!(key, b"age".to_vec());
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_bytes_record_id() {
        let id = RecordId::Bytes(vec![1, 2, 3]);
        let composite = composite_key(b"k", &id);

        let (_, parsed) = parse_composite_key(&composite).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_short_buffers() {
        assert!(parse_composite_key(&[0, 0]).is_err());
        // Prefix claims 10 key bytes, only 1 present.
        assert!(parse_composite_key(&[0, 0, 0, 10, 7]).is_err());
    }

    #[test]
    fn upper_bound_brackets_exact_key() {
        let key = b"alice";
        let lower = composite_key(key, &RecordId::null());
        let upper = composite_upper_bound(key);

        for id in [RecordId::from_long(i64::MIN), RecordId::from_long(0), RecordId::from_long(i64::MAX)] {
            let entry = composite_key(key, &id);
            assert!(lower <= entry, "entry below lower bound");
            assert!(entry < upper, "entry not below upper bound");
        }
    }

    #[test]
    fn entries_sort_by_key_then_record_id() {
        let a1 = composite_key(b"a", &RecordId::from_long(1));
        let a2 = composite_key(b"a", &RecordId::from_long(2));
        let b1 = composite_key(b"b", &RecordId::from_long(1));

        assert!(a1 < a2);
        assert!(a2 < b1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn composite_round_trips(
                key in prop::collection::vec(any::<u8>(), 1..64),
                id in any::<i64>(),
            ) {
                let record_id = RecordId::from_long(id);
                let composite = composite_key(&key, &record_id);

                let (parsed_key, parsed_id) = parse_composite_key(&composite).unwrap();
                prop_assert_eq!(parsed_key, key);
                prop_assert_eq!(parsed_id, record_id);
            }

            #[test]
            fn every_entry_falls_inside_its_key_bounds(
                key in prop::collection::vec(any::<u8>(), 1..64),
                id in any::<i64>(),
            ) {
                let lower = composite_key(&key, &RecordId::null());
                let upper = composite_upper_bound(&key);
                let entry = composite_key(&key, &RecordId::from_long(id));

                prop_assert!(lower <= entry);
                prop_assert!(entry < upper);
            }
        }
    }
}
