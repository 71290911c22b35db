//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random keys, values, record ids,
//! and namespaces that maintain engine invariants.

use entikv_core::RecordId;
use proptest::prelude::*;

/// Strategy for generating non-null record ids.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    prop_oneof![
        any::<i64>().prop_map(RecordId::from_long),
        prop::collection::vec(any::<u8>(), 1..32).prop_map(|bytes| RecordId::from_bytes(&bytes)),
    ]
}

/// Strategy for generating valid (non-empty) tree keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

/// Strategy for generating record values, empty included.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating `database.collection` namespaces.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{0,7}", "[a-z][a-z0-9]{0,7}").prop_map(|(db, coll)| format!("{db}.{coll}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn record_ids_are_never_null(id in record_id_strategy()) {
            prop_assert!(!id.is_null());
        }

        #[test]
        fn record_ids_round_trip_their_bytes(id in record_id_strategy()) {
            let bytes = id.as_bytes().unwrap();
            prop_assert_eq!(RecordId::from_bytes(&bytes), id);
        }

        #[test]
        fn keys_are_non_empty(key in key_strategy()) {
            prop_assert!(!key.is_empty());
        }

        #[test]
        fn namespaces_are_dot_qualified(ns in namespace_strategy()) {
            prop_assert_eq!(ns.matches('.').count(), 1);
        }
    }
}
