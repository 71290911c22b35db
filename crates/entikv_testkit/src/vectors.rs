//! Golden byte vectors for EntiKV encodings.
//!
//! These vectors pin the canonical record-id and composite-index-key
//! encodings so a format change cannot slip through unnoticed.

use serde::{Deserialize, Serialize};

/// A golden encoding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Expected encoded bytes (hex-encoded).
    pub expected_hex: String,
}

/// Encodes bytes as lowercase hex.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Decodes a lowercase hex string, panicking on malformed input.
///
/// # Panics
///
/// If `hex` has odd length or non-hex characters. Golden vectors are
/// hand-written constants, so a panic here is a broken vector.
#[must_use]
pub fn from_hex(hex: &str) -> Vec<u8> {
    assert!(hex.len() % 2 == 0, "hex string has odd length: {hex}");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("invalid hex digit"))
        .collect()
}

/// Canonical big-endian encodings of integer record ids.
#[must_use]
pub fn record_id_vectors() -> Vec<(TestVector, i64)> {
    vec![
        (
            TestVector {
                id: "record_id_zero".into(),
                description: "Int64 record id 0".into(),
                expected_hex: "0000000000000000".into(),
            },
            0,
        ),
        (
            TestVector {
                id: "record_id_one".into(),
                description: "Int64 record id 1".into(),
                expected_hex: "0000000000000001".into(),
            },
            1,
        ),
        (
            TestVector {
                id: "record_id_42".into(),
                description: "Int64 record id 42".into(),
                expected_hex: "000000000000002a".into(),
            },
            42,
        ),
        (
            TestVector {
                id: "record_id_minus_one".into(),
                description: "Int64 record id -1, two's complement".into(),
                expected_hex: "ffffffffffffffff".into(),
            },
            -1,
        ),
        (
            TestVector {
                id: "record_id_min".into(),
                description: "Int64 record id i64::MIN".into(),
                expected_hex: "8000000000000000".into(),
            },
            i64::MIN,
        ),
        (
            TestVector {
                id: "record_id_max".into(),
                description: "Int64 record id i64::MAX".into(),
                expected_hex: "7fffffffffffffff".into(),
            },
            i64::MAX,
        ),
    ]
}

/// Composite index key encodings: `u32_be(key len) ++ key ++ id bytes`.
///
/// Returns `(vector, application key, integer record id)`.
#[must_use]
pub fn composite_key_vectors() -> Vec<(TestVector, Vec<u8>, i64)> {
    vec![
        (
            TestVector {
                id: "composite_alice_1".into(),
                description: "key \"Alice\" with record id 1".into(),
                expected_hex: "00000005416c6963650000000000000001".into(),
            },
            b"Alice".to_vec(),
            1,
        ),
        (
            TestVector {
                id: "composite_single_byte".into(),
                description: "one-byte key 0x10 with record id 2".into(),
                expected_hex: "00000001100000000000000002".into(),
            },
            vec![0x10],
            2,
        ),
        (
            TestVector {
                id: "composite_negative_id".into(),
                description: "key \"k\" with record id -1".into(),
                expected_hex: "000000016bffffffffffffffff".into(),
            },
            b"k".to_vec(),
            -1,
        ),
    ]
}
