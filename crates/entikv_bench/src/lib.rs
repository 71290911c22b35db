//! Benchmark utilities for EntiKV.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use entikv_core::RecordId;
use rand::Rng;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` sequential integer record ids starting at 1.
pub fn sequential_ids(count: usize) -> Vec<RecordId> {
    (1..=count as i64).map(RecordId::from_long).collect()
}

/// Generate `count` random tree keys, 8..=32 bytes each.
pub fn random_keys(count: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let len = rng.gen_range(8..=32);
            (0..len).map(|_| rng.gen()).collect()
        })
        .collect()
}
