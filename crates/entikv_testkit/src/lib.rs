//! # EntiKV Testkit
//!
//! Test utilities for EntiKV.
//!
//! This crate provides:
//! - Engine fixtures and seeded demo data
//! - Property-based test generators using proptest
//! - Golden byte vectors for encoding verification
//!
//! ## Usage
//!
//! ```rust
//! use entikv_testkit::prelude::*;
//!
//! let engine = started_engine();
//! seed_users(&engine, "testdb.users").unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
