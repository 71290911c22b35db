//! Core type definitions for EntiKV.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Unique identifier for an engine session.
///
/// Session IDs are opaque: nothing beyond uniqueness and stability for the
/// session's lifetime is implied. The `Display` form is the canonical string
/// callers may log or key registries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in time, in nanoseconds since the Unix epoch.
///
/// Transactions record a read timestamp at begin and a commit timestamp at
/// commit; both are reserved hooks for multi-version concurrency control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self(nanos)
    }

    /// Returns true for the zero timestamp, which stands for "unset".
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_display_is_uuid() {
        let id = SessionId::generate();
        assert_eq!(format!("{id}"), id.as_uuid().to_string());
    }

    #[test]
    fn timestamp_now_is_nonzero() {
        assert!(!Timestamp::now().is_zero());
    }

    #[test]
    fn timestamp_ordering() {
        let t1 = Timestamp::from_nanos(1);
        let t2 = Timestamp::from_nanos(2);
        assert!(t1 < t2);
        assert!(Timestamp::from_nanos(0).is_zero());
    }
}
