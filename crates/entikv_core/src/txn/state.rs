//! Transaction states.

use std::fmt;

/// State of a transaction as driven by its recovery unit.
///
/// Legal transitions: `Inactive -> Active` via begin, `Active -> Committed`
/// via commit, `Active -> Aborted` via rollback (or a failed commit). A
/// fresh begin re-enters the machine from `Committed` or `Aborted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction has been begun yet.
    #[default]
    Inactive,
    /// A transaction is open and may register changes.
    Active,
    /// The last transaction committed.
    Committed,
    /// The last transaction rolled back or failed to commit.
    Aborted,
}

impl TransactionState {
    /// Returns true while a transaction is open.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true after a successful commit.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Returns true after a rollback or failed commit.
    #[must_use]
    pub const fn is_aborted(self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns true if a new transaction may be begun from this state.
    #[must_use]
    pub const fn can_begin(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_inactive() {
        assert_eq!(TransactionState::default(), TransactionState::Inactive);
    }

    #[test]
    fn predicates_are_exclusive() {
        let states = [
            TransactionState::Inactive,
            TransactionState::Active,
            TransactionState::Committed,
            TransactionState::Aborted,
        ];
        for state in states {
            let set = [state.is_active(), state.is_committed(), state.is_aborted()];
            assert!(set.iter().filter(|&&b| b).count() <= 1, "{state} overlaps");
        }
    }

    #[test]
    fn begin_allowed_from_every_terminal_state() {
        assert!(TransactionState::Inactive.can_begin());
        assert!(TransactionState::Committed.can_begin());
        assert!(TransactionState::Aborted.can_begin());
        assert!(!TransactionState::Active.can_begin());
    }
}
