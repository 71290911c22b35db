//! Recovery units: the per-transaction state machine.

use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::txn::{Change, TransactionState};
use crate::types::Timestamp;

/// Per-transaction controller: state transitions, the ordered change log,
/// and the read/commit timestamps reserved for multi-version concurrency
/// control.
///
/// A recovery unit is reusable: after a commit or rollback, a fresh
/// `begin_transaction` re-enters the machine with a cleared change log.
pub trait RecoveryUnit: Send + Sync {
    /// Opens a transaction.
    ///
    /// Resets the change log, records the read timestamp, and clears any
    /// commit timestamp left by the previous transaction.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if a transaction is already open.
    fn begin_transaction(&self) -> StorageResult<()>;

    /// Commits the open transaction.
    ///
    /// Invokes each registered change's commit action in registration
    /// order. The first failing action aborts the transaction and its
    /// error is returned; earlier actions are not undone. Real durability
    /// would need commit actions to be infallible or a two-phase protocol,
    /// neither of which this in-memory core provides.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] without an open transaction, or
    /// the first commit action's error.
    fn commit(&self) -> StorageResult<()>;

    /// Rolls back the open transaction.
    ///
    /// Invokes each registered change's rollback action in reverse
    /// registration order. Every action runs even if one fails; the unit
    /// transitions to aborted unconditionally and the first error is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] without an open transaction, or
    /// the first rollback action's error.
    fn rollback(&self) -> StorageResult<()>;

    /// Read timestamp recorded at the last begin.
    fn read_timestamp(&self) -> Timestamp;

    /// Pins the commit timestamp of the open transaction. Commit uses the
    /// current time when none was set.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] without an open transaction.
    fn set_commit_timestamp(&self, timestamp: Timestamp) -> StorageResult<()>;

    /// Reserved extension point for moving an overwritten value into a
    /// version history store. A no-op in this core; the method exists so
    /// higher layers are written against a stable contract.
    ///
    /// # Errors
    ///
    /// None in this implementation.
    fn prepare_for_history_store(&self, old_value: &[u8]) -> StorageResult<()>;

    /// Appends a change to the log of the open transaction.
    ///
    /// Registration order is commit order; the reverse is rollback order.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] without an open transaction.
    fn register_change(&self, change: Box<dyn Change>) -> StorageResult<()>;

    /// Returns true while a transaction is open.
    fn is_active(&self) -> bool;

    /// Returns true after a successful commit.
    fn is_committed(&self) -> bool;

    /// Returns true after a rollback or failed commit.
    fn is_aborted(&self) -> bool;
}

struct RecoveryInner {
    state: TransactionState,
    read_timestamp: Timestamp,
    commit_timestamp: Timestamp,
    changes: Vec<Box<dyn Change>>,
}

/// The production [`RecoveryUnit`].
///
/// The whole machine lives behind one mutex; change actions run while it
/// is held, so actions must not call back into the unit.
pub struct EngineRecoveryUnit {
    inner: Mutex<RecoveryInner>,
}

impl Default for EngineRecoveryUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRecoveryUnit {
    /// Creates an inactive unit with an empty change log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RecoveryInner {
                state: TransactionState::Inactive,
                read_timestamp: Timestamp::default(),
                commit_timestamp: Timestamp::default(),
                changes: Vec::new(),
            }),
        }
    }

    /// Current state, for diagnostics and tests.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }
}

impl std::fmt::Debug for EngineRecoveryUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EngineRecoveryUnit")
            .field("state", &inner.state)
            .field("changes", &inner.changes.len())
            .finish()
    }
}

impl RecoveryUnit for EngineRecoveryUnit {
    fn begin_transaction(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            return Err(StorageError::transaction_state(
                "transaction is already active",
            ));
        }

        inner.state = TransactionState::Active;
        inner.read_timestamp = Timestamp::now();
        inner.commit_timestamp = Timestamp::default();
        inner.changes.clear();
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return Err(StorageError::transaction_state(
                "no active transaction to commit",
            ));
        }

        if inner.commit_timestamp.is_zero() {
            inner.commit_timestamp = Timestamp::now();
        }

        let mut changes = std::mem::take(&mut inner.changes);
        for change in &mut changes {
            if let Err(error) = change.commit() {
                // Earlier commit actions stay applied; the caller must
                // treat this as a non-atomic partial failure.
                inner.state = TransactionState::Aborted;
                return Err(error);
            }
        }

        inner.state = TransactionState::Committed;
        Ok(())
    }

    fn rollback(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return Err(StorageError::transaction_state(
                "no active transaction to roll back",
            ));
        }

        let mut changes = std::mem::take(&mut inner.changes);
        let mut first_error = None;
        for change in changes.iter_mut().rev() {
            if let Err(error) = change.rollback() {
                first_error.get_or_insert(error);
            }
        }

        inner.state = TransactionState::Aborted;
        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    fn read_timestamp(&self) -> Timestamp {
        self.inner.lock().read_timestamp
    }

    fn set_commit_timestamp(&self, timestamp: Timestamp) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return Err(StorageError::transaction_state(
                "commit timestamp requires an active transaction",
            ));
        }
        inner.commit_timestamp = timestamp;
        Ok(())
    }

    fn prepare_for_history_store(&self, _old_value: &[u8]) -> StorageResult<()> {
        Ok(())
    }

    fn register_change(&self, change: Box<dyn Change>) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return Err(StorageError::transaction_state(
                "changes require an active transaction",
            ));
        }
        inner.changes.push(change);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.inner.lock().state.is_active()
    }

    fn is_committed(&self) -> bool {
        self.inner.lock().state.is_committed()
    }

    fn is_aborted(&self) -> bool {
        self.inner.lock().state.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::SimpleChange;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Change that appends its label to a shared trace on either action.
    fn tracing_change(trace: &Arc<StdMutex<Vec<String>>>, label: &str) -> Box<dyn Change> {
        let commit_trace = Arc::clone(trace);
        let rollback_trace = Arc::clone(trace);
        let commit_label = format!("commit:{label}");
        let rollback_label = format!("rollback:{label}");
        Box::new(SimpleChange::new(
            move || {
                commit_trace.lock().unwrap().push(commit_label);
                Ok(())
            },
            move || {
                rollback_trace.lock().unwrap().push(rollback_label);
                Ok(())
            },
        ))
    }

    #[test]
    fn fresh_unit_is_inactive() {
        let unit = EngineRecoveryUnit::new();
        assert!(!unit.is_active());
        assert!(!unit.is_committed());
        assert!(!unit.is_aborted());
    }

    #[test]
    fn begin_while_active_fails_and_state_unchanged() {
        let unit = EngineRecoveryUnit::new();
        unit.begin_transaction().unwrap();

        let result = unit.begin_transaction();
        assert!(matches!(result, Err(StorageError::TransactionState { .. })));
        assert!(unit.is_active());
    }

    #[test]
    fn commit_runs_changes_in_registration_order() {
        let unit = EngineRecoveryUnit::new();
        let trace = Arc::new(StdMutex::new(Vec::new()));

        unit.begin_transaction().unwrap();
        for label in ["c1", "c2", "c3"] {
            unit.register_change(tracing_change(&trace, label)).unwrap();
        }
        unit.commit().unwrap();

        assert!(unit.is_committed());
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["commit:c1", "commit:c2", "commit:c3"]
        );
    }

    #[test]
    fn rollback_runs_changes_in_reverse_order() {
        let unit = EngineRecoveryUnit::new();
        let trace = Arc::new(StdMutex::new(Vec::new()));

        unit.begin_transaction().unwrap();
        for label in ["c1", "c2", "c3"] {
            unit.register_change(tracing_change(&trace, label)).unwrap();
        }
        unit.rollback().unwrap();

        assert!(unit.is_aborted());
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["rollback:c3", "rollback:c2", "rollback:c1"]
        );
    }

    #[test]
    fn commit_without_transaction_fails() {
        let unit = EngineRecoveryUnit::new();
        assert!(matches!(
            unit.commit(),
            Err(StorageError::TransactionState { .. })
        ));
        assert!(matches!(
            unit.rollback(),
            Err(StorageError::TransactionState { .. })
        ));
    }

    #[test]
    fn failing_commit_action_aborts_and_stops() {
        let unit = EngineRecoveryUnit::new();
        let applied = Arc::new(AtomicUsize::new(0));

        unit.begin_transaction().unwrap();
        let counter = Arc::clone(&applied);
        unit.register_change(Box::new(SimpleChange::on_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })))
        .unwrap();
        unit.register_change(Box::new(SimpleChange::on_commit(|| {
            Err(StorageError::invalid_argument("commit failure"))
        })))
        .unwrap();
        let counter = Arc::clone(&applied);
        unit.register_change(Box::new(SimpleChange::on_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })))
        .unwrap();

        assert!(unit.commit().is_err());
        assert!(unit.is_aborted());
        // The first action stays applied, the third never runs.
        assert_eq!(applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_rollback_action_still_aborts_and_runs_the_rest() {
        let unit = EngineRecoveryUnit::new();
        let undone = Arc::new(AtomicUsize::new(0));

        unit.begin_transaction().unwrap();
        let counter = Arc::clone(&undone);
        unit.register_change(Box::new(SimpleChange::on_rollback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })))
        .unwrap();
        unit.register_change(Box::new(SimpleChange::on_rollback(|| {
            Err(StorageError::invalid_argument("rollback failure"))
        })))
        .unwrap();

        assert!(unit.rollback().is_err());
        assert!(unit.is_aborted());
        assert_eq!(undone.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unit_is_reusable_after_terminal_states() {
        let unit = EngineRecoveryUnit::new();

        unit.begin_transaction().unwrap();
        unit.commit().unwrap();
        assert!(unit.is_committed());

        unit.begin_transaction().unwrap();
        unit.rollback().unwrap();
        assert!(unit.is_aborted());

        unit.begin_transaction().unwrap();
        assert!(unit.is_active());
    }

    #[test]
    fn register_change_requires_active_transaction() {
        let unit = EngineRecoveryUnit::new();
        let result = unit.register_change(Box::new(SimpleChange::on_commit(|| Ok(()))));
        assert!(matches!(result, Err(StorageError::TransactionState { .. })));
    }

    #[test]
    fn begin_resets_timestamps_and_change_log() {
        let unit = EngineRecoveryUnit::new();

        unit.begin_transaction().unwrap();
        unit.set_commit_timestamp(Timestamp::from_nanos(42)).unwrap();
        unit.rollback().unwrap();

        unit.begin_transaction().unwrap();
        assert!(!unit.read_timestamp().is_zero());
        // A stale pinned timestamp never leaks into the next transaction.
        unit.commit().unwrap();
        assert!(unit.is_committed());
    }

    #[test]
    fn set_commit_timestamp_requires_active_transaction() {
        let unit = EngineRecoveryUnit::new();
        assert!(matches!(
            unit.set_commit_timestamp(Timestamp::from_nanos(1)),
            Err(StorageError::TransactionState { .. })
        ));
    }

    #[test]
    fn history_store_hook_is_a_no_op() {
        let unit = EngineRecoveryUnit::new();
        assert!(unit.prepare_for_history_store(b"old value").is_ok());
    }
}
