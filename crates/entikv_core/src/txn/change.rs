//! Changes: the undo/redo pairs a transaction is made of.

use crate::error::StorageResult;

/// A paired commit/rollback callback registered against an active
/// transaction.
///
/// The recovery unit invokes `commit` in registration order on commit and
/// `rollback` in reverse registration order on rollback; each action runs
/// at most once per transaction. Actions must not call back into the
/// recovery unit they are registered on.
pub trait Change: Send {
    /// Applies or finalizes the change.
    fn commit(&mut self) -> StorageResult<()>;

    /// Undoes the change.
    fn rollback(&mut self) -> StorageResult<()>;
}

type ChangeAction = Box<dyn FnOnce() -> StorageResult<()> + Send>;

/// A [`Change`] built from a pair of closures.
///
/// Either action may be omitted; a missing action is a no-op. This is the
/// everyday change type: callers that mutate a record store or index while
/// a transaction is open register one `SimpleChange` per structural side
/// effect, with the rollback closure performing the inverse operation.
pub struct SimpleChange {
    commit_action: Option<ChangeAction>,
    rollback_action: Option<ChangeAction>,
}

impl SimpleChange {
    /// Creates a change from a commit action and a rollback action.
    pub fn new(
        commit_action: impl FnOnce() -> StorageResult<()> + Send + 'static,
        rollback_action: impl FnOnce() -> StorageResult<()> + Send + 'static,
    ) -> Self {
        Self {
            commit_action: Some(Box::new(commit_action)),
            rollback_action: Some(Box::new(rollback_action)),
        }
    }

    /// Creates a change whose commit is a no-op.
    ///
    /// For mutations applied eagerly: nothing remains to do on commit, and
    /// the rollback action undoes the already-applied effect.
    pub fn on_rollback(rollback_action: impl FnOnce() -> StorageResult<()> + Send + 'static) -> Self {
        Self {
            commit_action: None,
            rollback_action: Some(Box::new(rollback_action)),
        }
    }

    /// Creates a change whose rollback is a no-op.
    pub fn on_commit(commit_action: impl FnOnce() -> StorageResult<()> + Send + 'static) -> Self {
        Self {
            commit_action: Some(Box::new(commit_action)),
            rollback_action: None,
        }
    }
}

impl std::fmt::Debug for SimpleChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleChange")
            .field("has_commit", &self.commit_action.is_some())
            .field("has_rollback", &self.rollback_action.is_some())
            .finish()
    }
}

impl Change for SimpleChange {
    fn commit(&mut self) -> StorageResult<()> {
        match self.commit_action.take() {
            Some(action) => action(),
            None => Ok(()),
        }
    }

    fn rollback(&mut self) -> StorageResult<()> {
        match self.rollback_action.take() {
            Some(action) => action(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn actions_run_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut change = SimpleChange::on_commit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        change.commit().unwrap();
        change.commit().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_actions_are_no_ops() {
        let mut change = SimpleChange::on_rollback(|| Ok(()));
        assert!(change.commit().is_ok());
        assert!(change.rollback().is_ok());
    }

    #[test]
    fn errors_propagate() {
        let mut change = SimpleChange::new(
            || Err(crate::error::StorageError::invalid_argument("boom")),
            || Ok(()),
        );
        assert!(change.commit().is_err());
    }
}
