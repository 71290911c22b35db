//! Engine sessions: one caller, one recovery unit.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::engine::KvEngine;
use crate::error::{StorageError, StorageResult};
use crate::txn::{EngineRecoveryUnit, RecoveryUnit};
use crate::types::{SessionId, Timestamp};

/// A caller's handle into the engine: binds exactly one recovery unit and
/// enforces the session-level sequencing rules on top of it.
///
/// Sessions are created and begun by
/// [`KvEngine::create_session`](crate::engine::KvEngine::create_session)
/// and force-roll-back any open transaction when ended.
pub trait Session: Send + Sync + std::fmt::Debug {
    /// The immutable identifier assigned at creation.
    fn session_id(&self) -> SessionId;

    /// When the session was created.
    fn created_at(&self) -> Timestamp;

    /// Activates the session.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if the session is already active.
    fn begin(&self) -> StorageResult<()>;

    /// Deactivates the session, force-rolling-back any open transaction
    /// first.
    ///
    /// The session becomes inactive even when the forced rollback fails;
    /// the rollback error is still propagated.
    ///
    /// # Errors
    ///
    /// The forced rollback's error, if any.
    fn end(&self) -> StorageResult<()>;

    /// The session's recovery unit, for registering changes and reading
    /// transaction state.
    fn recovery_unit(&self) -> &dyn RecoveryUnit;

    /// Opens a transaction on the session's recovery unit.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if the session is inactive or a
    /// transaction is already open.
    fn begin_transaction(&self) -> StorageResult<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if the session is inactive or no
    /// transaction is open, or the recovery unit's commit error.
    fn commit_transaction(&self) -> StorageResult<()>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// [`StorageError::TransactionState`] if the session is inactive or no
    /// transaction is open, or the recovery unit's rollback error.
    fn rollback_transaction(&self) -> StorageResult<()>;

    /// Returns true while the session is active.
    fn is_active(&self) -> bool;

    /// Returns true while a transaction is open on this session.
    fn in_transaction(&self) -> bool;
}

#[derive(Debug, Default)]
struct SessionFlags {
    active: bool,
    in_transaction: bool,
}

/// The production [`Session`].
pub struct EngineSession {
    session_id: SessionId,
    created_at: Timestamp,
    recovery_unit: EngineRecoveryUnit,
    flags: Mutex<SessionFlags>,
    /// Non-owning back-reference; the engine owns the session registry, so
    /// an owning handle here would cycle.
    engine: Weak<dyn KvEngine>,
}

impl EngineSession {
    /// Creates an inactive session bound to the given engine.
    #[must_use]
    pub fn new(engine: Weak<dyn KvEngine>) -> Self {
        Self {
            session_id: SessionId::generate(),
            created_at: Timestamp::now(),
            recovery_unit: EngineRecoveryUnit::new(),
            flags: Mutex::new(SessionFlags::default()),
            engine,
        }
    }

    /// The owning engine, if it is still alive.
    #[must_use]
    pub fn engine(&self) -> Option<Arc<dyn KvEngine>> {
        self.engine.upgrade()
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = self.flags.lock();
        f.debug_struct("EngineSession")
            .field("session_id", &self.session_id)
            .field("active", &flags.active)
            .field("in_transaction", &flags.in_transaction)
            .finish()
    }
}

impl Session for EngineSession {
    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn begin(&self) -> StorageResult<()> {
        let mut flags = self.flags.lock();
        if flags.active {
            return Err(StorageError::transaction_state(format!(
                "session {} is already active",
                self.session_id
            )));
        }
        flags.active = true;
        Ok(())
    }

    fn end(&self) -> StorageResult<()> {
        let mut flags = self.flags.lock();
        if !flags.active {
            return Ok(());
        }

        let mut result = Ok(());
        if flags.in_transaction {
            result = self.recovery_unit.rollback();
            flags.in_transaction = false;
        }
        flags.active = false;
        result
    }

    fn recovery_unit(&self) -> &dyn RecoveryUnit {
        &self.recovery_unit
    }

    fn begin_transaction(&self) -> StorageResult<()> {
        let mut flags = self.flags.lock();
        if !flags.active {
            return Err(StorageError::transaction_state(format!(
                "session {} is not active",
                self.session_id
            )));
        }
        if flags.in_transaction {
            return Err(StorageError::transaction_state(format!(
                "session {} is already in a transaction",
                self.session_id
            )));
        }

        self.recovery_unit.begin_transaction()?;
        flags.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        let mut flags = self.flags.lock();
        if !flags.active {
            return Err(StorageError::transaction_state(format!(
                "session {} is not active",
                self.session_id
            )));
        }
        if !flags.in_transaction {
            return Err(StorageError::transaction_state(format!(
                "session {} has no open transaction",
                self.session_id
            )));
        }

        // The unit reaches a terminal state whether or not commit
        // succeeds, so the flag clears on both paths.
        let result = self.recovery_unit.commit();
        flags.in_transaction = false;
        result
    }

    fn rollback_transaction(&self) -> StorageResult<()> {
        let mut flags = self.flags.lock();
        if !flags.active {
            return Err(StorageError::transaction_state(format!(
                "session {} is not active",
                self.session_id
            )));
        }
        if !flags.in_transaction {
            return Err(StorageError::transaction_state(format!(
                "session {} has no open transaction",
                self.session_id
            )));
        }

        let result = self.recovery_unit.rollback();
        flags.in_transaction = false;
        result
    }

    fn is_active(&self) -> bool {
        self.flags.lock().active
    }

    fn in_transaction(&self) -> bool {
        self.flags.lock().in_transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::SimpleChange;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn unbound_session() -> EngineSession {
        // A session whose engine has gone away; lifecycle rules are
        // independent of the back-reference.
        EngineSession::new(Weak::<crate::engine::BTreeEngine>::new())
    }

    #[test]
    fn begin_twice_fails() {
        let session = unbound_session();
        session.begin().unwrap();
        assert!(matches!(
            session.begin(),
            Err(StorageError::TransactionState { .. })
        ));
        assert!(session.is_active());
    }

    #[test]
    fn transaction_requires_active_session() {
        let session = unbound_session();
        assert!(matches!(
            session.begin_transaction(),
            Err(StorageError::TransactionState { .. })
        ));
    }

    #[test]
    fn transaction_round_trip() {
        let session = unbound_session();
        session.begin().unwrap();

        session.begin_transaction().unwrap();
        assert!(session.in_transaction());
        assert!(session.recovery_unit().is_active());

        session.commit_transaction().unwrap();
        assert!(!session.in_transaction());
        assert!(session.recovery_unit().is_committed());
    }

    #[test]
    fn begin_transaction_twice_fails() {
        let session = unbound_session();
        session.begin().unwrap();
        session.begin_transaction().unwrap();

        assert!(matches!(
            session.begin_transaction(),
            Err(StorageError::TransactionState { .. })
        ));
        assert!(session.in_transaction());
    }

    #[test]
    fn commit_without_transaction_fails() {
        let session = unbound_session();
        session.begin().unwrap();

        assert!(matches!(
            session.commit_transaction(),
            Err(StorageError::TransactionState { .. })
        ));
        assert!(matches!(
            session.rollback_transaction(),
            Err(StorageError::TransactionState { .. })
        ));
    }

    #[test]
    fn end_force_rolls_back_open_transaction() {
        let session = unbound_session();
        session.begin().unwrap();
        session.begin_transaction().unwrap();

        let rolled_back = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&rolled_back);
        session
            .recovery_unit()
            .register_change(Box::new(SimpleChange::on_rollback(move || {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })))
            .unwrap();

        session.end().unwrap();

        assert!(!session.is_active());
        assert!(!session.in_transaction());
        assert!(rolled_back.load(Ordering::SeqCst));
        assert!(session.recovery_unit().is_aborted());
    }

    #[test]
    fn end_goes_inactive_even_when_rollback_fails() {
        let session = unbound_session();
        session.begin().unwrap();
        session.begin_transaction().unwrap();
        session
            .recovery_unit()
            .register_change(Box::new(SimpleChange::on_rollback(|| {
                Err(StorageError::invalid_argument("rollback failure"))
            })))
            .unwrap();

        assert!(session.end().is_err());
        assert!(!session.is_active());
        assert!(!session.in_transaction());
    }

    #[test]
    fn end_is_idempotent() {
        let session = unbound_session();
        session.begin().unwrap();
        session.end().unwrap();
        assert!(session.end().is_ok());
    }

    #[test]
    fn session_ids_are_stable_and_unique() {
        let a = unbound_session();
        let b = unbound_session();
        assert_ne!(a.session_id(), b.session_id());
        assert_eq!(a.session_id(), a.session_id());
    }
}
