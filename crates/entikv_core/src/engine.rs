//! The key-value engine: namespace registries and the session pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{StorageError, StorageResult};
use crate::index::{BTreeIndex, SortedData};
use crate::record::{BTreeRecordStore, RecordStore};
use crate::session::{EngineSession, Session};
use crate::stats::EngineStats;
use crate::types::SessionId;

/// The storage engine: owns the namespace-to-record-store and index
/// registries, the bounded session pool, and aggregate statistics.
///
/// One production implementation exists ([`BTreeEngine`]); the trait keeps
/// the engine substitutable behind a stable contract.
///
/// Namespaces are `"{database}.{collection}"` strings; index registry keys
/// are `"{namespace}.{indexName}"`.
pub trait KvEngine: Send + Sync {
    /// Starts the engine.
    ///
    /// # Errors
    ///
    /// [`StorageError::AlreadyExists`] if already running.
    fn start(&self) -> StorageResult<()>;

    /// Stops the engine, force-ending every open session (which rolls back
    /// any open transaction) and clearing the session registry. Idempotent.
    ///
    /// # Errors
    ///
    /// None; per-session end failures are logged, not propagated.
    fn stop(&self) -> StorageResult<()>;

    /// Returns true while the engine is started.
    fn is_running(&self) -> bool;

    /// Allocates, begins, and registers a new session.
    ///
    /// # Errors
    ///
    /// [`StorageError::EngineNotRunning`] if stopped,
    /// [`StorageError::SessionLimitExceeded`] if the pool is full.
    fn create_session(&self) -> StorageResult<Arc<dyn Session>>;

    /// Looks up a registered record store.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown namespace.
    fn record_store(&self, namespace: &str) -> StorageResult<Arc<dyn RecordStore>>;

    /// Creates and registers a record store for a namespace.
    ///
    /// # Errors
    ///
    /// [`StorageError::EngineNotRunning`] if stopped,
    /// [`StorageError::AlreadyExists`] if the namespace is registered.
    fn create_record_store(&self, namespace: &str) -> StorageResult<Arc<dyn RecordStore>>;

    /// Unregisters a record store together with every index registered
    /// under its namespace.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown namespace.
    fn drop_record_store(&self, namespace: &str) -> StorageResult<()>;

    /// Looks up a registered index.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown namespace/index pair.
    fn sorted_data(&self, namespace: &str, index_name: &str) -> StorageResult<Arc<dyn SortedData>>;

    /// Creates and registers an index under a namespace.
    ///
    /// # Errors
    ///
    /// [`StorageError::EngineNotRunning`] if stopped,
    /// [`StorageError::AlreadyExists`] if the pair is registered.
    fn create_sorted_data(
        &self,
        namespace: &str,
        index_name: &str,
        unique: bool,
    ) -> StorageResult<Arc<dyn SortedData>>;

    /// Unregisters an index.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown namespace/index pair.
    fn drop_sorted_data(&self, namespace: &str, index_name: &str) -> StorageResult<()>;

    /// Point-in-time snapshot of the engine's counters.
    fn stats(&self) -> EngineStats;
}

/// Registry key for an index: `"{namespace}.{indexName}"`.
fn index_key(namespace: &str, index_name: &str) -> String {
    format!("{namespace}.{index_name}")
}

#[derive(Default)]
struct EngineInner {
    running: bool,
    record_stores: HashMap<String, Arc<BTreeRecordStore>>,
    indexes: HashMap<String, Arc<BTreeIndex>>,
    sessions: HashMap<SessionId, Arc<EngineSession>>,
}

/// The production [`KvEngine`], everything in memory.
///
/// All registries live behind one reader-writer lock; the individual
/// stores and indexes carry their own locks. Registry operations never
/// re-enter the registry lock from inside a store or index call, which
/// keeps the lock order acyclic.
pub struct BTreeEngine {
    config: EngineConfig,
    inner: RwLock<EngineInner>,
    /// Monotonic count of sessions ever created; survives session ends.
    sessions_created: AtomicU64,
    /// Handed to sessions as their non-owning back-reference.
    self_ref: Weak<BTreeEngine>,
}

impl BTreeEngine {
    /// Creates a stopped engine with the given configuration.
    ///
    /// Zero-valued config fields are normalized to their defaults.
    #[must_use]
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config: config.normalized(),
            inner: RwLock::new(EngineInner::default()),
            sessions_created: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    /// The engine's normalized configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for BTreeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("BTreeEngine")
            .field("running", &inner.running)
            .field("record_stores", &inner.record_stores.len())
            .field("indexes", &inner.indexes.len())
            .field("sessions", &inner.sessions.len())
            .finish()
    }
}

impl KvEngine for BTreeEngine {
    fn start(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.running {
            return Err(StorageError::already_exists("running engine"));
        }
        inner.running = true;
        info!("storage engine started");
        Ok(())
    }

    fn stop(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if !inner.running {
            return Ok(());
        }

        for session in inner.sessions.values() {
            if let Err(error) = session.end() {
                warn!(
                    session_id = %session.session_id(),
                    %error,
                    "force-ending session failed during engine stop"
                );
            }
        }
        inner.sessions.clear();

        inner.running = false;
        info!("storage engine stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.inner.read().running
    }

    fn create_session(&self) -> StorageResult<Arc<dyn Session>> {
        let mut inner = self.inner.write();
        if !inner.running {
            return Err(StorageError::EngineNotRunning);
        }
        // Ended sessions stay registered until stop, so they count against
        // the limit.
        if inner.sessions.len() >= self.config.max_sessions {
            return Err(StorageError::session_limit_exceeded(
                self.config.max_sessions,
            ));
        }

        let engine: Weak<dyn KvEngine> = self.self_ref.clone();
        let session = Arc::new(EngineSession::new(engine));
        session.begin()?;

        debug!(session_id = %session.session_id(), "session created");
        inner.sessions.insert(session.session_id(), Arc::clone(&session));
        self.sessions_created.fetch_add(1, Ordering::Relaxed);

        Ok(session)
    }

    fn record_store(&self, namespace: &str) -> StorageResult<Arc<dyn RecordStore>> {
        let inner = self.inner.read();
        inner
            .record_stores
            .get(namespace)
            .map(|store| Arc::clone(store) as Arc<dyn RecordStore>)
            .ok_or_else(|| StorageError::not_found(format!("record store {namespace}")))
    }

    fn create_record_store(&self, namespace: &str) -> StorageResult<Arc<dyn RecordStore>> {
        let mut inner = self.inner.write();
        if !inner.running {
            return Err(StorageError::EngineNotRunning);
        }
        if inner.record_stores.contains_key(namespace) {
            return Err(StorageError::already_exists(format!(
                "record store {namespace}"
            )));
        }

        let store = Arc::new(BTreeRecordStore::new(namespace));
        inner.record_stores.insert(namespace.to_string(), Arc::clone(&store));
        debug!(%namespace, "record store created");
        Ok(store)
    }

    fn drop_record_store(&self, namespace: &str) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if inner.record_stores.remove(namespace).is_none() {
            return Err(StorageError::not_found(format!("record store {namespace}")));
        }

        // Cascade over the namespace's indexes. The dot-qualified prefix
        // keeps sibling namespaces that merely share a string prefix out.
        let prefix = format!("{namespace}.");
        inner.indexes.retain(|key, _| !key.starts_with(&prefix));

        debug!(%namespace, "record store dropped");
        Ok(())
    }

    fn sorted_data(&self, namespace: &str, index_name: &str) -> StorageResult<Arc<dyn SortedData>> {
        let key = index_key(namespace, index_name);
        let inner = self.inner.read();
        inner
            .indexes
            .get(&key)
            .map(|index| Arc::clone(index) as Arc<dyn SortedData>)
            .ok_or_else(|| StorageError::not_found(format!("index {key}")))
    }

    fn create_sorted_data(
        &self,
        namespace: &str,
        index_name: &str,
        unique: bool,
    ) -> StorageResult<Arc<dyn SortedData>> {
        let key = index_key(namespace, index_name);
        let mut inner = self.inner.write();
        if !inner.running {
            return Err(StorageError::EngineNotRunning);
        }
        if inner.indexes.contains_key(&key) {
            return Err(StorageError::already_exists(format!("index {key}")));
        }

        let index = Arc::new(BTreeIndex::new(index_name, unique));
        inner.indexes.insert(key.clone(), Arc::clone(&index));
        debug!(index = %key, unique, "index created");
        Ok(index)
    }

    fn drop_sorted_data(&self, namespace: &str, index_name: &str) -> StorageResult<()> {
        let key = index_key(namespace, index_name);
        let mut inner = self.inner.write();
        if inner.indexes.remove(&key).is_none() {
            return Err(StorageError::not_found(format!("index {key}")));
        }
        debug!(index = %key, "index dropped");
        Ok(())
    }

    fn stats(&self) -> EngineStats {
        let inner = self.inner.read();

        let mut total_records = 0;
        let mut total_data_size = 0;
        for store in inner.record_stores.values() {
            total_records += store.num_records();
            total_data_size += store.data_size();
        }

        let mut total_index_entries = 0;
        for index in inner.indexes.values() {
            total_index_entries += index.num_entries();
        }

        EngineStats {
            running: inner.running,
            record_stores: inner.record_stores.len(),
            indexes: inner.indexes.len(),
            sessions: inner.sessions.len(),
            total_sessions_created: self.sessions_created.load(Ordering::Relaxed),
            cache_size: self.config.cache_size,
            max_sessions: self.config.max_sessions,
            total_records,
            total_data_size,
            total_index_entries,
        }
    }
}
