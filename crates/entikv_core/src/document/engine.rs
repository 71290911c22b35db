//! The document engine facade.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use ciborium::value::Value;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::document::{Document, IndexSpec, ID_FIELD, ID_INDEX_NAME};
use crate::engine::{BTreeEngine, KvEngine};
use crate::error::{StorageError, StorageResult};
use crate::record::RecordId;
use crate::session::Session;
use crate::stats::DocumentEngineStats;
use crate::txn::{RecoveryUnit as _, SimpleChange};

/// Per-collection catalog entry.
#[derive(Debug, Clone)]
struct CollectionInfo {
    namespace: String,
    indexes: HashMap<String, IndexSpec>,
}

#[derive(Debug, Default)]
struct Catalog {
    running: bool,
    /// database name -> collection name -> info
    databases: HashMap<String, HashMap<String, CollectionInfo>>,
}

/// Document-oriented facade over a [`BTreeEngine`].
///
/// Owns the database/collection catalog and a monotonic record-id counter;
/// documents are CBOR-encoded into the namespace's record store, and every
/// collection carries a unique `_id_` index. Index maintenance keys every
/// entry on the document id — a documented simplification; per-field key
/// extraction belongs to a query layer this engine does not have.
///
/// Mutating operations accept an optional [`Session`]. With a session whose
/// transaction is open, each structural side effect registers one change
/// whose rollback action undoes it, so the transaction's mutations roll
/// back as a unit in reverse order. Without a session, mutations apply
/// immediately and are final.
pub struct DocumentEngine {
    kv: Arc<BTreeEngine>,
    catalog: RwLock<Catalog>,
    next_record_id: AtomicI64,
}

impl DocumentEngine {
    /// Creates a stopped document engine over a fresh key-value engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            kv: BTreeEngine::new(config),
            catalog: RwLock::new(Catalog::default()),
            next_record_id: AtomicI64::new(0),
        }
    }

    /// The underlying key-value engine, for sessions and direct access.
    #[must_use]
    pub fn kv_engine(&self) -> &Arc<BTreeEngine> {
        &self.kv
    }

    /// Starts the engine.
    ///
    /// # Errors
    ///
    /// [`StorageError::AlreadyExists`] if already running.
    pub fn start(&self) -> StorageResult<()> {
        let mut catalog = self.catalog.write();
        if catalog.running {
            return Err(StorageError::already_exists("running document engine"));
        }
        self.kv.start()?;
        catalog.running = true;
        Ok(())
    }

    /// Stops the engine and the key-value engine under it. Idempotent.
    ///
    /// # Errors
    ///
    /// Any error from stopping the key-value engine.
    pub fn stop(&self) -> StorageResult<()> {
        let mut catalog = self.catalog.write();
        if !catalog.running {
            return Ok(());
        }
        self.kv.stop()?;
        catalog.running = false;
        Ok(())
    }

    /// Alias for [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// See [`stop`](Self::stop).
    pub fn close(&self) -> StorageResult<()> {
        self.stop()
    }

    /// Registers a database.
    ///
    /// # Errors
    ///
    /// [`StorageError::EngineNotRunning`] if stopped,
    /// [`StorageError::AlreadyExists`] for a duplicate name.
    pub fn create_database(&self, name: &str) -> StorageResult<()> {
        let mut catalog = self.catalog.write();
        if !catalog.running {
            return Err(StorageError::EngineNotRunning);
        }
        if catalog.databases.contains_key(name) {
            return Err(StorageError::already_exists(format!("database {name}")));
        }
        catalog.databases.insert(name.to_string(), HashMap::new());
        debug!(database = name, "database created");
        Ok(())
    }

    /// Unregisters a database, dropping every collection in it.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown name.
    pub fn drop_database(&self, name: &str) -> StorageResult<()> {
        let mut catalog = self.catalog.write();
        let Some(collections) = catalog.databases.remove(name) else {
            return Err(StorageError::not_found(format!("database {name}")));
        };
        for info in collections.values() {
            // Dropping the record store cascades its indexes.
            self.kv.drop_record_store(&info.namespace)?;
        }
        debug!(database = name, "database dropped");
        Ok(())
    }

    /// Lists databases in name order.
    #[must_use]
    pub fn list_databases(&self) -> Vec<String> {
        let catalog = self.catalog.read();
        let mut names: Vec<_> = catalog.databases.keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates a collection: its record store and its unique `_id_` index.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown database,
    /// [`StorageError::AlreadyExists`] for a duplicate collection.
    pub fn create_collection(&self, database: &str, collection: &str) -> StorageResult<()> {
        let mut catalog = self.catalog.write();
        let Some(collections) = catalog.databases.get_mut(database) else {
            return Err(StorageError::not_found(format!("database {database}")));
        };
        if collections.contains_key(collection) {
            return Err(StorageError::already_exists(format!(
                "collection {database}.{collection}"
            )));
        }

        let namespace = make_namespace(database, collection);
        self.kv.create_record_store(&namespace)?;
        self.kv.create_sorted_data(&namespace, ID_INDEX_NAME, true)?;

        let id_spec = IndexSpec::new(ID_INDEX_NAME).key(ID_FIELD, 1).unique();
        let mut indexes = HashMap::new();
        indexes.insert(id_spec.name.clone(), id_spec);
        collections.insert(
            collection.to_string(),
            CollectionInfo { namespace, indexes },
        );
        Ok(())
    }

    /// Drops a collection, its record store, and all its indexes.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown database or collection.
    pub fn drop_collection(&self, database: &str, collection: &str) -> StorageResult<()> {
        let mut catalog = self.catalog.write();
        let Some(collections) = catalog.databases.get_mut(database) else {
            return Err(StorageError::not_found(format!("database {database}")));
        };
        let Some(info) = collections.remove(collection) else {
            return Err(StorageError::not_found(format!(
                "collection {database}.{collection}"
            )));
        };
        self.kv.drop_record_store(&info.namespace)
    }

    /// Lists a database's collections in name order.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown database.
    pub fn list_collections(&self, database: &str) -> StorageResult<Vec<String>> {
        let catalog = self.catalog.read();
        let Some(collections) = catalog.databases.get(database) else {
            return Err(StorageError::not_found(format!("database {database}")));
        };
        let mut names: Vec<_> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Inserts documents into a collection.
    ///
    /// Each document gets the next integer record id; a missing `_id`
    /// field is materialized as the record id's display string. The record
    /// insert and one index entry per registered index each register an
    /// undo change on `session`'s open transaction when one is supplied.
    ///
    /// # Errors
    ///
    /// Catalog lookups, encoding, record store, and index errors.
    pub fn insert(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
        session: Option<&dyn Session>,
    ) -> StorageResult<()> {
        let (namespace, index_names) = self.collection_info(database, collection)?;
        let store = self.kv.record_store(&namespace)?;

        for mut document in documents {
            let record_id =
                RecordId::from_long(self.next_record_id.fetch_add(1, Ordering::SeqCst) + 1);
            if !document.contains(ID_FIELD) {
                document.set(ID_FIELD, Value::Text(record_id.to_string()));
            }

            let data = document.to_bytes()?;
            store.insert_record(&record_id, &data)?;
            if let Some(session) = session {
                let undo_store = Arc::clone(&store);
                let undo_id = record_id.clone();
                session
                    .recovery_unit()
                    .register_change(Box::new(SimpleChange::on_rollback(move || {
                        undo_store.delete_record(&undo_id)
                    })))?;
            }

            let id_key = document_id_key(&document)?;
            for index_name in &index_names {
                let index = self.kv.sorted_data(&namespace, index_name)?;
                index.insert(&id_key, &record_id)?;
                if let Some(session) = session {
                    let undo_index = Arc::clone(&index);
                    let undo_key = id_key.clone();
                    let undo_id = record_id.clone();
                    session
                        .recovery_unit()
                        .register_change(Box::new(SimpleChange::on_rollback(move || {
                            undo_index.remove(&undo_key, &undo_id)
                        })))?;
                }
            }
        }
        Ok(())
    }

    /// Returns the documents matching `filter`, by full collection scan.
    ///
    /// The empty filter matches everything. Index selection is a query
    /// planner's job and out of scope here.
    ///
    /// # Errors
    ///
    /// Catalog lookup and scan errors.
    pub fn find(
        &self,
        database: &str,
        collection: &str,
        filter: &Document,
    ) -> StorageResult<Vec<Document>> {
        Ok(self
            .matching_records(database, collection, filter)?
            .into_iter()
            .map(|(_, document)| document)
            .collect())
    }

    /// Merges `update`'s fields over every document matching `filter`
    /// (never replacing `_id`) and returns the matched count.
    ///
    /// # Errors
    ///
    /// Catalog lookup, encoding, and record store errors.
    pub fn update(
        &self,
        database: &str,
        collection: &str,
        filter: &Document,
        update: &Document,
        session: Option<&dyn Session>,
    ) -> StorageResult<usize> {
        let (namespace, _) = self.collection_info(database, collection)?;
        let store = self.kv.record_store(&namespace)?;

        let matches = self.matching_records(database, collection, filter)?;
        let matched = matches.len();
        for (record_id, mut document) in matches {
            let old_data = document.to_bytes()?;
            document.apply_update(update);
            let new_data = document.to_bytes()?;

            store.update_record(&record_id, &new_data)?;
            if let Some(session) = session {
                let undo_store = Arc::clone(&store);
                let undo_id = record_id.clone();
                session
                    .recovery_unit()
                    .register_change(Box::new(SimpleChange::on_rollback(move || {
                        undo_store.update_record(&undo_id, &old_data)
                    })))?;
            }
        }
        Ok(matched)
    }

    /// Deletes every document matching `filter`, index entries first, and
    /// returns the deleted count.
    ///
    /// # Errors
    ///
    /// Catalog lookup, record store, and index errors.
    pub fn delete(
        &self,
        database: &str,
        collection: &str,
        filter: &Document,
        session: Option<&dyn Session>,
    ) -> StorageResult<usize> {
        let (namespace, index_names) = self.collection_info(database, collection)?;
        let store = self.kv.record_store(&namespace)?;

        let matches = self.matching_records(database, collection, filter)?;
        let deleted = matches.len();
        for (record_id, document) in matches {
            let id_key = document_id_key(&document)?;

            for index_name in &index_names {
                let index = self.kv.sorted_data(&namespace, index_name)?;
                index.remove(&id_key, &record_id)?;
                if let Some(session) = session {
                    let undo_index = Arc::clone(&index);
                    let undo_key = id_key.clone();
                    let undo_id = record_id.clone();
                    session
                        .recovery_unit()
                        .register_change(Box::new(SimpleChange::on_rollback(move || {
                            undo_index.insert(&undo_key, &undo_id)
                        })))?;
                }
            }

            let data = document.to_bytes()?;
            store.delete_record(&record_id)?;
            if let Some(session) = session {
                let undo_store = Arc::clone(&store);
                let undo_id = record_id.clone();
                session
                    .recovery_unit()
                    .register_change(Box::new(SimpleChange::on_rollback(move || {
                        undo_store.insert_record(&undo_id, &data)
                    })))?;
            }
        }
        Ok(deleted)
    }

    /// Creates a secondary index and backfills it from existing records.
    ///
    /// # Errors
    ///
    /// Catalog lookup errors, [`StorageError::AlreadyExists`] for a
    /// duplicate name, and backfill insert errors.
    pub fn create_index(
        &self,
        database: &str,
        collection: &str,
        spec: IndexSpec,
    ) -> StorageResult<()> {
        let (namespace, _) = self.collection_info(database, collection)?;
        let index = self
            .kv
            .create_sorted_data(&namespace, &spec.name, spec.unique)?;

        // Backfill, keyed on the document id like live maintenance.
        let store = self.kv.record_store(&namespace)?;
        for (record_id, data) in store.scan(&RecordId::null())? {
            let document = Document::from_bytes(&data)?;
            index.insert(&document_id_key(&document)?, &record_id)?;
        }

        let mut catalog = self.catalog.write();
        if let Some(info) = catalog
            .databases
            .get_mut(database)
            .and_then(|collections| collections.get_mut(collection))
        {
            info.indexes.insert(spec.name.clone(), spec);
        }
        Ok(())
    }

    /// Drops a secondary index.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] when asked to drop the mandatory
    /// id index. [`StorageError::NotFound`] for an unknown database,
    /// collection, or index name.
    pub fn drop_index(
        &self,
        database: &str,
        collection: &str,
        index_name: &str,
    ) -> StorageResult<()> {
        if index_name == ID_INDEX_NAME {
            return Err(StorageError::invalid_argument(format!(
                "cannot drop the {ID_INDEX_NAME} index"
            )));
        }
        let mut catalog = self.catalog.write();
        let Some(info) = catalog
            .databases
            .get_mut(database)
            .and_then(|collections| collections.get_mut(collection))
        else {
            return Err(StorageError::not_found(format!(
                "collection {database}.{collection}"
            )));
        };
        if info.indexes.remove(index_name).is_none() {
            return Err(StorageError::not_found(format!(
                "index {}.{index_name}",
                info.namespace
            )));
        }
        let namespace = info.namespace.clone();
        drop(catalog);
        self.kv.drop_sorted_data(&namespace, index_name)
    }

    /// Lists a collection's index descriptors in name order.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] for an unknown database or collection.
    pub fn list_indexes(&self, database: &str, collection: &str) -> StorageResult<Vec<IndexSpec>> {
        let catalog = self.catalog.read();
        let Some(info) = catalog
            .databases
            .get(database)
            .and_then(|collections| collections.get(collection))
        else {
            return Err(StorageError::not_found(format!(
                "collection {database}.{collection}"
            )));
        };
        let mut specs: Vec<_> = info.indexes.values().cloned().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    /// Point-in-time snapshot nesting the key-value engine's.
    #[must_use]
    pub fn stats(&self) -> DocumentEngineStats {
        let catalog = self.catalog.read();
        DocumentEngineStats {
            engine: "btree".to_string(),
            running: catalog.running,
            databases: catalog.databases.len(),
            kv: self.kv.stats(),
        }
    }

    /// Clones a collection's namespace and index names out of the catalog
    /// so no catalog lock is held across engine calls.
    fn collection_info(
        &self,
        database: &str,
        collection: &str,
    ) -> StorageResult<(String, Vec<String>)> {
        let catalog = self.catalog.read();
        if !catalog.running {
            return Err(StorageError::EngineNotRunning);
        }
        let Some(collections) = catalog.databases.get(database) else {
            return Err(StorageError::not_found(format!("database {database}")));
        };
        let Some(info) = collections.get(collection) else {
            return Err(StorageError::not_found(format!(
                "collection {database}.{collection}"
            )));
        };
        let mut index_names: Vec<_> = info.indexes.keys().cloned().collect();
        index_names.sort();
        Ok((info.namespace.clone(), index_names))
    }

    /// Scans the collection and returns `(record id, document)` for every
    /// record matching the filter. Records that fail to decode are skipped
    /// with a warning rather than failing the whole scan.
    fn matching_records(
        &self,
        database: &str,
        collection: &str,
        filter: &Document,
    ) -> StorageResult<Vec<(RecordId, Document)>> {
        let (namespace, _) = self.collection_info(database, collection)?;
        let store = self.kv.record_store(&namespace)?;

        let mut matches = Vec::new();
        for (record_id, data) in store.scan(&RecordId::null())? {
            let document = match Document::from_bytes(&data) {
                Ok(document) => document,
                Err(error) => {
                    warn!(%record_id, %namespace, %error, "skipping undecodable record");
                    continue;
                }
            };
            if document.matches(filter) {
                matches.push((record_id, document));
            }
        }
        Ok(matches)
    }
}

impl std::fmt::Debug for DocumentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let catalog = self.catalog.read();
        f.debug_struct("DocumentEngine")
            .field("running", &catalog.running)
            .field("databases", &catalog.databases.len())
            .finish()
    }
}

/// `"{database}.{collection}"`.
fn make_namespace(database: &str, collection: &str) -> String {
    format!("{database}.{collection}")
}

/// Index key for a document: the byte form of its `_id` field.
fn document_id_key(document: &Document) -> StorageResult<Vec<u8>> {
    match document.get(ID_FIELD) {
        Some(Value::Text(text)) => Ok(text.as_bytes().to_vec()),
        Some(Value::Integer(n)) => Ok(i128::from(*n).to_string().into_bytes()),
        Some(_) => Err(StorageError::invalid_argument(
            "_id must be a text or integer value",
        )),
        None => Err(StorageError::invalid_argument("document has no _id field")),
    }
}
