//! Engine fixtures and seeded demo data.
//!
//! Provides convenience functions for setting up started engines
//! and common test scenarios.

use std::sync::Arc;

use ciborium::value::Value;
use entikv_core::{
    BTreeEngine, Document, DocumentEngine, EngineConfig, KvEngine, RecordId, StorageResult,
};

/// The demo user roster: `(record id, name, age)`.
pub const DEMO_USERS: [(i64, &str, i64); 5] = [
    (1, "Alice", 30),
    (2, "Bob", 25),
    (3, "Charlie", 35),
    (4, "Diana", 28),
    (5, "Eve", 32),
];

/// Creates and starts a key-value engine with the default configuration.
///
/// # Panics
///
/// If the freshly created engine fails to start.
#[must_use]
pub fn started_engine() -> Arc<BTreeEngine> {
    started_engine_with(EngineConfig::default())
}

/// Creates and starts a key-value engine with `config`.
///
/// # Panics
///
/// If the freshly created engine fails to start.
#[must_use]
pub fn started_engine_with(config: EngineConfig) -> Arc<BTreeEngine> {
    let engine = BTreeEngine::new(config);
    engine.start().expect("engine should start");
    engine
}

/// Creates and starts a document engine with one `testdb.users` collection.
///
/// # Panics
///
/// If engine start or catalog setup fails.
#[must_use]
pub fn started_document_engine() -> DocumentEngine {
    let engine = DocumentEngine::new(EngineConfig::default());
    engine.start().expect("engine should start");
    engine
        .create_database("testdb")
        .expect("database should be created");
    engine
        .create_collection("testdb", "users")
        .expect("collection should be created");
    engine
}

/// Builds a CBOR user document with `_id`, `name`, and `age` fields.
#[must_use]
pub fn user_document(id: i64, name: &str, age: i64) -> Document {
    Document::new()
        .with("_id", Value::Text(format!("user{id}")))
        .with("name", Value::Text(name.to_string()))
        .with("age", Value::Integer(age.into()))
}

/// Creates the `namespace` record store on `engine` and inserts the
/// [`DEMO_USERS`] roster as CBOR documents keyed by integer record ids.
///
/// # Errors
///
/// Store creation, encoding, and insert errors.
pub fn seed_users(engine: &Arc<BTreeEngine>, namespace: &str) -> StorageResult<()> {
    let store = engine.create_record_store(namespace)?;
    for (id, name, age) in DEMO_USERS {
        let doc = user_document(id, name, age);
        store.insert_record(&RecordId::from_long(id), &doc.to_bytes()?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_users_populates_five_records() {
        let engine = started_engine();
        seed_users(&engine, "testdb.users").unwrap();

        let store = engine.record_store("testdb.users").unwrap();
        assert_eq!(store.num_records(), 5);

        let doc =
            Document::from_bytes(&store.get_record(&RecordId::from_long(3)).unwrap()).unwrap();
        assert_eq!(doc.get("name"), Some(&Value::Text("Charlie".into())));
    }

    #[test]
    fn document_engine_fixture_is_ready() {
        let engine = started_document_engine();
        assert_eq!(engine.list_databases(), vec!["testdb".to_string()]);
        assert_eq!(
            engine.list_collections("testdb").unwrap(),
            vec!["users".to_string()]
        );
    }
}
