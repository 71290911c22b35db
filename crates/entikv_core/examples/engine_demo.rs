//! Storage Engine Walkthrough
//!
//! This example exercises the key-value engine end to end:
//! - Starting the engine and opening a session
//! - Creating a record store with a unique `_id_` index and a `name_idx`
//! - Inserting CBOR documents in a transaction with registered undo changes
//! - Point lookups, index seeks, and full scans
//! - Updates, deletes, and a stats dump
//! - A second transaction whose insert is rolled back and verifiably undone
//!
//! Run with: cargo run --example engine_demo
//!
//! Set `RUST_LOG=entikv_core=debug` to watch the engine's tracing output.

use ciborium::value::Value;
use entikv_core::{
    BTreeEngine, Document, EngineConfig, KvEngine, RecordId, RecoveryUnit, Session, SimpleChange,
};
use std::sync::Arc;

const NAMESPACE: &str = "demo.users";

fn user_doc(id: i64, name: &str, age: i64) -> Document {
    Document::new()
        .with("_id", Value::Text(format!("user{id}")))
        .with("name", Value::Text(name.to_string()))
        .with("age", Value::Integer(age.into()))
}

fn id_key(doc: &Document) -> Vec<u8> {
    match doc.get("_id") {
        Some(Value::Text(text)) => text.as_bytes().to_vec(),
        _ => Vec::new(),
    }
}

fn name_key(doc: &Document) -> Vec<u8> {
    match doc.get("name") {
        Some(Value::Text(text)) => text.as_bytes().to_vec(),
        _ => Vec::new(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Storage Engine Walkthrough");
    println!("==========================\n");

    // 1. Start the engine.
    let engine = BTreeEngine::new(EngineConfig::default());
    engine.start()?;
    println!("[OK] Engine started");

    // 2. Open a session.
    let session = engine.create_session()?;
    println!("[OK] Session {} opened", session.session_id());

    // 3. Create the record store and its indexes.
    let store = engine.create_record_store(NAMESPACE)?;
    let id_index = engine.create_sorted_data(NAMESPACE, "_id_", true)?;
    let name_index = engine.create_sorted_data(NAMESPACE, "name_idx", false)?;
    println!("[OK] Created {NAMESPACE} with _id_ (unique) and name_idx");

    // 4. Insert five users in a transaction, registering one undo change
    //    per structural mutation.
    let users = [
        (1, "Alice", 30),
        (2, "Bob", 25),
        (3, "Charlie", 35),
        (4, "Diana", 28),
        (5, "Eve", 32),
    ];

    println!("\n[+] Inserting {} users transactionally...", users.len());
    session.begin_transaction()?;
    for (id, name, age) in users {
        let record_id = RecordId::from_long(id);
        let doc = user_doc(id, name, age);

        store.insert_record(&record_id, &doc.to_bytes()?)?;
        {
            let store = Arc::clone(&store);
            let undo_id = record_id.clone();
            session
                .recovery_unit()
                .register_change(Box::new(SimpleChange::on_rollback(move || {
                    store.delete_record(&undo_id)
                })))?;
        }

        for (index, key) in [(&id_index, id_key(&doc)), (&name_index, name_key(&doc))] {
            index.insert(&key, &record_id)?;
            let index = Arc::clone(index);
            let undo_id = record_id.clone();
            session
                .recovery_unit()
                .register_change(Box::new(SimpleChange::on_rollback(move || {
                    index.remove(&key, &undo_id)
                })))?;
        }
    }
    session.commit_transaction()?;
    println!("[OK] Committed");

    // 5. Point lookup.
    let data = store.get_record(&RecordId::from_long(3))?;
    let charlie = Document::from_bytes(&data)?;
    println!("\n[*] Lookup RecordId(3): {:?}", charlie.get("name"));

    // 6. Index seek.
    print!("[*] name_idx seek \"Diana\":");
    for entry in name_index.seek(b"Diana")? {
        print!(" {}", entry.record_id);
    }
    println!();

    // 7. Full scan.
    println!("\n[*] All users:");
    for (record_id, data) in store.scan(&RecordId::null())? {
        let doc = Document::from_bytes(&data)?;
        println!("  {record_id} {:?} age {:?}", doc.get("name"), doc.get("age"));
    }

    // 8. Update Bob's age.
    println!("\n[~] Updating Bob's age to 26...");
    let bob_id = RecordId::from_long(2);
    let mut bob = Document::from_bytes(&store.get_record(&bob_id)?)?;
    bob.set("age", Value::Integer(26.into()));
    store.update_record(&bob_id, &bob.to_bytes()?)?;

    // 9. Delete Eve: index entries first, then the record.
    println!("[-] Deleting Eve...");
    let eve_id = RecordId::from_long(5);
    let eve = Document::from_bytes(&store.get_record(&eve_id)?)?;
    id_index.remove(&id_key(&eve), &eve_id)?;
    name_index.remove(&name_key(&eve), &eve_id)?;
    store.delete_record(&eve_id)?;

    // 10. Stats.
    let stats = engine.stats();
    println!("\n[#] Engine stats:");
    println!("  record stores:  {}", stats.record_stores);
    println!("  indexes:        {}", stats.indexes);
    println!("  sessions:       {}", stats.sessions);
    println!("  total records:  {}", stats.total_records);
    println!("  index entries:  {}", stats.total_index_entries);
    println!("  data size:      {} bytes", stats.total_data_size);

    // 11. A second session rolls its insert back.
    println!("\n[!] Rolling back a second session's insert...");
    let other = engine.create_session()?;
    other.begin_transaction()?;

    let frank_id = RecordId::from_long(6);
    let frank = user_doc(6, "Frank", 41);
    store.insert_record(&frank_id, &frank.to_bytes()?)?;
    {
        let store = Arc::clone(&store);
        let undo_id = frank_id.clone();
        other
            .recovery_unit()
            .register_change(Box::new(SimpleChange::on_rollback(move || {
                store.delete_record(&undo_id)
            })))?;
    }
    println!("  before rollback: {} records", store.num_records());

    other.rollback_transaction()?;
    println!("  after rollback:  {} records", store.num_records());
    assert!(store.get_record(&frank_id).is_err());
    other.end()?;

    // 12. Shut down.
    session.end()?;
    engine.stop()?;
    println!("\n[*] Engine stopped");

    Ok(())
}
