//! Point-in-time statistics snapshots.

use serde::Serialize;

/// Snapshot of a [`KvEngine`](crate::engine::KvEngine)'s state and
/// aggregate counters.
///
/// Computed under the engine's registry read lock by summing each
/// registered structure's own counters. The serde field names are the
/// stats-map keys consumed by callers that want the string-keyed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Whether the engine is started.
    pub running: bool,
    /// Number of registered record stores.
    pub record_stores: usize,
    /// Number of registered indexes.
    pub indexes: usize,
    /// Number of registered sessions, ended ones included until stop.
    pub sessions: usize,
    /// Sessions created over the engine's lifetime.
    pub total_sessions_created: u64,
    /// Configured cache budget in bytes.
    pub cache_size: u64,
    /// Configured session pool limit.
    pub max_sessions: usize,
    /// Records across all record stores.
    pub total_records: u64,
    /// Payload bytes across all record stores.
    pub total_data_size: u64,
    /// Entries across all indexes.
    pub total_index_entries: u64,
}

/// Snapshot of a [`DocumentEngine`](crate::document::DocumentEngine),
/// nesting the underlying engine's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentEngineStats {
    /// Backing engine kind.
    pub engine: String,
    /// Whether the document engine is started.
    pub running: bool,
    /// Number of registered databases.
    pub databases: usize,
    /// The underlying engine's snapshot.
    #[serde(rename = "kv_engine")]
    pub kv: EngineStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EngineStats {
        EngineStats {
            running: true,
            record_stores: 2,
            indexes: 3,
            sessions: 1,
            total_sessions_created: 4,
            cache_size: 1024,
            max_sessions: 100,
            total_records: 10,
            total_data_size: 500,
            total_index_entries: 12,
        }
    }

    #[test]
    fn engine_stats_serialize_with_expected_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        for key in [
            "running",
            "record_stores",
            "indexes",
            "sessions",
            "total_sessions_created",
            "cache_size",
            "max_sessions",
            "total_records",
            "total_data_size",
            "total_index_entries",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["running"], serde_json::Value::Bool(true));
    }

    #[test]
    fn document_stats_nest_kv_engine() {
        let stats = DocumentEngineStats {
            engine: "btree".to_string(),
            running: true,
            databases: 1,
            kv: sample(),
        };

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["engine"], "btree");
        assert_eq!(json["kv_engine"]["total_records"], 10);
    }
}
