//! SQL schema definitions.

/// Complete schema for the v1 journal database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Event log
-- ============================================================

CREATE TABLE IF NOT EXISTS events (
    seq INTEGER PRIMARY KEY,
    block INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    name TEXT NOT NULL,
    query_id INTEGER,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_query ON events(query_id);
CREATE INDEX IF NOT EXISTS idx_events_name ON events(name);

-- ============================================================
-- Per-query index, rebuilt from events
-- ============================================================

CREATE TABLE IF NOT EXISTS query_index (
    query_id INTEGER PRIMARY KEY,
    requester BLOB NOT NULL,
    status TEXT NOT NULL,
    reward TEXT NOT NULL,
    base_fee TEXT NOT NULL,
    posted_seq INTEGER NOT NULL REFERENCES events(seq),
    posted_block INTEGER NOT NULL,
    reporter BLOB,
    resolved_at INTEGER,
    callback_gas_used INTEGER,
    failure_reason TEXT,
    refund TEXT,
    updated_seq INTEGER NOT NULL REFERENCES events(seq)
);

CREATE INDEX IF NOT EXISTS idx_query_index_requester ON query_index(requester);
CREATE INDEX IF NOT EXISTS idx_query_index_status ON query_index(status);

-- ============================================================
-- Node bookkeeping
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
