//! SQLite schema for the virtual backend

/// Two independent keyed collections
pub const SCHEMA_SQL: &str = r#"
-- Raw captures awaiting extraction, keyed by sanitized name
CREATE TABLE IF NOT EXISTS raw_captures (
    name TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    subfolder TEXT,
    source TEXT,
    timestamp TEXT NOT NULL
);

-- Structured decisions, keyed by id (ECLI when known)
CREATE TABLE IF NOT EXISTS legal_records (
    id TEXT PRIMARY KEY,
    ecli TEXT NOT NULL,
    record_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_legal_records_ecli ON legal_records(ecli);
"#;
