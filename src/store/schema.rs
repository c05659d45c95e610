//! Provider store schema

/// SQL schema for the provider database
pub const SCHEMA_SQL: &str = r#"
-- One row per saved run; the newest row per provider is current
CREATE TABLE IF NOT EXISTS providers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id TEXT NOT NULL,
    doc_url TEXT NOT NULL,
    title TEXT,
    version TEXT,
    endpoints_count INTEGER NOT NULL DEFAULT 0,
    spec_source TEXT NOT NULL,
    spec_json TEXT NOT NULL,
    report_json TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_providers_provider ON providers(provider_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
