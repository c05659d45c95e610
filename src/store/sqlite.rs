//! SQLite provider store

use crate::store::schema::initialize_schema;
use crate::store::{ProviderRecord, ProviderStore, StoreResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed provider store
///
/// Every save appends a row; [`SqliteProviderStore::latest`] returns the
/// newest one for a provider.
pub struct SqliteProviderStore {
    conn: Mutex<Connection>,
}

impl SqliteProviderStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Newest saved record for a provider
    pub fn latest(&self, provider_id: &str) -> StoreResult<Option<ProviderRecord>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT provider_id, doc_url, spec_json, report_json FROM providers
                 WHERE provider_id = ?1 ORDER BY id DESC LIMIT 1",
                params![provider_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((provider_id, doc_url, spec_json, report_json)) = row else {
            return Ok(None);
        };

        Ok(Some(ProviderRecord {
            provider_id,
            doc_url,
            spec_json: serde_json::from_str(&spec_json)?,
            report: serde_json::from_str(&report_json)?,
        }))
    }

    /// Total number of saved records
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM providers", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl ProviderStore for SqliteProviderStore {
    fn save(&self, record: &ProviderRecord) -> StoreResult<()> {
        let spec_json = serde_json::to_string(&record.spec_json)?;
        let report_json = serde_json::to_string(&record.report)?;

        self.conn().execute(
            "INSERT INTO providers (provider_id, doc_url, title, version, endpoints_count,
             spec_source, spec_json, report_json, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.provider_id,
                record.doc_url,
                record.title(),
                record.version(),
                record.endpoint_count() as i64,
                record.report.spec_source.to_string(),
                spec_json,
                report_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!(
            "Saved provider {} ({} endpoints)",
            record.provider_id,
            record.endpoint_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunReport;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(title: &str) -> ProviderRecord {
        ProviderRecord {
            provider_id: "docs.example.com".to_string(),
            doc_url: "https://docs.example.com/api".to_string(),
            spec_json: json!({
                "openapi": "3.0.3",
                "info": {"title": title, "version": "1.0.0"},
                "paths": {"/users": {"get": {}}}
            }),
            report: RunReport::new("https://docs.example.com/api"),
        }
    }

    #[test]
    fn test_save_and_latest() {
        let store = SqliteProviderStore::new_in_memory().unwrap();
        store.save(&record("First")).unwrap();
        store.save(&record("Second")).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        let latest = store.latest("docs.example.com").unwrap().unwrap();
        assert_eq!(latest.title(), Some("Second"));
        assert_eq!(latest.report.root_url, "https://docs.example.com/api");
        assert!(store.latest("other.example.com").unwrap().is_none());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("providers.db");

        SqliteProviderStore::new(&path)
            .unwrap()
            .save(&record("Persisted"))
            .unwrap();

        let reopened = SqliteProviderStore::new(&path).unwrap();
        let latest = reopened.latest("docs.example.com").unwrap().unwrap();
        assert_eq!(latest.title(), Some("Persisted"));
        assert_eq!(latest.endpoint_count(), 1);
    }

    #[test]
    fn test_metadata_columns() {
        let store = SqliteProviderStore::new_in_memory().unwrap();
        store.save(&record("Columns")).unwrap();

        let (title, endpoints, source): (String, i64, String) = store
            .conn()
            .query_row(
                "SELECT title, endpoints_count, spec_source FROM providers",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(title, "Columns");
        assert_eq!(endpoints, 1);
        assert_eq!(source, "Synthesized");
    }
}
