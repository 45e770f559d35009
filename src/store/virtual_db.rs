//! Virtual backend: embedded SQLite database with two keyed collections

use super::schema::SCHEMA_SQL;
use super::{StorageBackend, StorageMode};
use crate::error::{Error, Result};
use crate::models::{LegalRecord, RawCapture};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, FromRow)]
struct RawCaptureRow {
    name: String,
    content: String,
    subfolder: Option<String>,
    source: Option<String>,
    timestamp: String,
}

impl From<RawCaptureRow> for RawCapture {
    fn from(row: RawCaptureRow) -> Self {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!(name = %row.name, "Invalid capture timestamp '{}': {}", row.timestamp, e);
                Utc::now()
            });

        RawCapture {
            name: row.name,
            content: row.content,
            subfolder: row.subfolder,
            source: row.source,
            timestamp,
        }
    }
}

/// Database handle for the virtual backend
#[derive(Clone)]
pub struct VirtualBackend {
    pool: SqlitePool,
}

impl VirtualBackend {
    /// Open (or create) the database file and initialize its schema
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<()> {
        info!("Initializing virtual backend schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_raw_once(&self, capture: &RawCapture) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO raw_captures (name, content, subfolder, source, timestamp)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                content = excluded.content,
                subfolder = excluded.subfolder,
                source = excluded.source,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&capture.name)
        .bind(&capture.content)
        .bind(&capture.subfolder)
        .bind(&capture.source)
        .bind(capture.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_record_once(&self, key: &str, ecli: &str, json: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO legal_records (id, ecli, record_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                ecli = excluded.ecli,
                record_json = excluded.record_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(ecli)
        .bind(json)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Busy/locked databases and pool exhaustion clear up on their own
fn is_transient(err: &Error) -> bool {
    match err {
        Error::Database(sqlx::Error::PoolTimedOut) => true,
        Error::Database(sqlx::Error::Database(db)) => {
            let message = db.message().to_lowercase();
            message.contains("locked") || message.contains("busy")
        }
        _ => false,
    }
}

/// Run a write, retrying transient database failures a bounded number of times
async fn with_retry<T, F, Fut>(name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_WRITE_ATTEMPTS && is_transient(&e) => {
                warn!(name, attempt, "Transient database error, retrying: {}", e);
                tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => return Err(Error::write(name, e)),
        }
    }
}

#[async_trait]
impl StorageBackend for VirtualBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Virtual
    }

    async fn save_raw_capture(&self, capture: &RawCapture) -> Result<()> {
        with_retry(&capture.name, || self.upsert_raw_once(capture)).await
    }

    async fn list_raw_captures(&self) -> Result<Vec<RawCapture>> {
        let rows = sqlx::query_as::<_, RawCaptureRow>(
            "SELECT name, content, subfolder, source, timestamp FROM raw_captures",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RawCapture::from).collect())
    }

    async fn delete_raw_capture(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM raw_captures WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::write(name, e))?;
        Ok(())
    }

    async fn save_legal_record(&self, key: &str, record: &LegalRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        with_retry(key, || self.upsert_record_once(key, &record.ecli, &json)).await
    }

    async fn list_legal_records(&self) -> Result<Vec<LegalRecord>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, record_json FROM legal_records")
                .fetch_all(&self.pool)
                .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            match serde_json::from_str::<LegalRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!(id = %id, "Skipping unparsable record: {}", e),
            }
        }
        Ok(records)
    }

    async fn clear_legal_records(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM legal_records")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_db() -> (VirtualBackend, TempDir) {
        let tmp = TempDir::new().unwrap();
        let backend = VirtualBackend::open(&tmp.path().join("test.db")).await.unwrap();
        (backend, tmp)
    }

    #[tokio::test]
    async fn test_raw_capture_upsert() {
        let (db, _tmp) = setup_test_db().await;

        let mut capture = RawCapture::new("captura_1".to_string(), "primeira".to_string(), None)
            .with_source(Some("http://www.dgsi.pt/jstj.nsf/abc".to_string()));
        db.save_raw_capture(&capture).await.unwrap();
        capture.content = "segunda".to_string();
        db.save_raw_capture(&capture).await.unwrap();

        let captures = db.list_raw_captures().await.unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].content, "segunda");
        assert_eq!(
            captures[0].source.as_deref(),
            Some("http://www.dgsi.pt/jstj.nsf/abc")
        );

        db.delete_raw_capture("captura_1").await.unwrap();
        db.delete_raw_capture("captura_1").await.unwrap();
        assert!(db.list_raw_captures().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_skipped() {
        let (db, _tmp) = setup_test_db().await;

        sqlx::query(
            "INSERT INTO legal_records (id, ecli, record_json, updated_at) VALUES ('bad', 'x', '{not json', 'now')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        assert!(db.list_legal_records().await.unwrap().is_empty());
        assert_eq!(db.clear_legal_records().await.unwrap(), 1);
    }
}
