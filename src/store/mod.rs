//! Persistent store with two interchangeable backends
//!
//! A user-granted directory is preferred; when it cannot be acquired the store
//! falls back silently to an embedded SQLite database. Both backends hold two
//! independent collections: raw captures awaiting extraction and structured
//! legal records.

mod directory;
mod schema;
mod transfer;
mod virtual_db;

pub use directory::DirectoryBackend;
pub use transfer::{export_all, export_file_name, parse_records, ImportReport};
pub use virtual_db::VirtualBackend;

use crate::config::{Config, StoreConfig};
use crate::error::{Error, Result};
use crate::models::{LegalRecord, RawCapture};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Longest name produced by [`sanitize_name`], in characters
pub const MAX_NAME_CHARS: usize = 150;

/// Which backend is holding the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Direct,
    Virtual,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Direct => write!(f, "direct"),
            StorageMode::Virtual => write!(f, "virtual"),
        }
    }
}

/// Operations shared by both backends
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn mode(&self) -> StorageMode;

    /// Insert or overwrite a raw capture by name
    async fn save_raw_capture(&self, capture: &RawCapture) -> Result<()>;

    async fn list_raw_captures(&self) -> Result<Vec<RawCapture>>;

    /// Remove a raw capture; a missing name is not an error
    async fn delete_raw_capture(&self, name: &str) -> Result<()>;

    /// Insert or overwrite a record under `key`
    async fn save_legal_record(&self, key: &str, record: &LegalRecord) -> Result<()>;

    /// All readable records; unparsable entries are skipped
    async fn list_legal_records(&self) -> Result<Vec<LegalRecord>>;

    /// Remove every record, returning how many were removed
    async fn clear_legal_records(&self) -> Result<usize>;
}

/// Make a name safe for both backends.
///
/// Path separators, reserved punctuation, control characters and whitespace
/// become `_`; leading and trailing dots are removed; the result is capped at
/// [`MAX_NAME_CHARS`]. Applying it twice gives the same result as once.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .take(MAX_NAME_CHARS)
        .collect();

    replaced.trim_matches('.').to_string()
}

/// Result of backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSelection {
    pub success: bool,
    pub mode: Option<StorageMode>,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

/// Session storage context
pub struct Store {
    config: StoreConfig,
    db_file: PathBuf,
    backend: Option<Box<dyn StorageBackend>>,
}

impl Store {
    /// Create an unselected store from configuration
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.store.clone(),
            db_file: config.paths.db_file.clone(),
            backend: None,
        }
    }

    /// Create a store around an already acquired backend
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            config: StoreConfig::default(),
            db_file: PathBuf::new(),
            backend: Some(backend),
        }
    }

    /// Choose a backend: the configured directory first, then the virtual database.
    ///
    /// Failures are logged and reported through the returned selection, never
    /// as errors.
    pub async fn select_backend(&mut self) -> BackendSelection {
        self.backend = None;

        if !self.config.prefer_virtual {
            if let Some(dir) = &self.config.directory {
                match DirectoryBackend::acquire(dir).await {
                    Ok(backend) => {
                        info!("Using direct storage at {:?}", dir);
                        self.backend = Some(Box::new(backend));
                        return self.selection();
                    }
                    Err(e) => {
                        debug!("Directory {:?} unavailable, falling back: {}", dir, e);
                    }
                }
            }
        }

        match VirtualBackend::open(&self.db_file).await {
            Ok(backend) => {
                info!("Using virtual storage at {:?}", self.db_file);
                self.backend = Some(Box::new(backend));
            }
            Err(e) => {
                warn!("No storage backend available: {}", e);
            }
        }

        self.selection()
    }

    fn selection(&self) -> BackendSelection {
        BackendSelection {
            success: self.backend.is_some(),
            mode: self.mode(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn mode(&self) -> Option<StorageMode> {
        self.backend.as_ref().map(|b| b.mode())
    }

    fn backend(&self) -> Result<&dyn StorageBackend> {
        self.backend.as_deref().ok_or_else(|| {
            Error::StorageUnavailable("no backend selected; run backend selection first".to_string())
        })
    }

    /// Upsert a raw capture, returning the sanitized name it was stored under
    ///
    /// `source` is the locator the content came from; pending captures are
    /// later extracted against it so records keep their origin.
    pub async fn save_raw_capture(
        &self,
        name: &str,
        content: &str,
        subfolder: Option<&str>,
        source: Option<&str>,
    ) -> Result<String> {
        let backend = self.backend()?;

        let mut safe_name = sanitize_name(name);
        if safe_name.is_empty() {
            safe_name = format!("captura_{}", Utc::now().timestamp_millis());
        }
        let subfolder = subfolder.map(sanitize_name).filter(|s| !s.is_empty());

        let capture = RawCapture::new(safe_name.clone(), content.to_string(), subfolder)
            .with_source(source.map(str::to_string));
        backend.save_raw_capture(&capture).await?;
        debug!("Saved raw capture '{}'", safe_name);
        Ok(safe_name)
    }

    pub async fn list_raw_captures(&self) -> Result<Vec<RawCapture>> {
        self.backend()?.list_raw_captures().await
    }

    pub async fn delete_raw_capture(&self, name: &str) -> Result<()> {
        self.backend()?.delete_raw_capture(&sanitize_name(name)).await
    }

    /// Upsert a record by id, returning the key it was stored under
    pub async fn save_legal_record(&self, record: &LegalRecord) -> Result<String> {
        let backend = self.backend()?;

        let key = sanitize_name(record.storage_key());
        if key.is_empty() {
            return Err(Error::write(
                &record.processo,
                "record has neither id nor ecli",
            ));
        }

        if record.file_name.is_some() {
            backend.save_legal_record(&key, record).await?;
        } else {
            let mut named = record.clone();
            named.file_name = Some(key.clone());
            backend.save_legal_record(&key, &named).await?;
        }

        info!(key = %key, mode = %backend.mode(), "Saved legal record");
        Ok(key)
    }

    pub async fn list_legal_records(&self) -> Result<Vec<LegalRecord>> {
        self.backend()?.list_legal_records().await
    }

    /// Remove every stored record
    pub async fn clear_legal_records(&self) -> Result<usize> {
        let removed = self.backend()?.clear_legal_records().await?;
        info!("Cleared {} legal records", removed);
        Ok(removed)
    }

    /// Import one record or an array of records; malformed entries are skipped
    pub async fn import_records(&self, bytes: &[u8]) -> Result<ImportStats> {
        self.backend()?;
        let report = parse_records(bytes)?;

        let mut stats = ImportStats {
            imported: 0,
            skipped: report.malformed.len(),
        };
        for issue in &report.malformed {
            warn!("{}", Error::ImportMalformed(issue.clone()));
        }

        for record in &report.records {
            match self.save_legal_record(record).await {
                Ok(_) => stats.imported += 1,
                Err(e) => {
                    warn!("Skipping record '{}': {}", record.storage_key(), e);
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }
}
