//! Direct-handle backend: plain files under a user-granted directory
//!
//! Layout:
//! - `raw/[subfolder/]<name>.txt` for raw captures
//! - `raw/[subfolder/]<name>.src` holding the capture's source locator, when known
//! - `records/<key>.json` for structured records (pretty JSON)

use super::transfer::parse_records;
use super::{sanitize_name, StorageBackend, StorageMode};
use crate::error::{Error, Result};
use crate::models::{LegalRecord, RawCapture};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const RAW_DIR: &str = "raw";
const RECORDS_DIR: &str = "records";
const RAW_EXTENSION: &str = "txt";
const SOURCE_EXTENSION: &str = "src";
const RECORD_EXTENSION: &str = "json";
const PROBE_FILE: &str = ".jurisprudencia-probe";

/// Storage rooted at a writable directory
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
    raw_dir: PathBuf,
    records_dir: PathBuf,
}

impl DirectoryBackend {
    /// Acquire the directory: create the layout and prove it is writable
    pub async fn acquire(root: &Path) -> Result<Self> {
        let raw_dir = root.join(RAW_DIR);
        let records_dir = root.join(RECORDS_DIR);

        tokio::fs::create_dir_all(&raw_dir).await?;
        tokio::fs::create_dir_all(&records_dir).await?;

        let probe = root.join(PROBE_FILE);
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await?;

        info!("Directory backend acquired at {:?}", root);
        Ok(Self {
            root: root.to_path_buf(),
            raw_dir,
            records_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files under `dir` with the given extension, recursively
    fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
            .collect()
    }

    /// Every stored file for a raw capture name, in any subfolder
    fn raw_paths(&self, name: &str) -> Vec<PathBuf> {
        Self::files_with_extension(&self.raw_dir, RAW_EXTENSION)
            .into_iter()
            .filter(|path| path.file_stem().and_then(|s| s.to_str()) == Some(name))
            .collect()
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.records_dir.join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    /// Record files named after `key` anywhere below `records/`
    fn record_paths(&self, key: &str) -> Vec<PathBuf> {
        Self::files_with_extension(&self.records_dir, RECORD_EXTENSION)
            .into_iter()
            .filter(|path| path.file_stem().and_then(|s| s.to_str()) == Some(key))
            .collect()
    }

    async fn read_raw(&self, path: &Path) -> Result<RawCapture> {
        let content = tokio::fs::read_to_string(path).await?;
        let modified = tokio::fs::metadata(path).await?.modified()?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Other(format!("Invalid capture file name: {:?}", path)))?
            .to_string();
        let subfolder = path
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.raw_dir).ok())
            .map(|rel| rel.to_string_lossy().to_string())
            .filter(|rel| !rel.is_empty());

        let source_path = path.with_extension(SOURCE_EXTENSION);
        let source = match tokio::fs::read_to_string(&source_path).await {
            Ok(source) => Some(source.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Ignoring unreadable source file {:?}: {}", source_path, e);
                None
            }
        };

        Ok(RawCapture {
            name,
            content,
            subfolder,
            source,
            timestamp: DateTime::<Utc>::from(modified),
        })
    }
}

/// Write through a temporary sibling so readers never see a partial file
async fn write_replace(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Other(format!("Invalid file path: {:?}", path)))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_present(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a raw capture file together with its source sidecar
async fn remove_raw(path: &Path) -> std::io::Result<bool> {
    remove_if_present(&path.with_extension(SOURCE_EXTENSION)).await?;
    remove_if_present(path).await
}

#[async_trait]
impl StorageBackend for DirectoryBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Direct
    }

    async fn save_raw_capture(&self, capture: &RawCapture) -> Result<()> {
        let dir = match &capture.subfolder {
            Some(sub) => self.raw_dir.join(sub),
            None => self.raw_dir.clone(),
        };
        let target = dir.join(format!("{}.{}", capture.name, RAW_EXTENSION));

        // At most one file per name, whatever subfolder it was filed under
        for stale in self.raw_paths(&capture.name) {
            if stale != target {
                remove_raw(&stale)
                    .await
                    .map_err(|e| Error::write(&capture.name, e))?;
            }
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::write(&capture.name, e))?;

        // Sidecar first: a capture file never outlives a stale locator
        let source_path = target.with_extension(SOURCE_EXTENSION);
        let sidecar = match &capture.source {
            Some(source) => write_replace(&source_path, source.as_bytes()).await,
            None => remove_if_present(&source_path)
                .await
                .map(|_| ())
                .map_err(Error::from),
        };
        sidecar.map_err(|e| Error::write(&capture.name, e))?;

        write_replace(&target, capture.content.as_bytes())
            .await
            .map_err(|e| Error::write(&capture.name, e))?;
        debug!("Wrote raw capture {:?}", target);
        Ok(())
    }

    async fn list_raw_captures(&self) -> Result<Vec<RawCapture>> {
        let mut captures = Vec::new();
        for path in Self::files_with_extension(&self.raw_dir, RAW_EXTENSION) {
            match self.read_raw(&path).await {
                Ok(capture) => captures.push(capture),
                Err(e) => warn!("Skipping unreadable capture {:?}: {}", path, e),
            }
        }
        Ok(captures)
    }

    async fn delete_raw_capture(&self, name: &str) -> Result<()> {
        for path in self.raw_paths(name) {
            if remove_raw(&path).await.map_err(|e| Error::write(name, e))? {
                debug!("Deleted raw capture {:?}", path);
            }
        }
        Ok(())
    }

    async fn save_legal_record(&self, key: &str, record: &LegalRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        let path = self.record_path(key);
        write_replace(&path, json.as_bytes())
            .await
            .map_err(|e| Error::write(key, e))?;

        // One file per key: copies filed in subdirectories are superseded
        for stale in self.record_paths(key) {
            if stale != path {
                remove_if_present(&stale)
                    .await
                    .map_err(|e| Error::write(key, e))?;
                debug!("Removed superseded record {:?}", stale);
            }
        }

        debug!("Wrote record {:?}", path);
        Ok(())
    }

    async fn list_legal_records(&self) -> Result<Vec<LegalRecord>> {
        let mut records: Vec<LegalRecord> = Vec::new();
        // key -> (position in `records`, read from the top-level file)
        let mut seen: HashMap<String, (usize, bool)> = HashMap::new();

        for path in Self::files_with_extension(&self.records_dir, RECORD_EXTENSION) {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping unreadable record file {:?}: {}", path, e);
                    continue;
                }
            };

            match parse_records(&bytes) {
                Ok(report) => {
                    for issue in &report.malformed {
                        warn!("Skipping malformed entry in {:?}: {}", path, issue);
                    }
                    for record in report.records {
                        let key = sanitize_name(record.storage_key());
                        let top_level = path == self.record_path(&key);
                        match seen.get(&key).copied() {
                            None => {
                                seen.insert(key, (records.len(), top_level));
                                records.push(record);
                            }
                            Some((index, false)) if top_level => {
                                records[index] = record;
                                seen.insert(key, (index, true));
                            }
                            Some(_) => warn!("Ignoring duplicate record '{}' in {:?}", key, path),
                        }
                    }
                }
                Err(e) => warn!("Skipping unparsable record file {:?}: {}", path, e),
            }
        }
        Ok(records)
    }

    async fn clear_legal_records(&self) -> Result<usize> {
        let mut removed = 0;
        for path in Self::files_with_extension(&self.records_dir, RECORD_EXTENSION) {
            tokio::fs::remove_file(&path).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let backend = DirectoryBackend::acquire(&tmp.path().join("acordaos")).await.unwrap();
        assert!(backend.root().join(RAW_DIR).is_dir());
        assert!(backend.root().join(RECORDS_DIR).is_dir());
        assert!(!backend.root().join(PROBE_FILE).exists());
    }

    #[tokio::test]
    async fn test_acquire_denied_on_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        assert!(DirectoryBackend::acquire(&file).await.is_err());
    }

    #[tokio::test]
    async fn test_raw_capture_moves_between_subfolders() {
        let tmp = TempDir::new().unwrap();
        let backend = DirectoryBackend::acquire(tmp.path()).await.unwrap();

        let mut capture = RawCapture::new("abc".to_string(), "v1".to_string(), Some("stj".to_string()))
            .with_source(Some("http://www.dgsi.pt/jstj.nsf/abc".to_string()));
        backend.save_raw_capture(&capture).await.unwrap();
        capture.subfolder = None;
        capture.content = "v2".to_string();
        backend.save_raw_capture(&capture).await.unwrap();

        let captures = backend.list_raw_captures().await.unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].content, "v2");
        assert_eq!(captures[0].subfolder, None);
        assert_eq!(
            captures[0].source.as_deref(),
            Some("http://www.dgsi.pt/jstj.nsf/abc")
        );
        assert!(!tmp.path().join(RAW_DIR).join("stj").join("abc.src").exists());
    }

    #[tokio::test]
    async fn test_raw_capture_source_sidecar_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let backend = DirectoryBackend::acquire(tmp.path()).await.unwrap();
        let sidecar = tmp.path().join(RAW_DIR).join("colagem_x.src");

        let capture = RawCapture::new("colagem_x".to_string(), "texto".to_string(), None)
            .with_source(Some("colagem://0123456789abcdef".to_string()));
        backend.save_raw_capture(&capture).await.unwrap();
        assert!(sidecar.exists());

        // The sidecar is not listed as a capture of its own
        let captures = backend.list_raw_captures().await.unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].source.as_deref(), Some("colagem://0123456789abcdef"));

        backend.delete_raw_capture("colagem_x").await.unwrap();
        assert!(!sidecar.exists());
        assert!(backend.list_raw_captures().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_saving_record_supersedes_nested_copy() {
        let tmp = TempDir::new().unwrap();
        let backend = DirectoryBackend::acquire(tmp.path()).await.unwrap();

        let nested = tmp.path().join(RECORDS_DIR).join("x");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("a.json"),
            r#"{"id":"a","ecli":"Desconhecido","processo":"1/22","data":"x","relator":"Antigo"}"#,
        )
        .unwrap();

        let mut record = backend.list_legal_records().await.unwrap().remove(0);
        record.relator = "Novo".to_string();
        backend.save_legal_record("a", &record).await.unwrap();

        let records = backend.list_legal_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relator, "Novo");
        assert!(!nested.join("a.json").exists());
    }

    #[tokio::test]
    async fn test_listing_prefers_top_level_record_for_duplicate_keys() {
        let tmp = TempDir::new().unwrap();
        let backend = DirectoryBackend::acquire(tmp.path()).await.unwrap();
        let records_dir = tmp.path().join(RECORDS_DIR);

        std::fs::create_dir_all(records_dir.join("x")).unwrap();
        std::fs::write(
            records_dir.join("x").join("copia.json"),
            r#"{"id":"a","ecli":"Desconhecido","processo":"1/22","data":"x","relator":"Copia"}"#,
        )
        .unwrap();
        std::fs::write(
            records_dir.join("a.json"),
            r#"{"id":"a","ecli":"Desconhecido","processo":"1/22","data":"x","relator":"Principal"}"#,
        )
        .unwrap();

        let records = backend.list_legal_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relator, "Principal");
    }

    #[tokio::test]
    async fn test_listing_walks_subdirectories_and_skips_garbage() {
        let tmp = TempDir::new().unwrap();
        let backend = DirectoryBackend::acquire(tmp.path()).await.unwrap();

        let nested = tmp.path().join(RECORDS_DIR).join("2022");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("a.json"),
            r#"{"id":"a","ecli":"Desconhecido","processo":"1/22","data":"x","relator":"R"}"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join(RECORDS_DIR).join("broken.json"), "{oops").unwrap();
        std::fs::write(tmp.path().join(RECORDS_DIR).join("notes.md"), "ignored").unwrap();

        let records = backend.list_legal_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }
}
