//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{StorageMode, Store};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub directory: Option<String>,
    pub mode: Option<StorageMode>,
    pub records: usize,
    pub pending_captures: usize,

    /// Records whose ECLI could not be recovered
    pub without_ecli: usize,
}

/// Get storage status
pub async fn cmd_status(config: &Config, store: &Store) -> Result<StatusInfo> {
    info!("Getting status");

    let records = store.list_legal_records().await?;
    let pending = store.list_raw_captures().await?;
    let without_ecli = records
        .iter()
        .filter(|r| r.unresolved_fields().contains(&"ecli"))
        .count();

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        directory: config
            .store
            .directory
            .as_ref()
            .map(|d| d.display().to_string()),
        mode: store.mode(),
        records: records.len(),
        pending_captures: pending.len(),
        without_ecli,
    })
}

/// Print status information
pub fn print_status(status: &StatusInfo) {
    println!("jurisprudencia status\n");
    println!("Configuration:");
    println!("  Config file: {}", status.config_path);
    println!("  Database: {}", status.db_path);
    println!(
        "  Directory: {}",
        status.directory.as_deref().unwrap_or("(not configured)")
    );
    println!();
    println!("Storage:");
    match status.mode {
        Some(mode) => println!("  Mode: {}", mode),
        None => println!("  Mode: unavailable"),
    }
    println!("  Records: {}", status.records);
    println!("  Without ECLI: {}", status.without_ecli);
    println!("  Pending captures: {}", status.pending_captures);
    if status.pending_captures > 0 {
        println!("\nRun 'juris process' to extract pending captures.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_counts() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let mut store = Store::new(&config);
        store.select_backend().await;

        store.save_raw_capture("pendente", "texto", None, None).await.unwrap();
        store
            .import_records(br#"{"id":"x_1","ecli":"Desconhecido","processo":"1/20","data":"","relator":"R"}"#)
            .await
            .unwrap();

        let status = cmd_status(&config, &store).await.unwrap();
        assert_eq!(status.mode, Some(StorageMode::Virtual));
        assert_eq!(status.records, 1);
        assert_eq!(status.without_ecli, 1);
        assert_eq!(status.pending_captures, 1);
    }
}
