//! Record commands: list, export, import and clear

use crate::error::Result;
use crate::models::LegalRecord;
use crate::store::{export_all, export_file_name, ImportStats, Store};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// One line of the record listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: String,
    pub processo: String,
    pub data: String,
    pub relator: String,
    pub descritores: usize,
    pub has_reasoning: bool,
}

impl From<&LegalRecord> for RecordSummary {
    fn from(record: &LegalRecord) -> Self {
        Self {
            id: record.id.clone(),
            processo: record.processo.clone(),
            data: record.data.clone(),
            relator: record.relator.clone(),
            descritores: record.descritores.len(),
            has_reasoning: record.fundamentacao.is_some(),
        }
    }
}

/// All stored records, ordered by id
pub async fn cmd_list(store: &Store) -> Result<Vec<LegalRecord>> {
    let mut records = store.list_legal_records().await?;
    records.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(records)
}

pub fn print_records(records: &[LegalRecord]) {
    if records.is_empty() {
        println!("No decisions stored yet.");
        return;
    }

    println!("Stored decisions ({}):\n", records.len());
    for summary in records.iter().map(RecordSummary::from) {
        println!("  {}", summary.id);
        println!("    Processo: {}  Data: {}", summary.processo, summary.data);
        println!(
            "    Relator: {}  Descritores: {}{}",
            summary.relator,
            summary.descritores,
            if summary.has_reasoning { "  [fundamentação]" } else { "" }
        );
    }
}

/// Write every record to one JSON file; `out` may be a file or a directory
pub async fn cmd_export(store: &Store, out: Option<&Path>) -> Result<(PathBuf, usize)> {
    let records = cmd_list(store).await?;
    let file_name = export_file_name(Local::now().date_naive());

    let path = match out {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    };

    tokio::fs::write(&path, export_all(&records)?).await?;
    info!("Exported {} records to {:?}", records.len(), path);
    Ok((path, records.len()))
}

/// Import records from a JSON file holding one record or an array
pub async fn cmd_import(store: &Store, path: &Path) -> Result<ImportStats> {
    let bytes = tokio::fs::read(path).await?;
    store.import_records(&bytes).await
}

/// Remove every stored record; raw captures are kept
pub async fn cmd_clear(store: &Store) -> Result<usize> {
    store.clear_legal_records().await
}
