//! CLI commands implementation

pub mod capture;
pub mod init;
pub mod records;
pub mod status;

pub use capture::*;
pub use init::*;
pub use records::*;
pub use status::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::fetch::HttpFetcher;
use crate::ingest::Ingestor;
use crate::store::Store;

/// Select a backend, failing when neither can be acquired
pub async fn open_store(config: &Config) -> Result<Store> {
    let mut store = Store::new(config);
    let selection = store.select_backend().await;
    if !selection.success {
        return Err(Error::StorageUnavailable(format!(
            "neither {} nor {} could be opened",
            config
                .store
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "a directory".to_string()),
            config.paths.db_file.display()
        )));
    }
    Ok(store)
}

/// Build a capture session over a ready store
pub async fn open_session(config: &Config) -> Result<Ingestor<HttpFetcher>> {
    let store = open_store(config).await?;
    let extractor = Extractor::new(&config.extract)?;
    let fetcher = HttpFetcher::new(&config.capture)?;
    Ok(Ingestor::new(
        store,
        extractor,
        fetcher,
        config.capture.clone(),
    ))
}
