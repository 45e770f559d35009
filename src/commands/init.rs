//! Init command implementation

use super::open_store;
use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,

    /// Directory granted for direct storage
    pub directory: Option<PathBuf>,
}

/// Write the configuration file and acquire the storage backend once
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions {
        base_dir,
        config_path,
        force,
        directory,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.store.directory = directory;
    config.validate()?;
    config.save()?;

    let store = open_store(&config).await?;
    if let Some(mode) = store.mode() {
        info!("Storage ready in {} mode", mode);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorageMode;
    use tempfile::TempDir;

    fn options(tmp: &TempDir, force: bool) -> InitOptions {
        InitOptions {
            base_dir: tmp.path().to_path_buf(),
            config_path: tmp.path().join("config.toml"),
            force,
            directory: Some(tmp.path().join("acordaos")),
        }
    }

    #[tokio::test]
    async fn test_init_creates_config_and_storage() {
        let tmp = TempDir::new().unwrap();
        let config = cmd_init(options(&tmp, false)).await.unwrap();

        assert!(config.paths.config_file.exists());
        assert!(tmp.path().join("acordaos").join("records").is_dir());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.store.directory, Some(tmp.path().join("acordaos")));

        let store = open_store(&loaded).await.unwrap();
        assert_eq!(store.mode(), Some(StorageMode::Direct));
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        cmd_init(options(&tmp, false)).await.unwrap();
        assert!(matches!(
            cmd_init(options(&tmp, false)).await,
            Err(Error::Config(_))
        ));
        assert!(cmd_init(options(&tmp, true)).await.is_ok());
    }
}
