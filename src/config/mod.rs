//! Configuration management for jurisprudencia
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Field extraction heuristics
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Storage backend selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Capture classification and fetching
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Extraction heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Isolate the legal reasoning excerpt (`fundamentacao`)
    #[serde(default = "default_isolate_reasoning")]
    pub isolate_reasoning: bool,

    /// Characters skipped when no reasoning header matches (approximation)
    #[serde(default = "default_reasoning_fallback_offset")]
    pub reasoning_fallback_offset: usize,

    /// A decision header closer than this to the reasoning start is ignored
    #[serde(default = "default_decision_min_offset")]
    pub decision_min_offset: usize,

    /// Lines inspected after the reporting judge's signature (5-10)
    #[serde(default = "default_cosigner_window")]
    pub cosigner_window: usize,

    /// Shortest line accepted as a co-signer name
    #[serde(default = "default_cosigner_min_len")]
    pub cosigner_min_len: usize,

    /// Longest line accepted as a co-signer name
    #[serde(default = "default_cosigner_max_len")]
    pub cosigner_max_len: usize,

    /// Lines containing any of these (case-insensitive) are not names
    #[serde(default = "default_noise_markers")]
    pub noise_markers: Vec<String>,

    /// Reasoning header patterns, first matching pattern wins
    #[serde(default = "default_reasoning_headers")]
    pub reasoning_headers: Vec<String>,

    /// Decision header patterns
    #[serde(default = "default_decision_headers")]
    pub decision_headers: Vec<String>,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory granted for direct file storage (none = virtual only)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Skip the directory backend even when one is configured
    #[serde(default = "default_prefer_virtual")]
    pub prefer_virtual: bool,
}

/// One way of retrieving a portal page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStrategy {
    /// Name used in logs
    pub name: String,

    /// URL template; `{url}` is replaced verbatim, `{url_encoded}` percent-encoded
    pub template: String,
}

/// Capture classification and fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Candidates starting with one of these are fetched
    #[serde(default = "default_portal_prefixes")]
    pub portal_prefixes: Vec<String>,

    /// Pasted text must contain one of these to count as a decision
    #[serde(default = "default_marker_keywords")]
    pub marker_keywords: Vec<String>,

    /// Minimum pasted length (characters)
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Minimum fetched length (characters) for a strategy to succeed
    #[serde(default = "default_min_fetch_chars")]
    pub min_fetch_chars: usize,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Delay between batch items in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch strategies, tried in order
    #[serde(default = "default_fetch_strategies")]
    pub fetch_strategies: Vec<FetchStrategy>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for jurisprudencia data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to the virtual backend database
    pub db_file: PathBuf,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            isolate_reasoning: default_isolate_reasoning(),
            reasoning_fallback_offset: default_reasoning_fallback_offset(),
            decision_min_offset: default_decision_min_offset(),
            cosigner_window: default_cosigner_window(),
            cosigner_min_len: default_cosigner_min_len(),
            cosigner_max_len: default_cosigner_max_len(),
            noise_markers: default_noise_markers(),
            reasoning_headers: default_reasoning_headers(),
            decision_headers: default_decision_headers(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            prefer_virtual: default_prefer_virtual(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            portal_prefixes: default_portal_prefixes(),
            marker_keywords: default_marker_keywords(),
            min_content_chars: default_min_content_chars(),
            min_fetch_chars: default_min_fetch_chars(),
            fetch_timeout_secs: default_fetch_timeout(),
            batch_delay_ms: default_batch_delay_ms(),
            user_agent: default_user_agent(),
            fetch_strategies: default_fetch_strategies(),
        }
    }
}

impl Config {
    /// Get the default base directory (~/.jurisprudencia)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".jurisprudencia")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Base directory and config file named by a `--config` argument.
    ///
    /// A directory, or a missing path without a `.toml` extension, holds
    /// `config.toml`. Any other path names the config file itself.
    pub fn resolve_location(path: Option<&Path>) -> (PathBuf, PathBuf) {
        match path {
            Some(path) if Self::names_file(path) => {
                let base = path
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."));
                (base, path.to_path_buf())
            }
            Some(path) => (path.to_path_buf(), path.join("config.toml")),
            None => {
                let base = Self::default_base_dir();
                let file = base.join("config.toml");
                (base, file)
            }
        }
    }

    fn names_file(path: &Path) -> bool {
        if path.is_dir() {
            return false;
        }
        path.is_file() || path.extension().is_some_and(|e| e == "toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("virtual.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("virtual.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(5..=10).contains(&self.extract.cosigner_window) {
            return Err(Error::Config(
                "extract.cosigner_window must be between 5 and 10".to_string(),
            ));
        }

        if self.extract.cosigner_min_len > self.extract.cosigner_max_len {
            return Err(Error::Config(
                "extract.cosigner_max_len must be >= extract.cosigner_min_len".to_string(),
            ));
        }

        for pattern in self
            .extract
            .reasoning_headers
            .iter()
            .chain(self.extract.decision_headers.iter())
        {
            regex::Regex::new(pattern)?;
        }

        if self.capture.fetch_strategies.is_empty() {
            return Err(Error::Config(
                "capture.fetch_strategies must list at least one strategy".to_string(),
            ));
        }

        for strategy in &self.capture.fetch_strategies {
            if !strategy.template.contains("{url}") && !strategy.template.contains("{url_encoded}")
            {
                return Err(Error::Config(format!(
                    "fetch strategy '{}' must reference {{url}} or {{url_encoded}}",
                    strategy.name
                )));
            }
        }

        if self.capture.fetch_timeout_secs == 0 {
            return Err(Error::Config(
                "capture.fetch_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
