//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from one TOML file shared by both
//! services. Location priority:
//! 1. Command-line `--config`
//! 2. `CIVIC_CONFIG` environment variable
//! 3. `~/.config/civic/civic.toml` (platform config dir)
//! 4. Built-in defaults (missing file is not an error)
//!
//! Secrets resolve environment first, then TOML.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "CIVIC_CONFIG";
pub const ROOT_FOLDER_ENV_VAR: &str = "CIVIC_ROOT_FOLDER";
pub const GENERATION_API_KEY_ENV_VAR: &str = "CIVIC_GENERATION_API_KEY";
pub const IDENTITY_API_KEY_ENV_VAR: &str = "CIVIC_IDENTITY_API_KEY";

const DATABASE_FILE: &str = "civic.db";

/// Complete TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CivicConfig {
    /// Folder holding the database and uploaded images
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub intake: IntakeConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_intake_port")]
    pub port: u16,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_intake_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_review_port")]
    pub port: u16,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_review_port(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_summarize_model")]
    pub summarize_model: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_generate_model")]
    pub generate_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            api_key: None,
            summarize_model: default_summarize_model(),
            embed_model: default_embed_model(),
            generate_model: default_generate_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Auth service base URL (required to start either service)
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Prefix for public image URLs; defaults to the intake service's `/images`
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Notification service URL; confirmations are only logged when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_template_id")]
    pub template_id: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            template_id: default_template_id(),
        }
    }
}

/// Submission tunables
///
/// The duplicate threshold, minimum description length and image limit are
/// fixed constants in civic-intake and cannot be configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on each external call made while submitting
    #[serde(default = "default_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_intake_port() -> u16 {
    5731
}

fn default_review_port() -> u16 {
    5732
}

fn default_page_size() -> i64 {
    50
}

fn default_generation_url() -> String {
    crate::generation::DEFAULT_BASE_URL.to_string()
}

fn default_summarize_model() -> String {
    crate::generation::DEFAULT_SUMMARIZE_MODEL.to_string()
}

fn default_embed_model() -> String {
    crate::generation::DEFAULT_EMBED_MODEL.to_string()
}

fn default_generate_model() -> String {
    crate::generation::DEFAULT_GENERATE_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bucket() -> String {
    "issue-images".to_string()
}

fn default_template_id() -> String {
    "issue_submitted".to_string()
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file found; `searched` is the per-user path that was tried
    Defaults { searched: Option<PathBuf> },
}

impl ConfigSource {
    /// Report the source once logging is up
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults { searched: Some(path) } => warn!(
                "Config file not found at {}, using built-in defaults",
                path.display()
            ),
            ConfigSource::Defaults { searched: None } => {
                warn!("Could not determine config directory, using built-in defaults")
            }
        }
    }
}

impl CivicConfig {
    /// Load configuration following the documented priority order
    ///
    /// An explicitly requested file (CLI or environment) must exist; the
    /// per-user default file is optional.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        Self::load_with_source(cli_path).map(|(config, _)| config)
    }

    /// Like [`CivicConfig::load`], also returning where the values came from.
    /// Nothing is logged here; callers report the source after the
    /// subscriber is installed.
    pub fn load_with_source(cli_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let explicit = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));
        if let Some(path) = explicit {
            let config = Self::from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                let config = Self::from_file(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            searched => Ok((Self::default(), ConfigSource::Defaults { searched })),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.call_timeout_secs == 0 {
            return Err(Error::Config(
                "pipeline.call_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.review.page_size <= 0 {
            return Err(Error::Config("review.page_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Generation service API key (environment, then TOML)
    pub fn generation_api_key(&self) -> Result<String> {
        resolve_secret(
            "Generation API key",
            GENERATION_API_KEY_ENV_VAR,
            self.generation.api_key.as_deref(),
        )
    }

    /// Identity provider API key (environment, then TOML)
    pub fn identity_api_key(&self) -> Result<String> {
        resolve_secret(
            "Identity API key",
            IDENTITY_API_KEY_ENV_VAR,
            self.identity.api_key.as_deref(),
        )
    }

    pub fn identity_base_url(&self) -> Result<String> {
        match self.identity.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => Err(Error::Config(
                "identity.base_url is not configured (auth service URL)".to_string(),
            )),
        }
    }
}

/// Per-user config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("civic").join("civic.toml"))
}

/// Resolve the root folder: CLI → `CIVIC_ROOT_FOLDER` → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &CivicConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("civic"))
        .unwrap_or_else(|| PathBuf::from("./civic_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!("Created root folder: {}", root.display());
    }
    Ok(database_path(root))
}

pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

/// Validate secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve a secret from the environment, falling back to TOML
fn resolve_secret(label: &str, env_var: &str, toml_value: Option<&str>) -> Result<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_value.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} found in both environment and TOML. Using environment ({}).",
            label, env_var
        );
    }

    if let Some(key) = env_key {
        info!("{} loaded from environment variable", label);
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("{} loaded from TOML config", label);
        return Ok(key.to_string());
    }

    Err(Error::Config(format!(
        "{} not configured. Set {} or add it to the TOML config file.",
        label, env_var
    )))
}
