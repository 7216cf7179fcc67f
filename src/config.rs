use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::merge::PrecedenceRules;
use crate::validate::ValidationRules;

/// Application configuration loaded from ~/.config/audiobook-meta/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub embedded: EmbeddedSettings,
    #[serde(default)]
    pub merge: MergeSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
}

/// Remote metadata service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Store region passed to every lookup (us, uk, de, ...)
    pub region: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Minimum gap between two requests, shared by every lookup
    pub min_interval_ms: u64,
    /// Total attempts per lookup, first try included
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_factor: u32,
    /// Response cache lifetime; 0 disables the cache
    pub cache_ttl_secs: u64,
    /// Environment variable holding an optional API key
    pub api_key_env: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.audnex.us".to_string(),
            region: "us".to_string(),
            timeout_secs: 10,
            min_interval_ms: 2000,
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_factor: 2,
            cache_ttl_secs: 0,
            api_key_env: "AUDNEXUS_API_KEY".to_string(),
        }
    }
}

impl ApiSettings {
    /// The API key, if its environment variable is set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Audio inspection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedSettings {
    pub ffprobe_path: PathBuf,
    /// Kill ffprobe after this many seconds
    pub timeout_secs: u64,
    /// Skip straight to the in-process readers when false
    pub use_ffprobe: bool,
}

impl Default for EmbeddedSettings {
    fn default() -> Self {
        Self {
            ffprobe_path: PathBuf::from("ffprobe"),
            timeout_secs: 30,
            use_ffprobe: true,
        }
    }
}

/// Per-field precedence overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Field name -> ordered source names (path, embedded, api)
    #[serde(default)]
    pub precedence: BTreeMap<String, Vec<String>>,
    /// Replaces the default union fields when set
    pub union_fields: Option<Vec<String>>,
}

/// Validator field lists; unset lists keep the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSettings {
    pub required: Option<Vec<String>>,
    pub recommended: Option<Vec<String>>,
    pub checklist: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the default path (~/.config/audiobook-meta/config.toml)
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("audiobook-meta").join("config.toml"))
    }

    /// Load from the CLI override when given, else the default path
    pub fn resolve(cli_override: Option<&Path>) -> Result<Self> {
        match cli_override {
            Some(path) if !path.exists() => {
                anyhow::bail!("Config file not found: {}", path.display())
            }
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Defaults with the configured per-field overrides applied
    pub fn precedence(&self) -> Result<PrecedenceRules> {
        PrecedenceRules::from_overrides(
            &self.merge.precedence,
            self.merge.union_fields.as_deref(),
        )
        .context("Invalid [merge] configuration")
    }

    pub fn validation_rules(&self) -> Result<ValidationRules> {
        let v = &self.validation;
        ValidationRules::from_lists(
            v.required.as_deref(),
            v.recommended.as_deref(),
            v.checklist.as_deref(),
        )
        .context("Invalid [validation] configuration")
    }
}
