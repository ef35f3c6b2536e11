//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars. Provides helpers to expand `~`
//! and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::rank::FieldWeights;

/// Tantivy refuses writer budgets below this.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;
const MAX_SUGGESTION_DISTANCE: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub field_weights: FieldWeights,
    /// Directory holding one sub-directory per named index. `None` keeps indexes in memory.
    pub index_root: Option<String>,
    pub writer_heap_bytes: usize,
    pub stemmer_language: Option<String>,
    /// Suggestions are proposed when a query matches fewer documents than this.
    pub suggestion_threshold: usize,
    pub max_suggestions: usize,
    pub suggestion_max_distance: u8,
    pub remote_timeout_ms: u64,
    pub spool_dir: Option<String>,
    pub default_index_name: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            field_weights: FieldWeights::default(),
            index_root: None,
            writer_heap_bytes: 50_000_000,
            stemmer_language: None,
            suggestion_threshold: 3,
            max_suggestions: 5,
            suggestion_max_distance: 2,
            remote_timeout_ms: 1_500,
            spool_dir: None,
            default_index_name: "default".to_string(),
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.field_weights.is_valid() {
            return Err(Error::InvalidConfig(format!(
                "search.field_weights must be finite and non-negative: {:?}",
                self.field_weights.0
            )));
        }
        if self.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            return Err(Error::InvalidConfig(format!(
                "search.writer_heap_bytes must be at least {MIN_WRITER_HEAP_BYTES}"
            )));
        }
        if self.suggestion_max_distance > MAX_SUGGESTION_DISTANCE {
            return Err(Error::InvalidConfig(format!(
                "search.suggestion_max_distance must be at most {MAX_SUGGESTION_DISTANCE}"
            )));
        }
        if self.default_index_name.trim().is_empty() {
            return Err(Error::InvalidConfig("search.default_index_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn index_root_path(&self) -> Option<PathBuf> {
        self.index_root.as_deref().map(expand_path)
    }

    pub fn spool_path(&self) -> Option<PathBuf> {
        self.spool_dir.as_deref().map(expand_path)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::default("search", SearchSettings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wraps an already assembled figment, e.g. for tests or embedding hosts.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The `search` table, falling back to defaults when it is absent.
    pub fn search_settings(&self) -> Result<SearchSettings> {
        let settings = if self.figment.find_value("search").is_ok() {
            self.get::<SearchSettings>("search")?
        } else {
            SearchSettings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        match env {
            "prod" | "production" => {
                // Production must persist its indexes.
                let settings = self.search_settings()?;
                if settings.index_root.is_none() {
                    return Err(Error::InvalidConfig(
                        "search.index_root is required when RUST_ENV=prod".into(),
                    ));
                }
            }
            _ => {
                self.search_settings()?;
            }
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
