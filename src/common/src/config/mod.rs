use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Configuration file picked up from the working directory when no explicit
/// path is given.
pub const DEFAULT_CONFIG_FILE: &str = "previewsweep.toml";

/// Prefix for environment overrides, e.g. `PREVIEWSWEEP__CLEANER__MAX_INDEX=3`.
pub const ENV_PREFIX: &str = "PREVIEWSWEEP__";

/// Which preview artifacts a cleanup run removes.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CleanupMode {
    /// Remove every preview folder below the scope.
    #[default]
    AllVersions,
    /// Remove preview folders of versions that are neither the last major
    /// nor the last minor version of their content.
    KeepLastVersions,
    /// Only sweep preview folders that no longer contain anything.
    EmptyFoldersOnly,
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CleanupMode::AllVersions => "all_versions",
            CleanupMode::KeepLastVersions => "keep_last_versions",
            CleanupMode::EmptyFoldersOnly => "empty_folders_only",
        };
        write!(f, "{s}")
    }
}

/// Content repository database.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/repository.db"),
        }
    }
}

/// Search index backing store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    pub dsn: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/repository.db"),
        }
    }
}

/// Fixed-delay retry budget for one kind of repository operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause between two attempts.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Preview cleanup job settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Repository path the cleanup is limited to. Unset means the whole
    /// repository.
    ///
    /// Env: PREVIEWSWEEP__CLEANER__PATH
    #[serde(default)]
    pub path: Option<String>,

    /// Env: PREVIEWSWEEP__CLEANER__MODE
    #[serde(default)]
    pub mode: CleanupMode,

    /// Number of preview images to keep per version folder. 0 disables
    /// image trimming.
    ///
    /// Env: PREVIEWSWEEP__CLEANER__MAX_INDEX
    #[serde(default)]
    pub max_index: i32,

    /// Env: PREVIEWSWEEP__CLEANER__MAX_DEGREE_OF_PARALLELISM
    #[serde(default = "default_max_degree_of_parallelism")]
    pub max_degree_of_parallelism: usize,

    /// Number of candidates loaded per page.
    ///
    /// Env: PREVIEWSWEEP__CLEANER__BLOCK_SIZE
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Log every decision without deleting anything.
    ///
    /// Env: PREVIEWSWEEP__CLEANER__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,

    /// Abort the run when a candidate page cannot be loaded after all
    /// retries instead of ending the phase early.
    ///
    /// Env: PREVIEWSWEEP__CLEANER__FAIL_ON_INCONCLUSIVE_LOAD
    #[serde(default)]
    pub fail_on_inconclusive_load: bool,

    #[serde(default = "default_load_retry")]
    pub load_retry: RetryConfig,

    #[serde(default = "default_delete_retry")]
    pub delete_retry: RetryConfig,
}

fn default_max_degree_of_parallelism() -> usize {
    10
}

fn default_block_size() -> usize {
    500
}

fn default_load_retry() -> RetryConfig {
    RetryConfig::new(3, Duration::from_secs(1))
}

fn default_delete_retry() -> RetryConfig {
    RetryConfig::new(3, Duration::from_secs(3))
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: CleanupMode::default(),
            max_index: 0,
            max_degree_of_parallelism: default_max_degree_of_parallelism(),
            block_size: default_block_size(),
            dry_run: false,
            fail_on_inconclusive_load: false,
            load_retry: default_load_retry(),
            delete_retry: default_delete_retry(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Content repository holding the preview nodes
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Search index kept in sync with deletions
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub cleaner: CleanerConfig,
}

impl Configuration {
    /// Load defaults, `previewsweep.toml` from the working directory and
    /// `PREVIEWSWEEP__` environment overrides, in that order.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
    }

    /// Same as [`Configuration::load`] with an explicit file.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
