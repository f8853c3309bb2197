//! Engine-side cleanup settings.

use crate::retry::RetryPolicy;

pub use common::config::CleanupMode;

/// Settings of a single cleanup run.
///
/// Values coming from configuration are clamped rather than rejected:
/// a negative `max_index` becomes 0 and a zero parallelism or page size
/// becomes 1.
#[derive(Clone, Debug)]
pub struct CleanupConfig {
    /// Repository path the run is limited to, without trailing slash.
    pub path: Option<String>,
    pub mode: CleanupMode,
    /// Preview images with an index above this are deleted. 0 disables the
    /// image phase.
    pub max_index: i32,
    pub max_degree_of_parallelism: usize,
    /// Page size of candidate queries.
    pub block_size: usize,
    pub dry_run: bool,
    pub fail_on_inconclusive_load: bool,
    pub load_retry: RetryPolicy,
    pub delete_retry: RetryPolicy,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: CleanupMode::AllVersions,
            max_index: 0,
            max_degree_of_parallelism: 10,
            block_size: 500,
            dry_run: false,
            fail_on_inconclusive_load: false,
            load_retry: RetryPolicy::query(),
            delete_retry: RetryPolicy::deletion(),
        }
    }
}

impl From<common::config::CleanerConfig> for CleanupConfig {
    fn from(config: common::config::CleanerConfig) -> Self {
        CleanupConfig {
            path: config.path,
            mode: config.mode,
            max_index: config.max_index,
            max_degree_of_parallelism: config.max_degree_of_parallelism,
            block_size: config.block_size,
            dry_run: config.dry_run,
            fail_on_inconclusive_load: config.fail_on_inconclusive_load,
            load_retry: config.load_retry.into(),
            delete_retry: config.delete_retry.into(),
        }
        .normalized()
    }
}

impl CleanupConfig {
    /// Apply the clamping rules and strip a trailing slash from the scope.
    pub fn normalized(mut self) -> Self {
        self.path = self
            .path
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty());
        self.max_index = self.max_index.max(0);
        self.max_degree_of_parallelism = self.max_degree_of_parallelism.max(1);
        self.block_size = self.block_size.max(1);
        self
    }

    /// Validate the cleanup configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.load_retry.max_attempts == 0 {
            anyhow::bail!("load_retry.max_attempts must be positive");
        }

        if self.delete_retry.max_attempts == 0 {
            anyhow::bail!("delete_retry.max_attempts must be positive");
        }

        if let Some(path) = &self.path {
            if !path.starts_with('/') {
                anyhow::bail!("path must be an absolute repository path, got {path}");
            }
        }

        Ok(())
    }
}
