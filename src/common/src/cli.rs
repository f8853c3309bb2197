use clap::Args;
use std::path::PathBuf;

/// CLI arguments shared by every previewsweep command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Log filter derived from the CLI flags. `RUST_LOG` wins when neither
    /// flag is set.
    pub fn log_filter(args: &CommonArgs) -> EnvFilter {
        if args.quiet {
            EnvFilter::new("warn")
        } else if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Initialize logging based on CLI arguments
    pub fn init_logging(args: &CommonArgs) {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter(args))
            .init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            let cleaner = &config.cleaner;
            println!("previewsweep configuration:");
            println!("===========================");
            println!("Database DSN: {}", config.database.dsn);
            println!("Index DSN: {}", config.index.dsn);
            println!(
                "Scope: {}",
                cleaner.path.as_deref().unwrap_or("(whole repository)")
            );
            println!("Mode: {}", cleaner.mode);
            println!("Max index: {}", cleaner.max_index);
            println!(
                "Max degree of parallelism: {}",
                cleaner.max_degree_of_parallelism
            );
            println!("Block size: {}", cleaner.block_size);
            println!("Dry run: {}", cleaner.dry_run);
            println!(
                "Load retry: {} attempts, {:?} apart",
                cleaner.load_retry.max_attempts, cleaner.load_retry.delay
            );
            println!(
                "Delete retry: {} attempts, {:?} apart",
                cleaner.delete_retry.max_attempts, cleaner.delete_retry.delay
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        if config.database.dsn.is_empty() {
            anyhow::bail!("Database DSN cannot be empty");
        }

        if config.index.dsn.is_empty() {
            anyhow::bail!("Index DSN cannot be empty");
        }

        if config.cleaner.load_retry.max_attempts == 0 {
            anyhow::bail!("cleaner.load_retry.max_attempts must be positive");
        }

        if config.cleaner.delete_retry.max_attempts == 0 {
            anyhow::bail!("cleaner.delete_retry.max_attempts must be positive");
        }

        if let Some(path) = &config.cleaner.path {
            if !path.is_empty() && !path.starts_with('/') {
                anyhow::bail!("cleaner.path must be an absolute repository path, got {path}");
            }
        }

        log::info!("Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn test_default_configuration_validates() {
        assert!(utils::validate_config(&Configuration::default()).is_ok());
    }

    #[test]
    fn test_relative_scope_is_invalid() {
        let mut config = Configuration::default();
        config.cleaner.path = Some("Root/Sites".to_string());
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_retry_attempts_is_invalid() {
        let mut config = Configuration::default();
        config.cleaner.delete_retry.max_attempts = 0;
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let args = CommonArgs {
            config: None,
            verbose: true,
            quiet: true,
        };
        assert_eq!(utils::log_filter(&args).to_string(), "warn");
    }
}
