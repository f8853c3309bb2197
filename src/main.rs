//! previewsweep
//!
//! Removes preview renditions (preview folders and images) from a content
//! repository in bounded batches and keeps the search index in step.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cleaner::config::{CleanupConfig, CleanupMode};
use cleaner::sql::{SqlContentStore, SqlIndex};
use cleaner::{CleanupReport, DeletionEvent, DeletionKind, PreviewCleaner};
use common::cli::{CommonArgs, utils};
use common::config::Configuration;

#[derive(Parser, Debug)]
#[command(name = "previewsweep")]
#[command(about = "Bulk removal of document preview renditions")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a cleanup (default)
    Run(RunArgs),
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Per-run overrides of the `[cleaner]` configuration section
#[derive(Args, Debug, Default)]
struct RunArgs {
    #[arg(long, help = "Only clean below this repository path")]
    path: Option<String>,

    #[arg(long, value_enum, help = "Which previews to remove")]
    mode: Option<CleanupMode>,

    #[arg(long, help = "Delete preview images with a higher index (0 disables)")]
    max_index: Option<i32>,

    #[arg(long, help = "Maximum number of concurrent deletions")]
    parallelism: Option<usize>,

    #[arg(long, help = "Candidate page size")]
    block_size: Option<usize>,

    #[arg(long, help = "Log what would be deleted without deleting")]
    dry_run: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Configuration) {
        let cleaner = &mut config.cleaner;

        if let Some(path) = &self.path {
            cleaner.path = Some(path.clone());
        }
        if let Some(mode) = self.mode {
            cleaner.mode = mode;
        }
        if let Some(max_index) = self.max_index {
            cleaner.max_index = max_index;
        }
        if let Some(parallelism) = self.parallelism {
            cleaner.max_degree_of_parallelism = parallelism;
        }
        if let Some(block_size) = self.block_size {
            cleaner.block_size = block_size;
        }
        if self.dry_run {
            cleaner.dry_run = true;
        }
    }
}

fn log_deletion(event: DeletionEvent) {
    match event.kind {
        DeletionKind::Folder => log::debug!("Preview folder {} deleted", event.node_id),
        DeletionKind::Image => log::debug!("Preview image {} deleted", event.node_id),
    }
}

fn log_report(report: &CleanupReport) {
    for phase in &report.phases {
        log::info!(
            "{}: {} pages, {} deleted, {} retained, {} failed, {} dry-run{}",
            phase.phase,
            phase.pages,
            phase.deleted,
            phase.retained,
            phase.failed,
            phase.dry_run,
            if phase.inconclusive {
                " (inconclusive)"
            } else {
                ""
            }
        );
    }

    let metrics = &report.metrics;
    log::info!(
        "Cleanup finished in {}ms: {} folders and {} images deleted, {} index terms removed",
        report.duration_ms,
        metrics.folders_deleted,
        metrics.images_deleted,
        metrics.index_terms
    );

    if report.failed() > 0 {
        log::warn!(
            "{} preview nodes could not be deleted, see the errors above",
            report.failed()
        );
    }
    if !report.is_conclusive() {
        log::warn!("Some candidate pages could not be loaded; previews may remain");
    }
}

async fn run(config: Configuration) -> Result<()> {
    utils::validate_config(&config)?;

    let store = SqlContentStore::connect(&config.database.dsn)
        .await
        .context("Failed to open content repository")?;
    let index = SqlIndex::connect(&config.index.dsn)
        .await
        .context("Failed to open search index")?;

    let cleaner = PreviewCleaner::resolve(
        CleanupConfig::from(config.cleaner),
        Arc::new(store),
        Arc::new(index),
    )
    .await?
    .with_listener(Arc::new(log_deletion));

    let report = cleaner.execute().await.context("Preview cleanup failed")?;
    log_report(&report);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let mut config = utils::load_config(cli.common.config.as_ref())?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            args.apply(&mut config);
            run(config).await
        }
        Commands::Config { json } => utils::display_config(&config, json),
        Commands::Validate => {
            utils::validate_config(&config)?;
            println!("Configuration is valid");
            Ok(())
        }
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}
