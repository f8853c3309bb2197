//! SQLite-backed content repository and search index.

mod content_store;
mod index;
mod schema;

pub use content_store::{NewNode, SqlContentStore};
pub use index::SqlIndex;

use sqlx::SqlitePool;
use tracing::{error, info};

/// Add `mode=rwc` so the database file is created when missing.
pub(crate) fn with_create_mode(dsn: &str) -> String {
    if dsn.contains("mode=") {
        dsn.to_string()
    } else if dsn.contains('?') {
        format!("{dsn}&mode=rwc")
    } else {
        format!("{dsn}?mode=rwc")
    }
}

pub(crate) async fn connect_pool(dsn: &str) -> Result<SqlitePool, sqlx::Error> {
    let dsn = with_create_mode(dsn);
    info!(dsn = %dsn, "Connecting to SQLite database");

    SqlitePool::connect(&dsn).await.inspect_err(|e| {
        error!(dsn = %dsn, error = %e, "Failed to connect to SQLite database");
    })
}

/// Escape LIKE metacharacters; patterns using it need `ESCAPE '\'`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// LIKE pattern for every path strictly below `path`.
pub(crate) fn subtree_pattern(path: &str) -> String {
    format!("{}/%", escape_like(path.trim_end_matches('/')))
}
