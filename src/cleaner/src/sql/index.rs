use async_trait::async_trait;
use sqlx::{Row, SqlitePool, query};
use tracing::{debug, info};

use super::schema::init_index_schema;
use super::{connect_pool, subtree_pattern};
use crate::error::IndexError;
use crate::model::NodeId;
use crate::store::{IndexField, IndexTerm, IndexWriter};

/// Search index documents stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqlIndex {
    pool: SqlitePool,
}

impl SqlIndex {
    pub async fn connect(dsn: &str) -> Result<Self, sqlx::Error> {
        let pool = connect_pool(dsn).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        init_index_schema(&pool).await?;
        info!("Search index schema initialized");
        Ok(Self { pool })
    }

    pub async fn add_document(&self, node_id: NodeId, path: &str) -> Result<(), sqlx::Error> {
        query("INSERT INTO index_documents (node_id, path) VALUES (?, ?)")
            .bind(node_id)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Paths of every indexed document, sorted.
    pub async fn document_paths(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = query("SELECT path FROM index_documents ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| row.try_get("path")).collect()
    }
}

#[async_trait]
impl IndexWriter for SqlIndex {
    async fn remove_entries(&self, terms: Vec<IndexTerm>) -> Result<(), IndexError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;

        for term in &terms {
            let result = match term.field {
                IndexField::Path => {
                    query("DELETE FROM index_documents WHERE path = ?")
                        .bind(&term.value)
                        .execute(&mut *tx)
                        .await?
                }
                IndexField::InTree => {
                    query(r"DELETE FROM index_documents WHERE path = ? OR path LIKE ? ESCAPE '\'")
                        .bind(&term.value)
                        .bind(subtree_pattern(&term.value))
                        .execute(&mut *tx)
                        .await?
                }
            };
            removed += result.rows_affected();
        }

        tx.commit().await?;
        debug!(terms = terms.len(), removed, "Index documents removed");

        Ok(())
    }
}
