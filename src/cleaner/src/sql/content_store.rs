use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, query};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::schema::init_content_schema;
use super::{connect_pool, subtree_pattern};
use crate::error::StoreError;
use crate::model::{
    CandidateKind, CandidateNode, CandidateQuery, LastVersions, NodeId, PREVIEWS_FOLDER_NAME,
    VersionNumber, VersionStatus, path_name,
};
use crate::store::ContentStore;

/// Row to insert into the `nodes` table.
#[derive(Debug, Clone)]
pub struct NewNode<'a> {
    pub node_id: NodeId,
    pub node_type_id: i64,
    pub parent_node_id: Option<NodeId>,
    pub path: &'a str,
    pub node_index: i32,
}

/// Content repository stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqlContentStore {
    pool: SqlitePool,
    // SQLite admits a single writer
    writer: Arc<Mutex<()>>,
}

impl SqlContentStore {
    /// Connect to `dsn`, creating the database file and tables when missing.
    pub async fn connect(dsn: &str) -> Result<Self, sqlx::Error> {
        let pool = connect_pool(dsn).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        init_content_schema(&pool).await?;
        info!("Content repository schema initialized");
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register a node type, returning its identifier. Registering an existing
    /// name returns the existing identifier.
    pub async fn register_type(&self, name: &str) -> Result<i64, sqlx::Error> {
        query("INSERT OR IGNORE INTO schema_property_sets (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        query("SELECT id FROM schema_property_sets WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?
            .try_get("id")
    }

    pub async fn insert_node(&self, node: NewNode<'_>) -> Result<(), sqlx::Error> {
        query(
            r#"
            INSERT INTO nodes (node_id, node_type_id, parent_node_id, name, path, node_index)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(node.node_id)
        .bind(node.node_type_id)
        .bind(node.parent_node_id)
        .bind(path_name(node.path))
        .bind(node.path)
        .bind(node.node_index)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a version of `node_id`, returning the version identifier.
    pub async fn insert_version(
        &self,
        node_id: NodeId,
        version: VersionNumber,
    ) -> Result<i64, sqlx::Error> {
        let result = query(
            r#"
            INSERT INTO versions (node_id, major_number, minor_number, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(node_id)
        .bind(version.major)
        .bind(version.minor)
        .bind(version.status.code())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn set_last_versions(
        &self,
        node_id: NodeId,
        major_version_id: Option<i64>,
        minor_version_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        let result = query(
            "UPDATE nodes SET last_major_version_id = ?, last_minor_version_id = ? WHERE node_id = ?",
        )
        .bind(major_version_id)
        .bind(minor_version_id)
        .bind(node_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Identifiers of every stored node, ascending.
    pub async fn node_ids(&self) -> Result<Vec<NodeId>, sqlx::Error> {
        let rows = query("SELECT node_id FROM nodes ORDER BY node_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| row.try_get("node_id")).collect()
    }

    pub async fn version_count(&self) -> Result<i64, sqlx::Error> {
        query("SELECT COUNT(*) AS n FROM versions")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")
    }
}

fn push_preview_folder_filter(builder: &mut QueryBuilder<'_, Sqlite>) {
    builder
        .push(" AND (n.path LIKE '%/Previews/V%' OR n.name = ")
        .push_bind(PREVIEWS_FOLDER_NAME)
        .push(")");
}

fn version_number(
    content_path: &str,
    major: Option<i32>,
    minor: Option<i32>,
    status: Option<i32>,
) -> Result<Option<VersionNumber>, StoreError> {
    let (Some(major), Some(minor), Some(code)) = (major, minor, status) else {
        return Ok(None);
    };

    let status = VersionStatus::from_code(code).ok_or_else(|| StoreError::UnknownVersionStatus {
        path: content_path.to_string(),
        code,
    })?;

    Ok(Some(VersionNumber::new(major, minor, status)))
}

#[async_trait]
impl ContentStore for SqlContentStore {
    async fn load_candidates(
        &self,
        candidate_query: &CandidateQuery,
    ) -> Result<Vec<CandidateNode>, StoreError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT n.node_id, n.path FROM nodes n WHERE n.node_type_id = ");
        builder
            .push_bind(candidate_query.node_type_id)
            .push(" AND n.node_id > ")
            .push_bind(candidate_query.min_id);

        if let Some(prefix) = &candidate_query.path_prefix {
            builder
                .push(" AND n.path LIKE ")
                .push_bind(subtree_pattern(prefix))
                .push(r" ESCAPE '\'");
        }

        match candidate_query.kind {
            CandidateKind::VersionFolders => push_preview_folder_filter(&mut builder),
            CandidateKind::PreviewRoots => {
                builder.push(" AND n.name = ").push_bind(PREVIEWS_FOLDER_NAME);
            }
            CandidateKind::EmptyFolders => {
                push_preview_folder_filter(&mut builder);
                builder.push(
                    " AND NOT EXISTS (SELECT 1 FROM nodes c WHERE c.parent_node_id = n.node_id)",
                );
            }
            CandidateKind::PreviewImages => {
                builder
                    .push(" AND n.node_index > ")
                    .push_bind(candidate_query.index_threshold.unwrap_or(0));
            }
        }

        builder
            .push(" ORDER BY n.node_id LIMIT ")
            .push_bind(i64::try_from(candidate_query.page_size).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            nodes.push(CandidateNode {
                id: row.try_get("node_id")?,
                path: row.try_get("path")?,
            });
        }
        Ok(nodes)
    }

    async fn delete_physical(&self, node_id: NodeId) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let path: Option<String> = query("SELECT path FROM nodes WHERE node_id = ?")
            .bind(node_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.try_get("path"))
            .transpose()?;

        let Some(path) = path else {
            debug!(node_id, "Node already gone");
            tx.commit().await?;
            return Ok(());
        };
        let below = subtree_pattern(&path);

        query(
            r#"
            DELETE FROM versions WHERE node_id IN (
                SELECT node_id FROM nodes WHERE node_id = ? OR path LIKE ? ESCAPE '\'
            )
            "#,
        )
        .bind(node_id)
        .bind(&below)
        .execute(&mut *tx)
        .await?;

        let removed = query(r"DELETE FROM nodes WHERE node_id = ? OR path LIKE ? ESCAPE '\'")
            .bind(node_id)
            .bind(&below)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        debug!(node_id, path = %path, removed, "Node subtree deleted");

        Ok(())
    }

    async fn last_versions(&self, content_path: &str) -> Result<LastVersions, StoreError> {
        let row = query(
            r#"
            SELECT mj.major_number AS mj_major, mj.minor_number AS mj_minor, mj.status AS mj_status,
                   mn.major_number AS mn_major, mn.minor_number AS mn_minor, mn.status AS mn_status
            FROM nodes n
            LEFT JOIN versions mj ON mj.version_id = n.last_major_version_id
            LEFT JOIN versions mn ON mn.version_id = n.last_minor_version_id
            WHERE n.path = ?
            "#,
        )
        .bind(content_path)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(LastVersions::default());
        };

        Ok(LastVersions {
            major: version_number(
                content_path,
                row.try_get("mj_major")?,
                row.try_get("mj_minor")?,
                row.try_get("mj_status")?,
            )?,
            minor: version_number(
                content_path,
                row.try_get("mn_major")?,
                row.try_get("mn_minor")?,
                row.try_get("mn_status")?,
            )?,
        })
    }

    async fn resolve_type_id(&self, type_name: &str) -> Result<i64, StoreError> {
        let row = query("SELECT id FROM schema_property_sets WHERE name = ?")
            .bind(type_name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("id")?),
            None => Err(StoreError::UnknownType(type_name.to_string())),
        }
    }
}
