use sqlx::{SqlitePool, query};

const CONTENT_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schema_property_sets (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        node_id INTEGER PRIMARY KEY,
        node_type_id INTEGER NOT NULL,
        parent_node_id INTEGER,
        name TEXT NOT NULL,
        path TEXT NOT NULL UNIQUE,
        node_index INTEGER NOT NULL DEFAULT 0,
        last_major_version_id INTEGER,
        last_minor_version_id INTEGER
    )"#,
    "CREATE INDEX IF NOT EXISTS ix_nodes_type ON nodes (node_type_id, node_id)",
    "CREATE INDEX IF NOT EXISTS ix_nodes_parent ON nodes (parent_node_id)",
    r#"
    CREATE TABLE IF NOT EXISTS versions (
        version_id INTEGER PRIMARY KEY,
        node_id INTEGER NOT NULL,
        major_number INTEGER NOT NULL,
        minor_number INTEGER NOT NULL,
        status INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS ix_versions_node ON versions (node_id)",
];

const INDEX_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS index_documents (
        doc_id INTEGER PRIMARY KEY,
        node_id INTEGER NOT NULL,
        path TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS ix_index_documents_path ON index_documents (path)",
];

async fn apply(pool: &SqlitePool, statements: &[&str]) -> Result<(), sqlx::Error> {
    for statement in statements.iter().copied() {
        query(statement).execute(pool).await?;
    }
    Ok(())
}

pub(crate) async fn init_content_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    apply(pool, CONTENT_TABLES).await
}

pub(crate) async fn init_index_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    apply(pool, INDEX_TABLES).await
}
