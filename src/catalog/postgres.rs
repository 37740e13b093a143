use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use super::{CatalogError, ColumnInfo, SchemaCatalog};

/// Catalog backed by `information_schema`
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaCatalog for PgCatalog {
    async fn list_tables(&self, namespace: &str) -> Result<Vec<String>, CatalogError> {
        let rows = sqlx::query(
            "SELECT table_name::text AS table_name \
             FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type IN ('BASE TABLE', 'VIEW') \
             ORDER BY table_name",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("table_name").ok())
            .collect();

        tracing::debug!(namespace, count = tables.len(), "Listed tables");
        Ok(tables)
    }

    async fn list_columns(
        &self,
        namespace: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, CatalogError> {
        let rows = sqlx::query(
            "SELECT column_name::text AS column_name, \
                    data_type::text AS data_type, \
                    is_nullable::text AS is_nullable \
             FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
        )
        .bind(namespace)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo, CatalogError> {
                Ok(ColumnInfo {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                })
            })
            .collect()
    }
}
