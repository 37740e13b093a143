pub mod cache;
pub mod memory;
pub mod postgres;

pub use cache::{CacheStats, SchemaCache};
pub use memory::StaticCatalog;
pub use postgres::PgCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

/// Read-only view of the tables and columns in a namespace
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Tables in `namespace`, sorted by name. Empty is a legitimate answer.
    async fn list_tables(&self, namespace: &str) -> Result<Vec<String>, CatalogError>;

    /// Columns of one table in ordinal order
    async fn list_columns(
        &self,
        namespace: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Every table and column of a namespace, as handed to the synthesizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub namespace: String,
    pub tables: Vec<TableSchema>,
}

impl SchemaDescription {
    /// Walk the catalog for one namespace
    pub async fn load(catalog: &dyn SchemaCatalog, namespace: &str) -> Result<Self, CatalogError> {
        let names = catalog.list_tables(namespace).await?;
        let columns =
            futures::future::try_join_all(
                names.iter().map(|name| catalog.list_columns(namespace, name)),
            )
            .await?;

        let tables: Vec<TableSchema> = names
            .into_iter()
            .zip(columns)
            .map(|(name, columns)| TableSchema { name, columns })
            .collect();

        tracing::info!(namespace, tables = tables.len(), "Loaded schema description");
        Ok(Self {
            namespace: namespace.to_string(),
            tables,
        })
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Plain-text rendering used in synthesis and repair prompts
    pub fn render(&self) -> String {
        if self.tables.is_empty() {
            return format!("Schema '{}' has no tables.", self.namespace);
        }

        let rule = "=".repeat(60);
        let thin = "-".repeat(60);
        let mut out = format!("Database Schema: {}\n{}\n", self.namespace, rule);

        for table in &self.tables {
            let _ = writeln!(out, "\nTable: {}.{}", self.namespace, table.name);
            let _ = writeln!(out, "{}", thin);
            for col in &table.columns {
                let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
                let _ = writeln!(out, "  - {}: {} ({})", col.name, col.data_type, nullable);
            }
        }

        out.trim_end().to_string()
    }
}
