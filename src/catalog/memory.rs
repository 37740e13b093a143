use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

use super::{CatalogError, ColumnInfo, SchemaCatalog};

/// Catalog held in memory, keyed by lowercased namespace
#[derive(Debug, Default)]
pub struct StaticCatalog {
    namespaces: DashMap<String, BTreeMap<String, Vec<ColumnInfo>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, namespace: &str, table: &str, columns: Vec<ColumnInfo>) {
        self.namespaces
            .entry(namespace.to_lowercase())
            .or_default()
            .insert(table.to_string(), columns);
    }
}

#[async_trait]
impl SchemaCatalog for StaticCatalog {
    async fn list_tables(&self, namespace: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .namespaces
            .get(&namespace.to_lowercase())
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_columns(
        &self,
        namespace: &str,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, CatalogError> {
        Ok(self
            .namespaces
            .get(&namespace.to_lowercase())
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default())
    }
}
