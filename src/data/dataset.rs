use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A logical, access-controlled grouping of tables backed by one schema namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Name shown to users and passed to the synthesizer
    pub name: String,
    /// Physical schema the dataset lives in
    pub namespace: String,
    /// Table allowlist, lowercased. `None` when the catalog was not consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<BTreeSet<String>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            tables: None,
        }
    }

    /// Dataset whose name is also its namespace
    pub fn named(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self::new(namespace.clone(), namespace)
    }

    /// Attach the table allowlist reported by the schema catalog
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tables = Some(
            tables
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        );
        self
    }

    /// Case-insensitive namespace comparison
    pub fn owns_namespace(&self, namespace: &str) -> bool {
        self.namespace.eq_ignore_ascii_case(namespace)
    }

    /// Whether `table` is in the allowlist. Always false when no allowlist is loaded.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables
            .as_ref()
            .map(|t| t.contains(&table.to_lowercase()))
            .unwrap_or(false)
    }
}
