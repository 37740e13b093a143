use serde::Serialize;

use super::Value;

/// Tabular result of one executed query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names, in projection order
    pub columns: Vec<String>,
    /// Rows in the order the database returned them
    pub rows: Vec<Vec<Value>>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let rs = ResultSet::new(
            vec!["name".into(), "revenue".into()],
            vec![
                vec![Value::String("a".into()), Value::Float64(10.0)],
                vec![Value::String("b".into()), Value::Null],
            ],
        );
        assert_eq!(rs.row_count(), 2);
        assert_eq!(
            serde_json::to_value(&rs).unwrap(),
            serde_json::json!({
                "columns": ["name", "revenue"],
                "rows": [["a", 10.0], ["b", null]],
                "execution_time_ms": 0
            })
        );
        assert_eq!(ResultSet::empty().row_count(), 0);
    }
}
