pub mod lexer;
pub mod limit;
pub mod sanitizer;
pub mod validator;

pub use limit::enforce;
pub use sanitizer::sanitize;
pub use validator::{
    extract_table_refs, validate, QueryValidator, RejectReason, TableRef, UnqualifiedTablePolicy,
    ValidationRejection, ValidationVerdict,
};

use crate::data::Dataset;

/// A candidate that passed every check and carries a row ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Sanitized text that was validated
    pub validated: String,
    /// Text handed to the executor
    pub sql: String,
    pub ceiling: u64,
}

/// Convenience function to sanitize, validate, and bound a candidate
pub fn prepare(
    candidate: &str,
    dataset: &Dataset,
    validator: &QueryValidator,
    ceiling: u64,
) -> Result<PreparedQuery, ValidationRejection> {
    let sanitized = sanitize(candidate);
    let validated = validator.validate(&sanitized, dataset)?;
    let sql = enforce(&validated, ceiling);

    if sql != validated {
        tracing::debug!(sql = %sql, "Row ceiling applied");
    }

    Ok(PreparedQuery {
        validated,
        sql,
        ceiling,
    })
}
