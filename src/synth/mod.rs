pub mod gemini;
pub mod memory;
pub mod prompts;

pub use gemini::{GeminiConfig, GeminiSynthesizer};
pub use memory::ScriptedSynthesizer;

use async_trait::async_trait;

/// Turns questions into candidate SQL and repairs failed candidates.
///
/// Output is untrusted: the pipeline sanitizes and validates every string
/// returned from here before it can run.
#[async_trait]
pub trait QuerySynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &str,
        schema_description: &str,
        dataset_name: &str,
    ) -> Result<String, SynthError>;

    async fn repair(
        &self,
        question: &str,
        failing_sql: &str,
        error: &str,
        schema_description: &str,
    ) -> Result<String, SynthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Synthesizer returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Synthesizer returned no SQL")]
    Empty,

    #[error("Synthesizer not configured: {0}")]
    NotConfigured(String),
}

/// Strip markdown fences, a trailing terminator and extra whitespace from model output
pub fn clean_sql_response(raw: &str) -> String {
    let fenced = if let Some((_, rest)) = raw.split_once("```sql") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = raw.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        raw
    };

    let trimmed = fenced.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_sql_response() {
        assert_eq!(
            clean_sql_response("```sql\nSELECT name\nFROM sales.products;\n```"),
            "SELECT name FROM sales.products"
        );
        assert_eq!(clean_sql_response("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql_response("  SELECT  1 ; "), "SELECT 1");
        assert_eq!(clean_sql_response(""), "");
    }
}
