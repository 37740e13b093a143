//! Candidate query normalization
//!
//! Runs before validation: comments and repeated terminators are the usual way
//! to hide a second statement from substring checks.

use regex::Regex;
use std::sync::OnceLock;

use super::lexer::{lex, LexKind};

fn terminator_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r";(?:\s*;)+").expect("terminator pattern is valid"))
}

/// Strip comments, collapse repeated `;` and normalize whitespace.
///
/// Total and idempotent. A removed comment becomes a single space so tokens on
/// either side stay separate. Markers inside quoted literals are kept; the
/// validator rejects them later.
pub fn sanitize(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());

    for lexeme in lex(raw) {
        match lexeme.kind {
            LexKind::LineComment | LexKind::BlockComment => stripped.push(' '),
            _ => stripped.push_str(lexeme.text(raw)),
        }
    }

    let collapsed = terminator_run().replace_all(&stripped, ";");
    collapsed.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_line_and_block_comments() {
        assert_eq!(
            sanitize("SeLeCt * from sales.orders /* x */ -- y"),
            "SeLeCt * from sales.orders"
        );
        assert_eq!(
            sanitize("SELECT a -- first\n, b /* multi\nline */ FROM t"),
            "SELECT a , b FROM t"
        );
    }

    #[test]
    fn test_comment_between_tokens_keeps_them_apart() {
        assert_eq!(sanitize("SELECT/**/name FROM t"), "SELECT name FROM t");
    }

    #[test]
    fn test_collapses_terminators() {
        assert_eq!(sanitize("SELECT 1;;;"), "SELECT 1;");
        assert_eq!(sanitize("SELECT 1; ;\n;"), "SELECT 1;");
        assert_eq!(
            sanitize("SELECT 1;; DROP TABLE t"),
            "SELECT 1; DROP TABLE t"
        );
    }

    #[test]
    fn test_normalizes_whitespace() {
        assert_eq!(
            sanitize("  SELECT\n\t name\r\n  FROM   t  "),
            "SELECT name FROM t"
        );
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("  -- only a comment"), "");
    }

    #[test]
    fn test_keeps_markers_inside_literals() {
        assert_eq!(
            sanitize("SELECT * FROM t WHERE note = 'a -- b'"),
            "SELECT * FROM t WHERE note = 'a -- b'"
        );
    }

    #[test]
    fn test_unterminated_block_comment_is_kept() {
        assert_eq!(sanitize("SELECT 1 /* open"), "SELECT 1 /* open");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "SeLeCt * from sales.orders /* x */ -- y",
            "-/**/- SELECT 1",
            "/* a -- b */ c -- d /* e */\n f",
            "SELECT 1 /* open -- tail\n*/ x",
            "SELECT ';; --' ; ; ;",
            "SELECT $$ -- $$ /**/ FROM t;;",
            "SELECT 'unterminated -- x",
            "\n\n;;\n",
            "SELECT a/**/-/**/-1",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }
}
