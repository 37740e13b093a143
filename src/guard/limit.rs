//! Row ceiling enforcement
//!
//! Only the outermost row-count clause bounds what the database returns, so
//! LIMIT and FETCH inside parentheses are left alone. Every rewrite is
//! re-parsed; text whose bound cannot be confirmed is wrapped in an outer
//! query that carries the ceiling.

use sqlparser::ast::{Expr, Statement, Value as SqlValue};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::lexer::{lex, significant, LexKind, Lexeme};

/// Words that end a LIMIT argument at the top level
const LIMIT_TERMINATORS: &[&str] = &["OFFSET", "FETCH", "FOR"];

/// Guarantee the query returns at most `ceiling` rows.
///
/// A top-level literal count above the ceiling is lowered to it; a count at
/// or below the ceiling is kept. Non-literal counts (`ALL`, parameters,
/// expressions) are replaced by the ceiling. Without any row-count clause,
/// one trailing terminator is dropped and `LIMIT <ceiling>` appended.
pub fn enforce(accepted: &str, ceiling: u64) -> String {
    let rewritten = rewrite(accepted, ceiling);

    match row_bound(&rewritten) {
        Some(bound) if bound <= ceiling => rewritten,
        bound => {
            tracing::warn!(?bound, ceiling, "Row bound not confirmed by parser, wrapping query");
            wrap(accepted, ceiling)
        }
    }
}

/// Literal row bound of the top-level query, as PostgreSQL would read it
pub fn row_bound(sql: &str) -> Option<u64> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    let query = match statements.as_slice() {
        [Statement::Query(query)] => query,
        _ => return None,
    };

    let limit = query.limit.as_ref().map(literal_count);
    let fetch = query.fetch.as_ref().map(|fetch| {
        if fetch.percent || fetch.with_ties {
            return None;
        }
        // Omitted count means one row
        fetch.quantity.as_ref().map_or(Some(1), literal_count)
    });

    match (limit.flatten(), fetch.flatten()) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn literal_count(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n.parse().ok(),
        Expr::Nested(inner) => literal_count(inner),
        _ => None,
    }
}

fn wrap(sql: &str, ceiling: u64) -> String {
    let body = strip_terminator(sql);
    let separator = if ends_in_line_comment(body) { "\n" } else { "" };
    format!("SELECT * FROM ({}{}) AS bounded LIMIT {}", body, separator, ceiling)
}

fn rewrite(accepted: &str, ceiling: u64) -> String {
    let lexemes = significant(accepted);
    let mut depth = 0usize;

    for (i, lexeme) in lexemes.iter().enumerate() {
        if lexeme.is_symbol(accepted, '(') {
            depth += 1;
        } else if lexeme.is_symbol(accepted, ')') {
            depth = depth.saturating_sub(1);
        } else if depth > 0 {
            continue;
        } else if lexeme.is_word(accepted, "LIMIT") {
            return enforce_limit(accepted, lexeme, &lexemes[i + 1..], ceiling);
        } else if lexeme.is_word(accepted, "FETCH") {
            if let Some(rewritten) = enforce_fetch(accepted, &lexemes[i + 1..], ceiling) {
                return rewritten;
            }
        }
    }

    append_limit(accepted, ceiling)
}

fn enforce_limit(sql: &str, keyword: &Lexeme, rest: &[Lexeme], ceiling: u64) -> String {
    let count = &rest[..argument_len(sql, rest)];

    if count.is_empty() {
        tracing::debug!(ceiling, "LIMIT without a count, inserting ceiling");
        return format!("{} {}{}", &sql[..keyword.end], ceiling, &sql[keyword.end..]);
    }

    clamp_count(sql, count, ceiling)
}

/// `FETCH {FIRST|NEXT} [count] {ROW|ROWS} ...`; `None` when the clause is malformed
fn enforce_fetch(sql: &str, rest: &[Lexeme], ceiling: u64) -> Option<String> {
    let first = rest.first()?;
    if !(first.is_word(sql, "FIRST") || first.is_word(sql, "NEXT")) {
        return None;
    }

    let rows_at = rest
        .iter()
        .position(|l| l.is_word(sql, "ROW") || l.is_word(sql, "ROWS"))?;
    let count = &rest[1..rows_at];

    // Omitted count means one row
    if count.is_empty() {
        return Some(sql.to_string());
    }

    Some(clamp_count(sql, count, ceiling))
}

fn clamp_count(sql: &str, count: &[Lexeme], ceiling: u64) -> String {
    if let [single] = count {
        if single.kind == LexKind::Number {
            match single.text(sql).parse::<u64>() {
                Ok(n) if n <= ceiling => return sql.to_string(),
                Ok(n) => tracing::debug!(requested = n, ceiling, "Clamping row limit"),
                Err(_) => tracing::debug!(ceiling, "Row limit is not an integer, replacing"),
            }
        }
    }

    let (start, end) = match (count.first(), count.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => return sql.to_string(),
    };

    format!("{}{}{}", &sql[..start], ceiling, &sql[end..])
}

/// Number of lexemes in a LIMIT argument
fn argument_len(sql: &str, rest: &[Lexeme]) -> usize {
    let mut depth = 0usize;

    for (n, lexeme) in rest.iter().enumerate() {
        if lexeme.is_symbol(sql, '(') {
            depth += 1;
        } else if lexeme.is_symbol(sql, ')') {
            if depth == 0 {
                return n;
            }
            depth -= 1;
        } else if depth == 0
            && (lexeme.is_symbol(sql, ';')
                || LIMIT_TERMINATORS.iter().any(|w| lexeme.is_word(sql, w)))
        {
            return n;
        }
    }

    rest.len()
}

fn strip_terminator(sql: &str) -> &str {
    let body = sql.trim_end();
    body.strip_suffix(';').unwrap_or(body).trim_end()
}

/// A trailing line comment would swallow anything appended on the same line
fn ends_in_line_comment(body: &str) -> bool {
    lex(body).last().is_some_and(|l| l.kind == LexKind::LineComment)
}

fn append_limit(sql: &str, ceiling: u64) -> String {
    let body = strip_terminator(sql);
    let separator = if ends_in_line_comment(body) { "\n" } else { " " };

    tracing::debug!(ceiling, "Appending row limit");
    if body.is_empty() {
        return format!("LIMIT {}", ceiling);
    }
    format!("{}{}LIMIT {}", body, separator, ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_large_limit() {
        assert_eq!(
            enforce("SELECT * FROM sales.orders LIMIT 5000", 1000),
            "SELECT * FROM sales.orders LIMIT 1000"
        );
        assert_eq!(
            enforce("SELECT * FROM t LIMIT 5000 OFFSET 20;", 1000),
            "SELECT * FROM t LIMIT 1000 OFFSET 20;"
        );
    }

    #[test]
    fn test_keeps_smaller_limit() {
        let sql = "SELECT name FROM sales.products ORDER BY revenue DESC LIMIT 5";
        assert_eq!(enforce(sql, 1000), sql);
        assert_eq!(enforce("SELECT 1 LIMIT 1000", 1000), "SELECT 1 LIMIT 1000");
    }

    #[test]
    fn test_appends_when_missing() {
        assert_eq!(
            enforce("SELECT * FROM sales.orders", 1000),
            "SELECT * FROM sales.orders LIMIT 1000"
        );
        assert_eq!(enforce("SELECT * FROM t;", 50), "SELECT * FROM t LIMIT 50");
        assert_eq!(
            enforce("SELECT 'LIMIT 5' AS note FROM t", 10),
            "SELECT 'LIMIT 5' AS note FROM t LIMIT 10"
        );
        assert_eq!(enforce("SELECT 1 -- tail", 10), "SELECT 1 -- tail\nLIMIT 10");
    }

    #[test]
    fn test_nested_limit_is_not_top_level() {
        assert_eq!(
            enforce("SELECT * FROM (SELECT * FROM t LIMIT 5) s", 1000),
            "SELECT * FROM (SELECT * FROM t LIMIT 5) s LIMIT 1000"
        );
    }

    #[test]
    fn test_replaces_non_literal_counts() {
        assert_eq!(enforce("SELECT * FROM t LIMIT ALL", 100), "SELECT * FROM t LIMIT 100");
        assert_eq!(enforce("SELECT * FROM t LIMIT $1", 100), "SELECT * FROM t LIMIT 100");
        assert_eq!(
            enforce("SELECT * FROM t LIMIT (SELECT count(*) FROM u) OFFSET 1", 100),
            "SELECT * FROM t LIMIT 100 OFFSET 1"
        );
        assert_eq!(enforce("SELECT * FROM t LIMIT 2.5", 100), "SELECT * FROM t LIMIT 100");
        assert_eq!(enforce("SELECT * FROM t LIMIT", 100), "SELECT * FROM t LIMIT 100");
    }

    #[test]
    fn test_fetch_first() {
        assert_eq!(
            enforce("SELECT * FROM t FETCH FIRST 5000 ROWS ONLY", 1000),
            "SELECT * FROM t FETCH FIRST 1000 ROWS ONLY"
        );
        let sql = "SELECT * FROM t FETCH NEXT ROW ONLY";
        assert_eq!(enforce(sql, 1000), sql);
        let sql = "SELECT * FROM t OFFSET 3 FETCH FIRST 10 ROWS ONLY";
        assert_eq!(enforce(sql, 1000), sql);
    }

    #[test]
    fn test_limit_word_in_identifiers() {
        assert_eq!(
            enforce("SELECT limit_x, \"limit\" FROM t", 7),
            "SELECT limit_x, \"limit\" FROM t LIMIT 7"
        );
    }

    #[test]
    fn test_escape_string_cannot_hide_the_tail() {
        let sql = r"SELECT name FROM sales.orders WHERE name <> E'\' LIMIT 5 OFFSET '";
        let bounded = enforce(sql, 1000);
        assert_eq!(bounded, format!("{} LIMIT 1000", sql));
        assert_eq!(row_bound(&bounded), Some(1000));
    }

    #[test]
    fn test_unconfirmed_bound_is_wrapped() {
        let sql = "SELECT * FROM t ORDER BY a FETCH FIRST 5 ROWS WITH TIES;";
        assert_eq!(
            enforce(sql, 1000),
            concat!(
                "SELECT * FROM (SELECT * FROM t ORDER BY a FETCH FIRST 5 ROWS WITH TIES) ",
                "AS bounded LIMIT 1000",
            )
        );
        assert_eq!(row_bound(&enforce(sql, 1000)), Some(1000));
    }

    #[test]
    fn test_row_bound() {
        assert_eq!(row_bound("SELECT * FROM t LIMIT 10 OFFSET 3"), Some(10));
        assert_eq!(row_bound("SELECT * FROM t FETCH NEXT ROW ONLY"), Some(1));
        assert_eq!(row_bound("SELECT * FROM (SELECT * FROM t LIMIT 5) s"), None);
        assert_eq!(row_bound("SELECT * FROM t LIMIT ALL"), None);
        assert_eq!(row_bound("SELECT * FROM t LIMIT $1"), None);
        assert_eq!(row_bound("not sql at all"), None);
    }

    #[test]
    fn test_idempotent() {
        for sql in [
            "SELECT * FROM t",
            "SELECT * FROM t LIMIT 5000",
            "SELECT * FROM t LIMIT ALL;",
            "SELECT * FROM (SELECT 1 LIMIT 9) s",
            "SELECT * FROM t FETCH FIRST 9999 ROWS ONLY",
            "SELECT * FROM t FETCH FIRST 5 ROWS WITH TIES",
        ] {
            let once = enforce(sql, 1000);
            assert_eq!(enforce(&once, 1000), once, "not idempotent for {}", sql);
        }
    }
}
