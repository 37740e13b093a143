//! Query policy checks
//!
//! Checks run in a fixed order and stop at the first failure, so the same
//! candidate always produces the same rejection reason.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;
use std::sync::OnceLock;

use crate::data::Dataset;

/// Mutating, administrative and procedural keywords
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL",
];

/// Prefix PostgreSQL reserves for system relations. `pg_catalog` is searched
/// before any `search_path` entry, so unqualified names with this prefix
/// resolve outside the dataset.
const SYSTEM_RELATION_PREFIX: &str = "pg_";

/// `Accepted(sanitized text)` or `Rejected(reason)`
pub type ValidationVerdict = Result<String, ValidationRejection>;

/// Why a candidate was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    ForbiddenKeyword(String),
    NotAReadQuery,
    MultipleStatements,
    CommentPresent,
    CrossSchemaAccess(String),
    UnqualifiedTable(String),
    UnknownTable(String),
    SuspiciousPattern(String),
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Empty => "EMPTY",
            RejectReason::ForbiddenKeyword(_) => "FORBIDDEN_KEYWORD",
            RejectReason::NotAReadQuery => "NOT_A_READ_QUERY",
            RejectReason::MultipleStatements => "MULTIPLE_STATEMENTS",
            RejectReason::CommentPresent => "COMMENT_PRESENT",
            RejectReason::CrossSchemaAccess(_) => "CROSS_SCHEMA_ACCESS",
            RejectReason::UnqualifiedTable(_) => "UNQUALIFIED_TABLE",
            RejectReason::UnknownTable(_) => "UNKNOWN_TABLE",
            RejectReason::SuspiciousPattern(_) => "SUSPICIOUS_PATTERN",
        }
    }

    /// Keyword, namespace, table or pattern the reason refers to
    pub fn subject(&self) -> Option<&str> {
        match self {
            RejectReason::ForbiddenKeyword(s)
            | RejectReason::CrossSchemaAccess(s)
            | RejectReason::UnqualifiedTable(s)
            | RejectReason::UnknownTable(s)
            | RejectReason::SuspiciousPattern(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject() {
            Some(subject) => write!(f, "{}({})", self.code(), subject),
            None => write!(f, "{}", self.code()),
        }
    }
}

/// A policy rejection: reason code plus human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct ValidationRejection {
    pub reason: RejectReason,
    pub detail: String,
}

impl ValidationRejection {
    fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// How table references without a namespace qualifier are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnqualifiedTablePolicy {
    /// Trust the session search path to resolve them into the dataset.
    /// System relation names are still refused.
    #[default]
    Accept,
    /// Every reference must name the dataset namespace explicitly
    RequireQualified,
    /// Every reference must name a table in the dataset's catalog allowlist
    CheckCatalog,
}

impl std::str::FromStr for UnqualifiedTablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "require-qualified" | "require_qualified" => Ok(Self::RequireQualified),
            "check-catalog" | "check_catalog" => Ok(Self::CheckCatalog),
            other => Err(format!("unknown unqualified table policy: {}", other)),
        }
    }
}

/// A table named after FROM or JOIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub namespace: Option<String>,
    pub table: String,
}

/// Policy engine for sanitized candidates
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryValidator {
    unqualified: UnqualifiedTablePolicy,
}

impl QueryValidator {
    pub fn new(unqualified: UnqualifiedTablePolicy) -> Self {
        Self { unqualified }
    }

    pub fn unqualified_policy(&self) -> UnqualifiedTablePolicy {
        self.unqualified
    }

    /// Run every check in order against an already sanitized query
    pub fn validate(&self, sanitized: &str, dataset: &Dataset) -> ValidationVerdict {
        let sql = sanitized.trim();

        let verdict = check_empty(sql)
            .and_then(|_| check_forbidden_keywords(sql))
            .and_then(|_| check_read_only(sql))
            .and_then(|_| check_single_statement(sql))
            .and_then(|_| check_comments(sql))
            .and_then(|_| self.check_isolation(sql, dataset))
            .and_then(|_| check_suspicious_patterns(sql));

        match verdict {
            Ok(()) => Ok(sql.to_string()),
            Err(rejection) => {
                tracing::warn!(
                    dataset = %dataset.name,
                    reason = %rejection.reason,
                    "Query rejected: {}",
                    rejection.detail
                );
                Err(rejection)
            }
        }
    }

    fn check_isolation(&self, sql: &str, dataset: &Dataset) -> Result<(), ValidationRejection> {
        for table_ref in extract_table_refs(sql) {
            let known = || dataset.has_table(&table_ref.table);

            match &table_ref.namespace {
                Some(ns) if !dataset.owns_namespace(ns) => {
                    return Err(ValidationRejection::new(
                        RejectReason::CrossSchemaAccess(ns.clone()),
                        format!("Access denied to schema: {}", ns),
                    ));
                }
                Some(_) => {
                    if self.unqualified == UnqualifiedTablePolicy::CheckCatalog && !known() {
                        return Err(unknown_table(&table_ref.table, dataset));
                    }
                }
                None if is_system_relation(&table_ref.table) => {
                    return Err(ValidationRejection::new(
                        RejectReason::CrossSchemaAccess("pg_catalog".to_string()),
                        format!("Access denied to system relation: {}", table_ref.table),
                    ));
                }
                None => match self.unqualified {
                    UnqualifiedTablePolicy::Accept => {}
                    UnqualifiedTablePolicy::RequireQualified => {
                        return Err(ValidationRejection::new(
                            RejectReason::UnqualifiedTable(table_ref.table.clone()),
                            format!(
                                "Table '{}' must be qualified as {}.{}",
                                table_ref.table, dataset.namespace, table_ref.table
                            ),
                        ));
                    }
                    UnqualifiedTablePolicy::CheckCatalog => {
                        if !known() {
                            return Err(unknown_table(&table_ref.table, dataset));
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// Validate with the default policy (unqualified references accepted)
pub fn validate(sanitized: &str, dataset: &Dataset) -> ValidationVerdict {
    QueryValidator::default().validate(sanitized, dataset)
}

fn is_system_relation(table: &str) -> bool {
    table
        .get(..SYSTEM_RELATION_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SYSTEM_RELATION_PREFIX))
}

fn unknown_table(table: &str, dataset: &Dataset) -> ValidationRejection {
    ValidationRejection::new(
        RejectReason::UnknownTable(table.to_string()),
        format!("Table '{}' is not part of dataset {}", table, dataset.name),
    )
}

fn check_empty(sql: &str) -> Result<(), ValidationRejection> {
    if sql.is_empty() {
        return Err(ValidationRejection::new(RejectReason::Empty, "Empty query"));
    }
    Ok(())
}

fn forbidden_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)\b(?:{})\b", FORBIDDEN_KEYWORDS.join("|"));
        Regex::new(&pattern).expect("forbidden keyword pattern is valid")
    })
}

fn check_forbidden_keywords(sql: &str) -> Result<(), ValidationRejection> {
    if let Some(m) = forbidden_pattern().find(sql) {
        let keyword = m.as_str().to_uppercase();
        return Err(ValidationRejection::new(
            RejectReason::ForbiddenKeyword(keyword.clone()),
            format!("Forbidden operation detected: {}", keyword),
        ));
    }
    Ok(())
}

fn read_query_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^select\b").expect("read query pattern is valid"))
}

fn check_read_only(sql: &str) -> Result<(), ValidationRejection> {
    if !read_query_pattern().is_match(sql) {
        return Err(ValidationRejection::new(
            RejectReason::NotAReadQuery,
            "Only SELECT queries are allowed",
        ));
    }
    Ok(())
}

fn check_single_statement(sql: &str) -> Result<(), ValidationRejection> {
    let body = sql.strip_suffix(';').unwrap_or(sql);
    if body.contains(';') {
        return Err(ValidationRejection::new(
            RejectReason::MultipleStatements,
            "Multiple statements not allowed",
        ));
    }
    Ok(())
}

fn check_comments(sql: &str) -> Result<(), ValidationRejection> {
    if sql.contains("--") || sql.contains("/*") || sql.contains("*/") {
        return Err(ValidationRejection::new(
            RejectReason::CommentPresent,
            "SQL comments not allowed",
        ));
    }
    Ok(())
}

/// Keyword-named functions whose argument list may contain FROM
const FROM_ARGUMENT_FUNCTIONS: &[Keyword] = &[
    Keyword::EXTRACT,
    Keyword::SUBSTRING,
    Keyword::TRIM,
    Keyword::OVERLAY,
];

/// Every table reference after FROM or JOIN, in order of appearance
pub fn extract_table_refs(sql: &str) -> Vec<TableRef> {
    let dialect = PostgreSqlDialect {};
    match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => table_refs_from_tokens(&tokens),
        Err(e) => {
            tracing::debug!("Tokenizer failed ({}), falling back to pattern scan", e);
            table_refs_by_pattern(sql)
        }
    }
}

fn table_refs_from_tokens(tokens: &[Token]) -> Vec<TableRef> {
    let tokens: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect();

    let mut refs = Vec::new();
    // One entry per open parenthesis; false inside function-call arguments
    let mut scopes: Vec<bool> = vec![true];
    let mut i = 0;

    while i < tokens.len() {
        let in_query = scopes.last().copied().unwrap_or(true);

        match tokens[i] {
            Token::LParen => {
                let call = matches!(
                    i.checked_sub(1).and_then(|p| tokens.get(p)),
                    Some(Token::Word(w))
                        if w.keyword == Keyword::NoKeyword
                            || FROM_ARGUMENT_FUNCTIONS.contains(&w.keyword)
                );
                scopes.push(!call);
            }
            Token::RParen => {
                if scopes.len() > 1 {
                    scopes.pop();
                }
            }
            Token::Word(w)
                if in_query && w.keyword == Keyword::FROM && !is_distinct_from(&tokens, i) =>
            {
                i = read_table_list(&tokens, i + 1, true, &mut refs);
                continue;
            }
            Token::Word(w) if in_query && w.keyword == Keyword::JOIN => {
                i = read_table_list(&tokens, i + 1, false, &mut refs);
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    refs
}

/// `a IS [NOT] DISTINCT FROM b`
fn is_distinct_from(tokens: &[&Token], idx: usize) -> bool {
    let keyword_at = |offset: usize| match idx.checked_sub(offset).and_then(|p| tokens.get(p)) {
        Some(Token::Word(w)) => Some(w.keyword),
        _ => None,
    };
    keyword_at(1) == Some(Keyword::DISTINCT)
        && matches!(keyword_at(2), Some(Keyword::IS) | Some(Keyword::NOT))
}

/// Read `name [[AS] alias] [, name ...]`; returns the index after the list
fn read_table_list(
    tokens: &[&Token],
    mut i: usize,
    comma_list: bool,
    refs: &mut Vec<TableRef>,
) -> usize {
    loop {
        while let Some(Token::Word(w)) = tokens.get(i) {
            if matches!(w.keyword, Keyword::ONLY | Keyword::LATERAL) {
                i += 1;
            } else {
                break;
            }
        }

        let Some((table_ref, next)) = read_object_name(tokens, i) else {
            return i;
        };
        refs.push(table_ref);
        i = next;

        if !comma_list {
            return i;
        }

        if let Some(Token::Word(w)) = tokens.get(i) {
            if w.keyword == Keyword::AS {
                i += 1;
                if matches!(tokens.get(i), Some(Token::Word(_))) {
                    i += 1;
                }
            } else if w.keyword == Keyword::NoKeyword {
                i += 1;
            }
        }

        match tokens.get(i) {
            Some(Token::Comma) => i += 1,
            _ => return i,
        }
    }
}

/// `[catalog.][namespace.]table`
fn read_object_name(tokens: &[&Token], mut i: usize) -> Option<(TableRef, usize)> {
    let mut parts = Vec::new();

    match tokens.get(i) {
        Some(Token::Word(w)) => parts.push(w.value.clone()),
        _ => return None,
    }
    i += 1;

    while let (Some(Token::Period), Some(Token::Word(w))) = (tokens.get(i), tokens.get(i + 1)) {
        parts.push(w.value.clone());
        i += 2;
    }

    let table = parts.pop()?;
    let namespace = parts.pop();
    Some((TableRef { namespace, table }, i))
}

fn table_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN)\s+(?:(\w+)\.)?(\w+)").expect("table ref pattern is valid")
    })
}

fn table_refs_by_pattern(sql: &str) -> Vec<TableRef> {
    table_ref_pattern()
        .captures_iter(sql)
        .map(|caps| TableRef {
            namespace: caps.get(1).map(|m| m.as_str().to_string()),
            table: caps[2].to_string(),
        })
        .collect()
}

fn tautology_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bOR\s+(\d+(?:\.\d+)?|'[^']*')\s*=\s*(\d+(?:\.\d+)?|'[^']*')")
            .expect("tautology pattern is valid")
    })
}

fn suspicious_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r";\s*DROP\b", "DROP statement injection"),
            (r";\s*DELETE\b", "DELETE statement injection"),
            (
                r"\b(?:UNION|INTERSECT|EXCEPT)(?:\s+(?:ALL|DISTINCT))?\s+\(?\s*SELECT\b",
                "set operation combining a second SELECT",
            ),
            (r"\bINTO\s+(?:OUTFILE|DUMPFILE)\b", "file write attempt"),
            (r"\bLOAD_FILE\b", "file read attempt"),
            (r"\bpg_(?:read_file|read_binary_file|ls_dir|stat_file)\b", "file read attempt"),
            (r"\blo_(?:import|export)\b", "large object file access"),
            (r"\bxp_cmdshell\b", "command shell access attempt"),
            (r"\bEXEC\b", "EXEC command"),
            (r"\bpg_sleep\w*\b", "time-based probing"),
            (r"\bdblink\w*\b", "cross-database link"),
        ]
        .into_iter()
        .map(|(pattern, description)| {
            let re = Regex::new(&format!("(?i){}", pattern)).expect("suspicious pattern is valid");
            (re, description)
        })
        .collect()
    })
}

fn check_suspicious_patterns(sql: &str) -> Result<(), ValidationRejection> {
    let suspicious = |description: &str| {
        ValidationRejection::new(
            RejectReason::SuspiciousPattern(description.to_string()),
            format!("Suspicious pattern detected: {}", description),
        )
    };

    for caps in tautology_pattern().captures_iter(sql) {
        if caps[1].eq_ignore_ascii_case(&caps[2]) {
            return Err(suspicious("always-true tautology after OR"));
        }
    }

    for (pattern, description) in suspicious_patterns() {
        if pattern.is_match(sql) {
            return Err(suspicious(description));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::sanitize;

    fn sales() -> Dataset {
        Dataset::named("sales")
    }

    fn reason(sql: &str) -> RejectReason {
        validate(&sanitize(sql), &sales()).unwrap_err().reason
    }

    #[test]
    fn test_accepts_plain_select() {
        let verdict = validate("SELECT * FROM sales.orders", &sales());
        assert_eq!(verdict.unwrap(), "SELECT * FROM sales.orders");
    }

    #[test]
    fn test_empty() {
        assert_eq!(reason(""), RejectReason::Empty);
        assert_eq!(reason("   /* nothing */ "), RejectReason::Empty);
    }

    #[test]
    fn test_forbidden_keywords() {
        assert_eq!(
            reason("SELECT * FROM t; DROP TABLE t"),
            RejectReason::ForbiddenKeyword("DROP".into())
        );
        assert_eq!(
            reason("delete from sales.orders"),
            RejectReason::ForbiddenKeyword("DELETE".into())
        );
        assert_eq!(
            reason("SELECT * FROM sales.orders /* hide */ -- x\n; dRoP table x"),
            RejectReason::ForbiddenKeyword("DROP".into())
        );
        assert_eq!(
            reason("SELECT id FROM sales.orders FOR UPDATE"),
            RejectReason::ForbiddenKeyword("UPDATE".into())
        );
        assert_eq!(
            reason(concat!(
                "SELECT * FROM sales.orders WHERE x IN (SELECT 1)\n",
                "UNION ALL\ninsert into y values (1)",
            )),
            RejectReason::ForbiddenKeyword("INSERT".into())
        );
    }

    #[test]
    fn test_earliest_forbidden_keyword_reported() {
        assert_eq!(
            reason("SELECT 1 FROM t WHERE call = 1 OR drop = 2"),
            RejectReason::ForbiddenKeyword("CALL".into())
        );
    }

    #[test]
    fn test_whole_word_matching() {
        let dataset = sales();
        for sql in [
            "SELECT created_at, updated_by, deleted FROM sales.orders",
            "SELECT drop_date, executed_at FROM sales.shipments",
            "SELECT recall FROM sales.products",
        ] {
            assert!(validate(sql, &dataset).is_ok(), "false positive on {}", sql);
        }
    }

    #[test]
    fn test_not_a_read_query() {
        assert_eq!(reason("SHOW search_path"), RejectReason::NotAReadQuery);
        assert_eq!(reason("WITH x AS (SELECT 1) SELECT * FROM x"), RejectReason::NotAReadQuery);
        assert_eq!(reason("SELECTION FROM t"), RejectReason::NotAReadQuery);
    }

    #[test]
    fn test_multiple_statements() {
        assert_eq!(
            reason("SELECT 1 FROM sales.orders; SELECT 2"),
            RejectReason::MultipleStatements
        );
        assert!(validate("SELECT 1 FROM sales.orders;", &sales()).is_ok());
    }

    #[test]
    fn test_comments_rejected_when_they_survive_sanitizing() {
        assert_eq!(
            reason("SELECT '--' FROM sales.orders"),
            RejectReason::CommentPresent
        );
        assert_eq!(reason("SELECT 1 /* open"), RejectReason::CommentPresent);
        let cleaned = sanitize("SeLeCt * from sales.orders /* x */ -- y");
        assert!(validate(&cleaned, &sales()).is_ok());
    }

    #[test]
    fn test_isolation() {
        assert!(validate("SELECT * FROM sales.orders", &sales()).is_ok());
        assert!(validate("SELECT * FROM SALES.orders", &sales()).is_ok());
        assert_eq!(
            reason("SELECT * FROM hr.employees"),
            RejectReason::CrossSchemaAccess("hr".into())
        );
        assert_eq!(
            reason("SELECT * FROM sales.orders o JOIN hr.employees e ON o.rep = e.id"),
            RejectReason::CrossSchemaAccess("hr".into())
        );
    }

    #[test]
    fn test_isolation_sees_comma_lists_and_subqueries() {
        assert_eq!(
            reason("SELECT * FROM sales.orders o, hr.employees e"),
            RejectReason::CrossSchemaAccess("hr".into())
        );
        assert_eq!(
            reason("SELECT * FROM sales.orders WHERE rep IN (SELECT id FROM hr.employees)"),
            RejectReason::CrossSchemaAccess("hr".into())
        );
        assert_eq!(
            reason("SELECT * FROM (sales.orders o JOIN \"HR\".employees e ON o.rep = e.id)"),
            RejectReason::CrossSchemaAccess("HR".into())
        );
        assert_eq!(
            reason("SELECT * FROM prod.pg_catalog.pg_user"),
            RejectReason::CrossSchemaAccess("pg_catalog".into())
        );
    }

    #[test]
    fn test_from_inside_function_arguments_is_not_a_table() {
        let dataset = sales();
        assert!(validate(
            "SELECT EXTRACT(YEAR FROM o.created) AS y FROM sales.orders o",
            &dataset
        )
        .is_ok());
        assert!(validate(
            "SELECT SUBSTRING(o.name FROM 1 FOR 3) FROM sales.orders o",
            &dataset
        )
        .is_ok());
        assert!(validate(
            "SELECT * FROM sales.orders o WHERE o.a IS DISTINCT FROM o.b",
            &dataset
        )
        .is_ok());
    }

    #[test]
    fn test_unqualified_policies() {
        let dataset = Dataset::named("sales").with_tables(["orders", "products"]);
        let sql = "SELECT * FROM orders";

        assert!(QueryValidator::new(UnqualifiedTablePolicy::Accept)
            .validate(sql, &dataset)
            .is_ok());
        assert_eq!(
            QueryValidator::new(UnqualifiedTablePolicy::RequireQualified)
                .validate(sql, &dataset)
                .unwrap_err()
                .reason,
            RejectReason::UnqualifiedTable("orders".into())
        );

        let catalog = QueryValidator::new(UnqualifiedTablePolicy::CheckCatalog);
        assert!(catalog.validate(sql, &dataset).is_ok());
        assert!(catalog.validate("SELECT * FROM sales.products", &dataset).is_ok());
        assert_eq!(
            catalog
                .validate("SELECT * FROM secrets", &dataset)
                .unwrap_err()
                .reason,
            RejectReason::UnknownTable("secrets".into())
        );
    }

    #[test]
    fn test_unqualified_system_relations_rejected() {
        let dataset = Dataset::named("sales").with_tables(["orders", "pg_roles"]);

        for policy in [
            UnqualifiedTablePolicy::Accept,
            UnqualifiedTablePolicy::RequireQualified,
            UnqualifiedTablePolicy::CheckCatalog,
        ] {
            for sql in [
                "SELECT * FROM pg_roles",
                "SELECT usename FROM PG_STAT_ACTIVITY",
                "SELECT * FROM sales.orders o JOIN pg_user u ON o.rep = u.usesysid",
            ] {
                assert_eq!(
                    QueryValidator::new(policy).validate(sql, &dataset).unwrap_err().reason,
                    RejectReason::CrossSchemaAccess("pg_catalog".into()),
                    "{:?} accepted {}",
                    policy,
                    sql
                );
            }
        }

        // Qualified into the dataset and merely pg-like names are fine
        assert!(validate("SELECT * FROM sales.pg_roles", &dataset).is_ok());
        assert!(validate("SELECT * FROM pgroles", &dataset).is_ok());
    }

    #[test]
    fn test_check_catalog_without_allowlist_fails_closed() {
        let catalog = QueryValidator::new(UnqualifiedTablePolicy::CheckCatalog);
        assert_eq!(
            catalog
                .validate("SELECT * FROM orders", &Dataset::named("sales"))
                .unwrap_err()
                .reason,
            RejectReason::UnknownTable("orders".into())
        );
    }

    #[test]
    fn test_suspicious_patterns() {
        assert!(matches!(
            reason("SELECT * FROM sales.orders WHERE id = 1 OR 1=1"),
            RejectReason::SuspiciousPattern(_)
        ));
        assert!(matches!(
            reason("SELECT * FROM sales.orders WHERE name = '' OR 'a' = 'a'"),
            RejectReason::SuspiciousPattern(_)
        ));
        assert!(matches!(
            reason("SELECT name FROM sales.orders UNION SELECT usename FROM sales.x"),
            RejectReason::SuspiciousPattern(_)
        ));
        assert!(matches!(
            reason("SELECT pg_read_file('/etc/passwd')"),
            RejectReason::SuspiciousPattern(_)
        ));
        assert!(matches!(
            reason("SELECT * FROM sales.orders WHERE pg_sleep(10) IS NULL"),
            RejectReason::SuspiciousPattern(_)
        ));
        assert!(matches!(
            reason("SELECT xp_cmdshell('dir')"),
            RejectReason::SuspiciousPattern(_)
        ));
    }

    #[test]
    fn test_non_tautological_or_is_fine() {
        assert!(validate(
            "SELECT * FROM sales.orders WHERE region = 'eu' OR 1 = 2",
            &sales()
        )
        .is_ok());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            RejectReason::CrossSchemaAccess("hr".into()).to_string(),
            "CROSS_SCHEMA_ACCESS(hr)"
        );
        assert_eq!(RejectReason::Empty.to_string(), "EMPTY");
    }

    #[test]
    fn test_table_ref_extraction() {
        let refs = extract_table_refs(
            concat!(
                "SELECT * FROM sales.orders AS o, ONLY \"Sales\".\"Items\" ",
                "JOIN products p ON p.id = o.pid",
            ),
        );
        assert_eq!(
            refs,
            vec![
                TableRef { namespace: Some("sales".into()), table: "orders".into() },
                TableRef { namespace: Some("Sales".into()), table: "Items".into() },
                TableRef { namespace: None, table: "products".into() },
            ]
        );
    }
}
