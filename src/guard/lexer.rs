//! Span-carrying SQL lexer
//!
//! Splits text into lexemes without interpreting grammar. Knows enough about
//! PostgreSQL quoting (single-quoted literals with `''` escapes, `E'...'`
//! literals with backslash escapes, double-quoted identifiers, `$tag$`
//! strings) to tell comment markers in code apart from
//! the same characters inside a literal. Byte spans let callers rewrite the
//! original text in place.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexKind {
    Word,
    QuotedIdent,
    StringLit,
    Number,
    LineComment,
    BlockComment,
    Whitespace,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexKind,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

impl Lexeme {
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.end]
    }

    /// Comments and whitespace
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            LexKind::Whitespace | LexKind::LineComment | LexKind::BlockComment
        )
    }

    pub fn is_word(&self, sql: &str, word: &str) -> bool {
        self.kind == LexKind::Word && self.text(sql).eq_ignore_ascii_case(word)
    }

    pub fn is_symbol(&self, sql: &str, symbol: char) -> bool {
        self.kind == LexKind::Symbol && self.text(sql).starts_with(symbol)
    }
}

/// Lex `sql` into a gapless sequence of lexemes covering the whole input
pub fn lex(sql: &str) -> Vec<Lexeme> {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let offset = |idx: usize| chars.get(idx).map(|(b, _)| *b).unwrap_or(sql.len());

    let mut lexemes = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;
        let next = chars.get(i + 1).map(|(_, c)| *c);

        let (kind, end) = if c.is_whitespace() {
            (LexKind::Whitespace, scan_while(&chars, i + 1, char::is_whitespace))
        } else if c == '-' && next == Some('-') {
            (LexKind::LineComment, scan_while(&chars, i + 2, |c| c != '\n'))
        } else if c == '/' && next == Some('*') {
            match block_comment_end(&chars, i + 2) {
                Some(end) => (LexKind::BlockComment, end),
                // Unterminated: leave the marker in the code stream
                None => (LexKind::Symbol, i + 1),
            }
        } else if matches!(c, 'e' | 'E') && next == Some('\'') {
            (LexKind::StringLit, escaped_literal_end(&chars, i + 1))
        } else if c == '\'' {
            (LexKind::StringLit, quoted_end(&chars, i, '\''))
        } else if c == '"' {
            (LexKind::QuotedIdent, quoted_end(&chars, i, '"'))
        } else if c == '$' {
            match dollar_quoted_end(&chars, i) {
                Some(end) => (LexKind::StringLit, end),
                None => (LexKind::Symbol, i + 1),
            }
        } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            (LexKind::Number, number_end(&chars, i))
        } else if c.is_alphabetic() || c == '_' {
            (
                LexKind::Word,
                scan_while(&chars, i + 1, |c| c.is_alphanumeric() || c == '_' || c == '$'),
            )
        } else {
            (LexKind::Symbol, i + 1)
        };

        lexemes.push(Lexeme {
            kind,
            start: offset(i),
            end: offset(end),
        });
        i = end;
    }

    lexemes
}

/// Lexemes that carry meaning (no whitespace or comments)
pub fn significant(sql: &str) -> Vec<Lexeme> {
    lex(sql).into_iter().filter(|l| !l.is_trivia()).collect()
}

fn scan_while(chars: &[(usize, char)], mut idx: usize, pred: impl Fn(char) -> bool) -> usize {
    while idx < chars.len() && pred(chars[idx].1) {
        idx += 1;
    }
    idx
}

fn block_comment_end(chars: &[(usize, char)], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1))
        .find(|&j| chars[j].1 == '*' && chars[j + 1].1 == '/')
        .map(|j| j + 2)
}

/// End of a quoted run starting at `start`; doubled quotes are escapes.
/// Unterminated runs extend to the end of input.
fn quoted_end(chars: &[(usize, char)], start: usize, quote: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        if chars[j].1 == quote {
            if chars.get(j + 1).map(|(_, c)| *c) == Some(quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    chars.len()
}

/// `E'...'` body starting at the opening quote. A backslash escapes the
/// next character and `''` is still a quote.
fn escaped_literal_end(chars: &[(usize, char)], start: usize) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j].1 {
            '\\' => j += 2,
            '\'' if chars.get(j + 1).map(|(_, c)| *c) == Some('\'') => j += 2,
            '\'' => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// `$tag$ ... $tag$`; `None` for positional parameters like `$1`
fn dollar_quoted_end(chars: &[(usize, char)], start: usize) -> Option<usize> {
    let first = chars.get(start + 1)?.1;
    if first.is_ascii_digit() {
        return None;
    }

    let tag_end = scan_while(chars, start + 1, |c| c.is_alphanumeric() || c == '_');
    if chars.get(tag_end)?.1 != '$' {
        return None;
    }

    let delimiter: Vec<char> = chars[start..=tag_end].iter().map(|(_, c)| *c).collect();
    let body_start = tag_end + 1;
    let closing = (body_start..chars.len()).find(|&j| {
        chars.len() - j >= delimiter.len()
            && chars[j..j + delimiter.len()]
                .iter()
                .map(|(_, c)| *c)
                .eq(delimiter.iter().copied())
    });

    Some(closing.map_or(chars.len(), |j| j + delimiter.len()))
}

fn number_end(chars: &[(usize, char)], start: usize) -> usize {
    let mut j = scan_while(chars, start, |c| c.is_ascii_digit() || c == '.');
    if matches!(chars.get(j).map(|(_, c)| *c), Some('e' | 'E')) {
        let mut k = j + 1;
        if matches!(chars.get(k).map(|(_, c)| *c), Some('+' | '-')) {
            k += 1;
        }
        if chars.get(k).is_some_and(|(_, c)| c.is_ascii_digit()) {
            j = scan_while(chars, k, |c| c.is_ascii_digit());
        }
    }
    j
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(LexKind, &str)> {
        lex(sql).iter().map(|l| (l.kind, l.text(sql))).collect()
    }

    #[test]
    fn test_lexemes_cover_input() {
        let sql = "SELECT name, SUM(amount) FROM sales.orders -- trailing\nLIMIT 10";
        let joined: String = lex(sql).iter().map(|l| l.text(sql)).collect();
        assert_eq!(joined, sql);
    }

    #[test]
    fn test_comment_markers_inside_literals() {
        let sql = "SELECT '--not a comment', \"a/*b\" FROM t";
        let lexed = kinds(sql);
        assert!(lexed.contains(&(LexKind::StringLit, "'--not a comment'")));
        assert!(lexed.contains(&(LexKind::QuotedIdent, "\"a/*b\"")));
        assert!(!lexed
            .iter()
            .any(|(k, _)| matches!(k, LexKind::LineComment | LexKind::BlockComment)));
    }

    #[test]
    fn test_escaped_quote() {
        let sql = "'it''s' x";
        assert_eq!(kinds(sql)[0], (LexKind::StringLit, "'it''s'"));
    }

    #[test]
    fn test_escape_string_literal() {
        let sql = r"E'\' LIMIT 5 OFFSET ' x";
        assert_eq!(kinds(sql)[0], (LexKind::StringLit, r"E'\' LIMIT 5 OFFSET '"));

        let sql = r"e'a\\' LIMIT 5";
        assert_eq!(kinds(sql)[0], (LexKind::StringLit, r"e'a\\'"));
        assert!(kinds(sql).contains(&(LexKind::Word, "LIMIT")));

        // Only a standalone prefix starts an escape string
        let sql = r"name'\' LIMIT 5";
        assert_eq!(kinds(sql)[0], (LexKind::Word, "name"));
        assert_eq!(kinds(sql)[1], (LexKind::StringLit, r"'\'"));
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let sql = "a /* one\ntwo */ b";
        assert!(kinds(sql).contains(&(LexKind::BlockComment, "/* one\ntwo */")));
    }

    #[test]
    fn test_unterminated_block_comment_stays_code() {
        let sql = "a /* b";
        let lexed = kinds(sql);
        assert!(lexed.contains(&(LexKind::Symbol, "/")));
        assert!(lexed.contains(&(LexKind::Symbol, "*")));
    }

    #[test]
    fn test_dollar_quotes_and_parameters() {
        let sql = "$$ -- x $$ $1 $tag$a;b$tag$";
        let lexed = kinds(sql);
        assert_eq!(lexed[0], (LexKind::StringLit, "$$ -- x $$"));
        assert!(lexed.contains(&(LexKind::Symbol, "$")));
        assert!(lexed.contains(&(LexKind::Number, "1")));
        assert!(lexed.contains(&(LexKind::StringLit, "$tag$a;b$tag$")));
    }

    #[test]
    fn test_numbers() {
        let sql = "1000 1.5e3 .5";
        let numbers: Vec<&str> = significant(sql).iter().map(|l| l.text(sql)).collect();
        assert_eq!(numbers, vec!["1000", "1.5e3", ".5"]);
    }
}
