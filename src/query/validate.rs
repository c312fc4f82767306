//! Static checks on caller-supplied SQL.
//!
//! Checks run on a masked copy of the query in which the contents of string
//! literals and quoted identifiers are blanked out, byte for byte, so offsets
//! line up with the original text and nothing inside a literal can trip a
//! keyword or structure check.

use super::{QueryError, QueryLimits};
use regex::Regex;
use std::sync::LazyLock;

/// Statements that can change the database or its connection.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "ATTACH", "DETACH", "PRAGMA",
    "VACUUM", "REINDEX", "ANALYZE", "BEGIN", "COMMIT", "ROLLBACK", "SAVEPOINT", "RELEASE",
    "TRUNCATE", "LOAD_EXTENSION",
];

/// Words that end a table reference in a FROM or JOIN list.
const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "JOIN", "LEFT", "RIGHT", "FULL", "INNER", "OUTER", "CROSS", "NATURAL", "ON",
    "USING", "GROUP", "ORDER", "LIMIT", "HAVING", "UNION", "EXCEPT", "INTERSECT", "WINDOW",
    "INDEXED", "NOT",
];

const FULL_TEXT_WORDS: &[&str] = &["match", "bm25", "snippet", "highlight"];

/// Top-level trailing `LIMIT n [OFFSET m]` or `LIMIT m, n`.
static TRAILING_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLIMIT\s+(?:(\d+)(?:\s+OFFSET\s+\d+)?|\d+\s*,\s*(\d+))\s*$")
        .expect("limit pattern is valid")
});

/// A query that passed every static check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    sql: String,
    masked: String,
    placeholders: usize,
}

impl ValidatedQuery {
    /// The single statement, without a trailing `;`.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    /// Lower-cased names of the tables in FROM and JOIN clauses, sorted.
    /// Common table expressions and table-valued functions are left out.
    pub fn tables(&self) -> Vec<String> {
        tables_touched(&tokenize(&self.masked))
    }

    /// Returns true if the query goes through the full-text index.
    pub fn uses_full_text(&self) -> bool {
        tokenize(&self.masked).iter().any(|token| match token {
            Token::Word(w) => {
                let lower = w.to_ascii_lowercase();
                FULL_TEXT_WORDS.contains(&lower.as_str()) || lower.ends_with("_fts")
            }
            Token::Punct(_) => false,
        })
    }

    /// Returns the statement with a top-level trailing LIMIT above `ceiling`
    /// lowered to `ceiling`.
    pub fn clamped_sql(&self, ceiling: usize) -> String {
        let Some(caps) = TRAILING_LIMIT_RE.captures(&self.masked) else {
            return self.sql.clone();
        };
        let Some(count) = caps.get(1).or_else(|| caps.get(2)) else {
            return self.sql.clone();
        };
        if paren_depth(&self.masked[..count.start()]) != 0 {
            return self.sql.clone();
        }

        let requested = count.as_str().parse::<u128>().unwrap_or(u128::MAX);
        if requested <= ceiling as u128 {
            return self.sql.clone();
        }

        let mut sql = self.sql.clone();
        sql.replace_range(count.range(), &ceiling.to_string());
        sql
    }
}

/// Validates a caller-supplied query without executing anything.
///
/// # Errors
///
/// Returns `QueryError::Validation` naming the first rule the query breaks.
pub fn validate(sql: &str, limits: &QueryLimits) -> Result<ValidatedQuery, QueryError> {
    let reject = |reason: String| QueryError::validation(reason, sql);

    if sql.trim().is_empty() {
        return Err(reject("query is empty".into()));
    }

    let length = sql.chars().count();
    if length > limits.max_query_length {
        return Err(reject(format!(
            "query is {} characters, the limit is {}",
            length, limits.max_query_length
        )));
    }

    let masked = mask_literals(sql).map_err(|reason| reject(reason.into()))?;

    // one trailing semicolon is tolerated
    let body = masked.trim_end();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    let end = body.len();
    let start = end - body.trim_start().len();
    let statement = &sql[start..end];
    let masked = &masked[start..end];

    if masked.contains(';') {
        return Err(reject("multiple statements are not allowed".into()));
    }

    check_parentheses(masked).map_err(|reason| reject(reason.into()))?;

    let tokens = tokenize(masked);
    let first = match tokens.first() {
        Some(Token::Word(w)) => w.to_ascii_uppercase(),
        _ => String::new(),
    };
    if first != "SELECT" && first != "WITH" {
        return Err(reject("only SELECT or WITH queries are allowed".into()));
    }

    check_keywords(&tokens).map_err(reject)?;
    let placeholders = count_placeholders(masked).map_err(|reason| reject(reason.into()))?;

    Ok(ValidatedQuery {
        sql: statement.to_string(),
        masked: masked.to_string(),
        placeholders,
    })
}

// ===========================================
// Masking
// ===========================================

/// Blanks the contents of literals and quoted identifiers, keeping the
/// quotes, and rejects comments.
fn mask_literals(sql: &str) -> Result<String, &'static str> {
    let mut masked = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                masked.push(c);
                loop {
                    match chars.next() {
                        None if c == '\'' => return Err("unterminated string literal"),
                        None => return Err("unterminated quoted identifier"),
                        Some(ch) if ch == close => {
                            // a doubled quote escapes itself
                            if close != ']' && chars.peek() == Some(&close) {
                                chars.next();
                                masked.push_str("  ");
                                continue;
                            }
                            masked.push(ch);
                            break;
                        }
                        Some(ch) => {
                            for _ in 0..ch.len_utf8() {
                                masked.push(' ');
                            }
                        }
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => return Err("comments are not allowed"),
            '/' if chars.peek() == Some(&'*') => return Err("comments are not allowed"),
            _ => masked.push(c),
        }
    }

    Ok(masked)
}

// ===========================================
// Structure
// ===========================================

fn paren_depth(masked: &str) -> i64 {
    masked.bytes().fold(0, |depth, b| match b {
        b'(' => depth + 1,
        b')' => depth - 1,
        _ => depth,
    })
}

fn check_parentheses(masked: &str) -> Result<(), &'static str> {
    let mut depth = 0i64;
    for b in masked.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced parentheses");
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err("unbalanced parentheses")
    }
}

fn check_keywords(tokens: &[Token<'_>]) -> Result<(), String> {
    let words: Vec<String> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.to_ascii_uppercase()),
            Token::Punct(_) => None,
        })
        .collect();

    for (i, word) in words.iter().enumerate() {
        if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
            return Err(format!("forbidden keyword {}", word));
        }
        if word == "REPLACE" && words.get(i + 1).map(String::as_str) == Some("INTO") {
            return Err("forbidden keyword REPLACE INTO".into());
        }
    }
    Ok(())
}

/// Counts `?` placeholders. Numbered and named parameters are rejected.
fn count_placeholders(masked: &str) -> Result<usize, &'static str> {
    let bytes = masked.as_bytes();
    let mut count = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        let prev_is_ident = i > 0 && is_ident_byte(bytes[i - 1]);
        match b {
            b'?' if next.is_ascii_digit() => {
                return Err("numbered parameters are not supported, use ?");
            }
            b'?' => count += 1,
            b':' | b'@' | b'$'
                if !prev_is_ident && (next.is_ascii_alphabetic() || next == b'_') =>
            {
                return Err("named parameters are not supported, use ?");
            }
            _ => {}
        }
    }
    Ok(count)
}

// ===========================================
// Tokens
// ===========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Punct(char),
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn tokenize(masked: &str) -> Vec<Token<'_>> {
    let bytes = masked.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_ident_byte(b) {
            let start = i;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            tokens.push(Token::Word(&masked[start..i]));
        } else {
            if !b.is_ascii_whitespace() {
                tokens.push(Token::Punct(b as char));
            }
            i += 1;
        }
    }
    tokens
}

fn is_word(token: Option<&Token<'_>>, keyword: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
}

fn is_clause_keyword(word: &str) -> bool {
    CLAUSE_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

fn tables_touched(tokens: &[Token<'_>]) -> Vec<String> {
    // `name AS (` introduces a common table expression
    let ctes: Vec<String> = tokens
        .windows(3)
        .filter_map(|w| match w {
            [Token::Word(name), Token::Word(kw), Token::Punct('(')]
                if kw.eq_ignore_ascii_case("AS") =>
            {
                Some(name.to_ascii_lowercase())
            }
            _ => None,
        })
        .collect();

    let mut tables: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let in_from = is_word(tokens.get(i), "FROM");
        if !in_from && !is_word(tokens.get(i), "JOIN") {
            i += 1;
            continue;
        }
        i += 1;

        loop {
            let Some(Token::Word(mut name)) = tokens.get(i).copied() else {
                break;
            };
            if is_clause_keyword(name) {
                break;
            }
            i += 1;
            // schema-qualified name
            if tokens.get(i) == Some(&Token::Punct('.'))
                && let Some(Token::Word(qualified)) = tokens.get(i + 1).copied()
            {
                name = qualified;
                i += 2;
            }
            let is_function = tokens.get(i) == Some(&Token::Punct('('));
            let lower = name.to_ascii_lowercase();
            if !is_function && !ctes.contains(&lower) && !tables.contains(&lower) {
                tables.push(lower);
            }

            if is_word(tokens.get(i), "AS") {
                i += 1;
            }
            if let Some(Token::Word(alias)) = tokens.get(i).copied()
                && !is_clause_keyword(alias)
            {
                i += 1;
            }

            if in_from && tokens.get(i) == Some(&Token::Punct(',')) {
                i += 1;
                continue;
            }
            break;
        }
    }

    tables.sort();
    tables
}
