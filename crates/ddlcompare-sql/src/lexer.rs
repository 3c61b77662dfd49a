//! Comment stripping and tokenizing
//!
//! Comments are removed with a small scanner that understands string
//! literals and quoted identifiers, then the remaining text goes through
//! the `sqlparser` tokenizer of the matching dialect.

use crate::profile::profile;
use ddlcompare_core::{Dialect, ObjectName};
use sqlparser::dialect::{
    BigQueryDialect, Dialect as SqlDialect, GenericDialect, MsSqlDialect, MySqlDialect,
    PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError, Word};

/// `sqlparser` dialect used to tokenize text of the given dialect
pub fn sql_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::MsSql => Box::new(MsSqlDialect {}),
        Dialect::Snowflake => Box::new(SnowflakeDialect {}),
        Dialect::BigQuery => Box::new(BigQueryDialect {}),
        Dialect::Ansi | Dialect::Teradata => Box::new(GenericDialect {}),
    }
}

/// Remove `--` and `/* */` comments
///
/// Comment markers inside string literals and quoted identifiers are kept.
/// Each comment is replaced by a single space (line comments keep their
/// newline) so neighbouring tokens never fuse.
pub fn strip_comments(sql: &str, bracket_identifiers: bool) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' => {
                out.push(ch);
                copy_quoted(&mut chars, &mut out, ch);
            }
            '[' if bracket_identifiers => {
                out.push(ch);
                copy_quoted(&mut chars, &mut out, ']');
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut depth = 1;
                let mut prev = '\0';
                while let Some(next) = chars.next() {
                    if prev == '/' && next == '*' {
                        depth += 1;
                        prev = '\0';
                        continue;
                    }
                    if prev == '*' && next == '/' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        prev = '\0';
                        continue;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}

fn copy_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String, close: char) {
    for next in chars.by_ref() {
        out.push(next);
        if next == close {
            return;
        }
    }
}

/// Strip comments and tokenize, dropping whitespace tokens
pub fn tokenize(dialect: Dialect, sql: &str) -> Result<Vec<Token>, TokenizerError> {
    let stripped = strip_comments(sql, profile(dialect).bracket_identifiers);
    let sql_dialect = sql_dialect(dialect);
    let tokens = Tokenizer::new(sql_dialect.as_ref(), &stripped).tokenize()?;

    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect())
}

/// Is this token the unquoted keyword `kw` (case-insensitive)?
pub fn is_keyword(token: &Token, kw: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(kw))
}

/// Is this token any of the unquoted keywords?
pub fn is_any_keyword(token: &Token, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| is_keyword(token, kw))
}

/// Fold an identifier: unquoted lower-cased, quoted verbatim
pub fn fold_identifier(word: &Word) -> String {
    match word.quote_style {
        None => word.value.to_lowercase(),
        Some(_) => word.value.clone(),
    }
}

/// Read a dotted object name starting at `pos`
///
/// Returns the name and the position after it. Backtick-quoted parts that
/// contain dots (`project.dataset.table`) are split.
pub fn read_object_name(tokens: &[Token], pos: usize) -> Option<(ObjectName, usize)> {
    let mut parts = Vec::new();
    let mut i = pos;

    loop {
        let Some(Token::Word(word)) = tokens.get(i) else {
            return None;
        };

        if word.quote_style == Some('`') && word.value.contains('.') {
            parts.extend(word.value.split('.').map(str::to_string));
        } else {
            parts.push(fold_identifier(word));
        }
        i += 1;

        if tokens.get(i) == Some(&Token::Period) {
            i += 1;
            continue;
        }
        break;
    }

    Some((ObjectName::new(parts), i))
}

/// Index of the parenthesis closing the one at `open`
pub fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Render tokens back to compact SQL text
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;

    for token in tokens {
        if let Some(p) = prev {
            if needs_space(p, token) {
                out.push(' ');
            }
        }
        out.push_str(&token.to_string());
        prev = Some(token);
    }

    out
}

fn needs_space(prev: &Token, cur: &Token) -> bool {
    match (prev, cur) {
        (Token::LParen | Token::Period | Token::DoubleColon | Token::LBracket, _) => false,
        (
            _,
            Token::RParen
            | Token::Comma
            | Token::Period
            | Token::DoubleColon
            | Token::LBracket
            | Token::RBracket,
        ) => false,
        (Token::Word(_), Token::LParen | Token::Lt) => false,
        (Token::Lt, _) | (_, Token::Gt) => false,
        _ => true,
    }
}

/// Normalized body text: unquoted words upper-cased, single spaces
pub fn normalize_body(tokens: &[Token]) -> String {
    let mut end = tokens.len();
    while end > 0 && tokens[end - 1] == Token::SemiColon {
        end -= 1;
    }

    tokens[..end]
        .iter()
        .map(|token| match token {
            Token::Word(w) if w.quote_style.is_none() => w.value.to_uppercase(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_line_and_block_comments() {
        let sql = "CREATE TABLE t ( -- trailing\n id INT /* inline */ )";
        let stripped = strip_comments(sql, false);
        assert!(!stripped.contains("trailing"));
        assert!(!stripped.contains("inline"));
        assert!(stripped.contains("id INT"));
    }

    #[test]
    fn keeps_comment_markers_inside_literals() {
        let sql = "SELECT '--not a comment', \"a/*b\" FROM t";
        assert_eq!(strip_comments(sql, false), sql);
    }

    #[test]
    fn bracket_identifiers_are_quoted() {
        let sql = "SELECT [odd--name] FROM t";
        assert_eq!(strip_comments(sql, true), sql);
        assert_eq!(strip_comments(sql, false), "SELECT [odd");
    }

    #[test]
    fn nested_block_comments() {
        let stripped = strip_comments("a /* x /* y */ z */ b", false);
        assert_eq!(stripped.split_whitespace().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn tokenize_drops_whitespace_and_comments() {
        let tokens = tokenize(Dialect::Ansi, "a -- c\n , b").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], Token::Comma);
    }

    #[test]
    fn object_names_fold_case() {
        let tokens = tokenize(Dialect::Postgres, "Sales.\"Order Items\" x").unwrap();
        let (name, next) = read_object_name(&tokens, 0).unwrap();
        assert_eq!(name.to_string(), "sales.Order Items");
        assert_eq!(next, 3);
    }

    #[test]
    fn backtick_names_split_on_dots() {
        let tokens = tokenize(Dialect::BigQuery, "`proj.ds.tbl`").unwrap();
        let (name, _) = read_object_name(&tokens, 0).unwrap();
        assert_eq!(name.parts().len(), 3);
        assert_eq!(name.schema(), Some("ds"));
    }

    #[test]
    fn render_is_compact() {
        let tokens = tokenize(Dialect::Postgres, "nextval ( 'seq' :: regclass )").unwrap();
        assert_eq!(render(&tokens), "nextval('seq'::regclass)");
    }

    #[test]
    fn normalize_body_uppercases_words() {
        let tokens = tokenize(Dialect::Ansi, "select a\n  from   t;").unwrap();
        assert_eq!(normalize_body(&tokens), "SELECT A FROM T");
    }
}
