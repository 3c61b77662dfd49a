//! Splitting SQL text blobs into CREATE statements

use crate::parser::SqlParser;
use crate::profile::{profile, DialectProfile};
use ddlcompare_core::{Dialect, RawStatement};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted(char),
    LineComment,
    BlockComment(usize),
}

/// Split a text blob into CREATE TABLE/VIEW statements
///
/// Other statements (grants, inserts, comment-only chunks) are skipped.
pub fn split_statements(dialect: Dialect, label: &str, text: &str) -> Vec<RawStatement> {
    let parser = SqlParser::new(dialect);
    let mut statements = Vec::new();

    for chunk in split_text(text, profile(dialect)) {
        match parser.peek_header(chunk) {
            Some((kind, name)) => statements.push(RawStatement::new(label, name, kind, chunk)),
            None => debug!(
                source = label,
                "skipping statement: {}",
                chunk.lines().next().unwrap_or_default()
            ),
        }
    }

    debug!(source = label, count = statements.len(), "split statements");
    statements
}

/// Top-level statement chunks, trimmed, empty ones dropped
///
/// Splits on `;` outside string literals, quoted identifiers, comments and
/// parentheses, and on batch-separator lines.
pub fn split_text<'a>(text: &'a str, profile: &DialectProfile) -> Vec<&'a str> {
    let mut chunks = Vec::new();
    let mut push = |chunk: &'a str| {
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
    };

    let mut start = 0;
    let mut depth = 0usize;
    let mut state = State::Normal;
    let mut at_line_start = true;
    let mut iter = text.char_indices().peekable();

    while let Some((i, ch)) = iter.next() {
        let next = iter.peek().map(|(_, c)| *c);

        match state {
            State::Quoted(close) => {
                if ch == close {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if ch == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(level) => {
                if ch == '*' && next == Some('/') {
                    iter.next();
                    state = if level == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(level - 1)
                    };
                } else if ch == '/' && next == Some('*') {
                    iter.next();
                    state = State::BlockComment(level + 1);
                }
            }
            State::Normal => {
                let separator = profile
                    .batch_separator
                    .filter(|_| at_line_start)
                    .and_then(|sep| separator_line(&text[i..], sep));
                if let Some(len) = separator {
                    push(&text[start..i]);
                    start = i + len;
                    depth = 0;
                    while iter.peek().is_some_and(|(j, _)| *j < start) {
                        iter.next();
                    }
                    at_line_start = false;
                    continue;
                }

                match ch {
                    '\'' | '"' | '`' => state = State::Quoted(ch),
                    '[' if profile.bracket_identifiers => state = State::Quoted(']'),
                    '-' if next == Some('-') => state = State::LineComment,
                    '/' if next == Some('*') => {
                        iter.next();
                        state = State::BlockComment(1);
                    }
                    '(' => depth += 1,
                    ')' => depth = depth.saturating_sub(1),
                    ';' if depth == 0 => {
                        push(&text[start..i]);
                        start = i + 1;
                    }
                    _ => {}
                }
            }
        }

        at_line_start = ch == '\n';
    }
    push(&text[start..]);

    chunks
}

/// Byte length of the line when it is a batch separator (`GO`, `GO 5`)
fn separator_line(rest: &str, separator: &str) -> Option<usize> {
    let line = rest.split('\n').next().unwrap_or_default();
    let mut words = line.split_whitespace();

    let first = words.next()?;
    if !first.eq_ignore_ascii_case(separator) {
        return None;
    }
    match words.next() {
        None => Some(line.len()),
        Some(count) if count.chars().all(|c| c.is_ascii_digit()) && words.next().is_none() => {
            Some(line.len())
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlcompare_core::ObjectKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_on_top_level_semicolons() {
        let text = "CREATE TABLE a (x VARCHAR(10) DEFAULT ';');\n\
                    -- a; comment\n\
                    CREATE VIEW b AS SELECT ';' AS s FROM a; /* ; */\n\
                    CREATE TABLE \"c;d\" (y INT)";
        let chunks = split_text(text, profile(Dialect::Ansi));

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].ends_with("DEFAULT ';')"));
        assert!(chunks[1].starts_with("-- a; comment"));
        assert!(chunks[2].starts_with("/* ; */"));
        assert!(chunks[2].ends_with("\"c;d\" (y INT)"));
    }

    #[test]
    fn batch_separator_lines() {
        let text = "CREATE TABLE dbo.a (x INT)\nGO\nCREATE VIEW dbo.b AS SELECT x FROM dbo.a\n  go 2\n";
        let chunks = split_text(text, profile(Dialect::MsSql));
        assert_eq!(
            chunks,
            vec!["CREATE TABLE dbo.a (x INT)", "CREATE VIEW dbo.b AS SELECT x FROM dbo.a"]
        );

        // GO is only special for dialects with a batch separator
        let ansi = split_text(text, profile(Dialect::Ansi));
        assert_eq!(ansi.len(), 1);
    }

    #[test]
    fn go_inside_an_identifier_is_not_a_separator() {
        assert_eq!(separator_line("GO\nrest", "GO"), Some(2));
        assert_eq!(separator_line("GOTO x", "GO"), None);
        assert_eq!(separator_line("go away", "GO"), None);
    }

    #[test]
    fn non_create_statements_are_skipped() {
        let text = "SET search_path = s;\n\
                    CREATE TABLE s.t (id INT);\n\
                    GRANT SELECT ON s.t TO r;\n\
                    -- only a comment\n;\n\
                    create view s.v as select id from s.t;";
        let statements = split_statements(Dialect::Postgres, "schema.sql", text);

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].name.to_string(), "s.t");
        assert_eq!(statements[0].kind, ObjectKind::Table);
        assert_eq!(statements[0].source, "schema.sql");
        assert_eq!(statements[1].kind, ObjectKind::View);
        assert_eq!(statements[1].text, "create view s.v as select id from s.t");
    }
}
