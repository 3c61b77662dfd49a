//! Objects referenced by a definition
//!
//! Token-level scan: names after FROM / JOIN (including comma-separated
//! FROM lists) and after REFERENCES. CTE names, table functions and the
//! defined object itself are left out.

use crate::lexer::{self, fold_identifier, is_any_keyword, is_keyword, matching_paren, read_object_name};
use crate::parser::{ParseError, ParseErrorKind, SqlParser};
use ddlcompare_core::{Dialect, ObjectName};
use sqlparser::tokenizer::Token;

/// Words that end a table reference instead of aliasing it
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL", "ON",
    "USING", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "FETCH", "UNION", "EXCEPT",
    "INTERSECT", "MINUS", "WINDOW", "QUALIFY", "SAMPLE", "TABLESAMPLE", "FOR", "WITH",
    "LATERAL", "PIVOT", "UNPIVOT", "AT", "BEFORE", "CHANGES", "START", "CONNECT", "SELECT",
    "INTO", "VALUES", "SET", "WHEN", "THEN", "ELSE", "END",
];

/// Words before `(` that open a subquery or expression group, not a call
const GROUPING_WORDS: &[&str] = &[
    "FROM", "JOIN", "IN", "EXISTS", "AS", "ON", "AND", "OR", "NOT", "WHERE", "SELECT",
    "UNION", "ALL", "ANY", "SOME", "LATERAL", "USING", "THEN", "ELSE", "WHEN", "VALUES", "BY",
    "HAVING",
];

/// Objects referenced by a CREATE TABLE/VIEW statement, in first-seen order
///
/// Unqualified references are returned unqualified.
pub fn referenced_objects(dialect: Dialect, sql: &str) -> Result<Vec<ObjectName>, ParseError> {
    let tokens = lexer::tokenize(dialect, sql)
        .map_err(|e| ParseError::new(None, sql, ParseErrorKind::Tokenize(e.to_string())))?;
    if tokens.is_empty() {
        return Err(ParseError::new(None, sql, ParseErrorKind::Empty));
    }

    let own_name = SqlParser::new(dialect).peek_header(sql).map(|(_, name)| name);
    let ctes = cte_names(&tokens);

    let mut found = Vec::new();
    // one entry per open paren: true when it is a function call
    let mut parens: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let in_call = parens.last().copied().unwrap_or(false);
        let token = &tokens[i];

        if *token == Token::LParen {
            parens.push(is_function_call(&tokens, i));
            i += 1;
        } else if *token == Token::RParen {
            parens.pop();
            i += 1;
        } else if is_keyword(token, "FROM") && !in_call && !follows_keyword(&tokens, i, "DISTINCT") {
            i = read_table_refs(&tokens, i + 1, true, &mut found);
        } else if is_keyword(token, "JOIN") && !in_call {
            i = read_table_refs(&tokens, i + 1, false, &mut found);
        } else if is_keyword(token, "REFERENCES") {
            match read_object_name(&tokens, i + 1) {
                Some((name, next)) => {
                    found.push(name);
                    i = next;
                }
                None => i += 1,
            }
        } else {
            i += 1;
        }
    }

    let mut unique: Vec<ObjectName> = Vec::new();
    for name in found {
        let is_cte = name.parts().len() == 1 && ctes.iter().any(|c| c == name.name());
        let is_self = own_name.as_ref().is_some_and(|own| own.matches(&name));
        if !is_cte && !is_self && !unique.contains(&name) {
            unique.push(name);
        }
    }

    Ok(unique)
}

/// Read `name [alias] [, name [alias] ...]`; returns where scanning resumes
fn read_table_refs(tokens: &[Token], mut i: usize, list: bool, found: &mut Vec<ObjectName>) -> usize {
    loop {
        while tokens.get(i).is_some_and(|t| is_any_keyword(t, &["LATERAL", "ONLY"])) {
            i += 1;
        }

        // a subquery is scanned by the caller
        let Some((name, next)) = read_object_name(tokens, i) else {
            return i;
        };
        if tokens.get(next) == Some(&Token::LParen) {
            // table function
            let Some(close) = matching_paren(tokens, next) else {
                return next;
            };
            i = skip_alias(tokens, close + 1);
        } else {
            found.push(name);
            i = skip_alias(tokens, next);
        }

        if list && tokens.get(i) == Some(&Token::Comma) {
            i += 1;
            continue;
        }
        return i;
    }
}

fn skip_alias(tokens: &[Token], mut i: usize) -> usize {
    let aliased = if tokens.get(i).is_some_and(|t| is_keyword(t, "AS")) {
        i += 1;
        true
    } else {
        false
    };

    match tokens.get(i) {
        Some(t @ Token::Word(_)) if aliased || !is_any_keyword(t, CLAUSE_WORDS) => {
            i += 1;
            // column aliases: t AS x(a, b)
            if tokens.get(i) == Some(&Token::LParen) {
                if let Some(close) = matching_paren(tokens, i) {
                    i = close + 1;
                }
            }
            i
        }
        _ => i,
    }
}

fn is_function_call(tokens: &[Token], open: usize) -> bool {
    if tokens
        .get(open + 1)
        .is_some_and(|t| is_any_keyword(t, &["SELECT", "WITH"]))
    {
        return false;
    }
    match open.checked_sub(1).and_then(|p| tokens.get(p)) {
        Some(prev @ Token::Word(_)) => !is_any_keyword(prev, GROUPING_WORDS),
        _ => false,
    }
}

fn follows_keyword(tokens: &[Token], i: usize, kw: &str) -> bool {
    i.checked_sub(1)
        .and_then(|p| tokens.get(p))
        .is_some_and(|t| is_keyword(t, kw))
}

/// Names bound by `WITH [RECURSIVE] name [(cols)] AS (...) [, ...]`
fn cte_names(tokens: &[Token]) -> Vec<String> {
    let mut names = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if !is_keyword(token, "WITH") {
            continue;
        }
        let mut j = i + 1;
        if tokens.get(j).is_some_and(|t| is_keyword(t, "RECURSIVE")) {
            j += 1;
        }

        loop {
            let Some(Token::Word(word)) = tokens.get(j) else {
                break;
            };
            let name = fold_identifier(word);
            j += 1;

            if tokens.get(j) == Some(&Token::LParen) {
                match matching_paren(tokens, j) {
                    Some(close) => j = close + 1,
                    None => break,
                }
            }
            if !tokens.get(j).is_some_and(|t| is_keyword(t, "AS")) {
                break;
            }
            j += 1;
            while tokens.get(j).is_some_and(|t| is_any_keyword(t, &["NOT", "MATERIALIZED"])) {
                j += 1;
            }
            if tokens.get(j) != Some(&Token::LParen) {
                break;
            }
            names.push(name);

            match matching_paren(tokens, j) {
                Some(close) => j = close + 1,
                None => break,
            }
            if tokens.get(j) == Some(&Token::Comma) {
                j += 1;
            } else {
                break;
            }
        }
    }

    names
}
