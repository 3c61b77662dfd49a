//! Default-expression normalization
//!
//! Two default expressions compare equal when their normalized forms are
//! identical. Normalization folds case outside string literals, collapses
//! whitespace, drops whitespace around punctuation, strips redundant outer
//! parentheses and treats `NULL` as no default. Configured rewrite rules run
//! on the normalized text, which is then normalized again.
//!
//! Pairs that still differ are AMBIGUOUS when either side matches an
//! ambiguity pattern.

use ddlcompare_core::{DefaultRule, DimensionStatus, Mismatch};
use regex::Regex;

/// Ambiguity patterns that always apply (matched against case-folded text)
const BUILTIN_AMBIGUOUS: &[&str] = &[
    // negative interval literals: INTERVAL '-1 day', - INTERVAL '1' DAY
    r"interval\s*'\s*-",
    r"-\s*interval\b",
    // nested subqueries
    r"\(\s*select\b",
];

const PUNCTUATION: &[char] = &['(', ')', ',', ':', '=', '+', '-', '*', '/', '<', '>', '|', '[', ']'];

/// Compiled rewrite and ambiguity rules
#[derive(Debug, Clone)]
pub struct DefaultRules {
    rewrites: Vec<(Regex, String)>,
    ambiguous: Vec<Regex>,
}

impl DefaultRules {
    /// Compile configured rules on top of the built-in ambiguity patterns
    pub fn new(rules: &[DefaultRule], ambiguous: &[String]) -> Result<Self, regex::Error> {
        let rewrites = rules
            .iter()
            .map(|rule| Ok((Regex::new(&rule.pattern)?, rule.replacement.clone())))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let ambiguous = BUILTIN_AMBIGUOUS
            .iter()
            .map(|p| p.to_string())
            .chain(ambiguous.iter().cloned())
            .map(|p| Regex::new(&p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rewrites, ambiguous })
    }

    /// Built-in ambiguity patterns only
    pub fn builtin() -> Self {
        Self {
            rewrites: Vec::new(),
            ambiguous: BUILTIN_AMBIGUOUS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }

    /// Normalized form; `None` for no default or `NULL`
    pub fn normalize(&self, expr: &str) -> Option<String> {
        let mut text = canonical(expr)?;
        if self.rewrites.is_empty() {
            return Some(text);
        }

        for (pattern, replacement) in &self.rewrites {
            text = pattern.replace_all(&text, replacement.as_str()).into_owned();
        }
        canonical(&text)
    }

    /// Does case-folded expression text match an ambiguity pattern?
    pub fn is_ambiguous(&self, text: &str) -> bool {
        self.ambiguous.iter().any(|p| p.is_match(text))
    }

    /// Compare two default expressions
    pub fn compare(&self, source: Option<&str>, target: Option<&str>) -> DimensionStatus {
        let left = source.and_then(|s| self.normalize(s));
        let right = target.and_then(|t| self.normalize(t));
        if left == right {
            return DimensionStatus::Matched;
        }

        let mismatch = Mismatch::new(
            "default",
            source.map(str::trim).unwrap_or("none"),
            target.map(str::trim).unwrap_or("none"),
        );
        let ambiguous = [source, target]
            .into_iter()
            .flatten()
            .any(|text| self.is_ambiguous(&fold_and_collapse(text)));

        if ambiguous {
            DimensionStatus::Ambiguous(mismatch)
        } else {
            DimensionStatus::Mismatched(mismatch)
        }
    }
}

impl Default for DefaultRules {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Case-fold, collapse whitespace and strip outer parentheses
fn canonical(expr: &str) -> Option<String> {
    let folded = fold_and_collapse(expr);
    let text = strip_outer_parens(&folded).trim().to_string();

    if text.is_empty() || text == "null" {
        None
    } else {
        Some(text)
    }
}

fn fold_and_collapse(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for ch in expr.trim().chars() {
        if let Some(close) = quote {
            out.push(ch);
            if ch == close {
                quote = None;
            }
            continue;
        }

        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }

        if pending_space {
            let after_punct = out.ends_with(PUNCTUATION);
            if !out.is_empty() && !after_punct && !PUNCTUATION.contains(&ch) {
                out.push(' ');
            }
            pending_space = false;
        }

        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            out.push(ch);
        } else {
            out.extend(ch.to_lowercase());
        }
    }

    out
}

fn strip_outer_parens(text: &str) -> &str {
    let mut text = text.trim();
    while text.starts_with('(') && closing_paren(text) == Some(text.len() - 1) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

/// Byte index of the parenthesis closing the one at index 0
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, ch) in text.char_indices() {
        match quote {
            Some(close) if ch == close => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}
