//! CREATE TABLE / CREATE VIEW parsing
//!
//! Parses one statement into a [`SchemaObject`]. The grammar is tolerant:
//! dialect clauses the comparison does not model (storage options, column
//! formats, identity specs) are skipped rather than rejected.

use crate::lexer::{self, fold_identifier, is_any_keyword, is_keyword, normalize_body, read_object_name};
use crate::normalizer::normalize;
use crate::profile::profile;
use ddlcompare_core::{
    ColumnSpec, ConstraintKind, ConstraintSpec, Dialect, ObjectKind, ObjectName, RawStatement,
    SchemaObject,
};
use sqlparser::tokenizer::Token;

/// Words accepted between CREATE and TABLE/VIEW
const CREATE_MODIFIERS: &[&str] = &[
    "TEMPORARY", "TEMP", "VOLATILE", "SET", "MULTISET", "GLOBAL", "LOCAL", "TRANSIENT",
    "EXTERNAL", "MATERIALIZED", "SECURE", "RECURSIVE", "FORCE", "UNLOGGED",
];

/// Words that continue a multi-word type name
const TYPE_CONTINUATIONS: &[&str] = &[
    "PRECISION", "VARYING", "LARGE", "OBJECT", "UNSIGNED", "SIGNED", "ZEROFILL",
];

const INTERVAL_UNITS: &[&str] = &["YEAR", "MONTH", "DAY", "HOUR", "MINUTE", "SECOND", "TO"];

/// Words ending a DEFAULT expression
const DEFAULT_STOP_WORDS: &[&str] = &[
    "NOT", "NULL", "CONSTRAINT", "PRIMARY", "UNIQUE", "REFERENCES", "CHECK", "COLLATE",
    "GENERATED", "AUTO_INCREMENT", "AUTOINCREMENT", "IDENTITY", "COMMENT", "ON", "FORMAT",
    "TITLE", "COMPRESS", "CHARACTER",
];

/// Why a statement could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("empty statement")]
    Empty,

    #[error("unsupported statement: {0}")]
    Unsupported(String),

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of statement, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("tokenizer error: {0}")]
    Tokenize(String),
}

/// DDL parsing error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Object name, when the header was readable
    pub object: Option<ObjectName>,

    /// Original statement text
    pub sql: String,

    /// Reason
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub(crate) fn new(object: Option<ObjectName>, sql: &str, kind: ParseErrorKind) -> Self {
        Self {
            object,
            sql: sql.to_string(),
            kind,
        }
    }

    /// Whether the statement was well-formed but of a kind we do not model
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind, ParseErrorKind::Unsupported(_))
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.object {
            Some(object) => write!(f, "failed to parse {}: {}", object, self.kind),
            None => write!(f, "failed to parse statement: {}", self.kind),
        }
    }
}

impl std::error::Error for ParseError {}

/// DDL parser for one dialect
#[derive(Debug, Clone, Copy)]
pub struct SqlParser {
    dialect: Dialect,
}

impl SqlParser {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse one CREATE TABLE / CREATE VIEW statement
    pub fn parse(&self, sql: &str) -> Result<SchemaObject, ParseError> {
        let tokens = lexer::tokenize(self.dialect, sql)
            .map_err(|e| ParseError::new(None, sql, ParseErrorKind::Tokenize(e.to_string())))?;
        if tokens.is_empty() {
            return Err(ParseError::new(None, sql, ParseErrorKind::Empty));
        }

        let mut cursor = Cursor::new(&tokens);
        let (kind, name) = parse_header(&mut cursor).map_err(|k| ParseError::new(None, sql, k))?;

        let parsed = match kind {
            ObjectKind::Table => self.parse_table(&mut cursor, name.clone()),
            ObjectKind::View => self.parse_view(&mut cursor, name.clone()),
        };
        parsed.map_err(|k| ParseError::new(Some(name), sql, k))
    }

    /// Parse a raw statement, attributing failures to its object name
    pub fn parse_statement(&self, statement: &RawStatement) -> Result<SchemaObject, ParseError> {
        self.parse(&statement.text).map_err(|mut e| {
            e.object.get_or_insert_with(|| statement.name.clone());
            e
        })
    }

    /// Kind and name of a CREATE TABLE/VIEW statement, if it is one
    pub fn peek_header(&self, sql: &str) -> Option<(ObjectKind, ObjectName)> {
        let tokens = lexer::tokenize(self.dialect, sql).ok()?;
        parse_header(&mut Cursor::new(&tokens)).ok()
    }

    fn parse_table(&self, cursor: &mut Cursor<'_>, name: ObjectName) -> Result<SchemaObject, ParseErrorKind> {
        // table options before the column list
        loop {
            match cursor.peek() {
                Some(Token::LParen) => break,
                Some(t) if is_keyword(t, "AS") => {
                    return Err(ParseErrorKind::Unsupported("CREATE TABLE ... AS SELECT".to_string()))
                }
                Some(t) if is_any_keyword(t, &["LIKE", "CLONE"]) => {
                    return Err(ParseErrorKind::Unsupported(format!("CREATE TABLE ... {}", t)))
                }
                Some(_) => {
                    cursor.next();
                }
                None => return Err(cursor.unexpected("column list")),
            }
        }
        cursor.next();

        let mut table = TableBuilder::default();
        loop {
            self.parse_element(cursor, &mut table)?;
            match cursor.next() {
                Some(Token::Comma) => {
                    // trailing comma before the closing paren
                    if cursor.eat(&Token::RParen) {
                        break;
                    }
                }
                Some(Token::RParen) => break,
                Some(other) => {
                    return Err(ParseErrorKind::UnexpectedToken {
                        expected: "',' or ')'".to_string(),
                        found: other.to_string(),
                    })
                }
                None => return Err(cursor.unexpected("')'")),
            }
        }

        if profile(self.dialect).primary_index {
            parse_primary_index(cursor, &mut table)?;
        }

        Ok(table.finish(name, self.dialect))
    }

    fn parse_element(&self, cursor: &mut Cursor<'_>, table: &mut TableBuilder) -> Result<(), ParseErrorKind> {
        let constraint_name = if cursor.eat_keyword("CONSTRAINT") {
            Some(cursor.identifier("constraint name")?)
        } else {
            None
        };

        if let Some(mut constraint) = parse_table_constraint(cursor)? {
            if let Some(name) = constraint_name {
                constraint = constraint.named(name);
            }
            table.constraints.push(constraint);
            return cursor.skip_to_element_end();
        }
        if constraint_name.is_some() || cursor.at_keyword("CHECK") {
            // CHECK or a constraint kind we do not model
            return cursor.skip_to_element_end();
        }
        if cursor.at_keyword("LIKE") {
            return Err(ParseErrorKind::Unsupported("CREATE TABLE (LIKE ...)".to_string()));
        }
        if self.at_index_definition(cursor) {
            return cursor.skip_to_element_end();
        }

        self.parse_column(cursor, table)
    }

    /// `KEY idx (a)` / `INDEX idx (a)` inside the column list
    fn at_index_definition(&self, cursor: &Cursor<'_>) -> bool {
        let Some(first) = cursor.peek() else {
            return false;
        };
        if is_any_keyword(first, &["FULLTEXT", "SPATIAL"]) {
            return true;
        }
        if !is_any_keyword(first, &["KEY", "INDEX"]) {
            return false;
        }
        match cursor.peek_at(1) {
            Some(Token::LParen) => true,
            Some(Token::Word(w)) => profile(self.dialect).type_rule(&w.value.to_uppercase()).is_none(),
            _ => false,
        }
    }

    fn parse_column(&self, cursor: &mut Cursor<'_>, table: &mut TableBuilder) -> Result<(), ParseErrorKind> {
        let name = cursor.identifier("column name")?;
        if table.columns.iter().any(|c| c.name == name) {
            return Err(ParseErrorKind::DuplicateColumn(name));
        }

        let raw_type = parse_type(cursor)?;
        let mut column = ColumnSpec::new(name.clone(), normalize(self.dialect, &raw_type));
        let mut constraint_name = None;

        loop {
            let Some(token) = cursor.peek() else {
                break;
            };
            match token {
                Token::Comma | Token::RParen => break,
                Token::LParen => cursor.skip_group()?,
                t if is_keyword(t, "NOT") => {
                    cursor.next();
                    if cursor.eat_keyword("NULL") {
                        column.nullable = false;
                    } else {
                        // NOT CASESPECIFIC and friends
                        cursor.next();
                    }
                }
                t if is_keyword(t, "NULL") => {
                    cursor.next();
                    column.nullable = true;
                }
                t if is_keyword(t, "DEFAULT") => {
                    cursor.next();
                    column.default = Some(parse_default(cursor)?);
                }
                t if is_keyword(t, "COLLATE") => {
                    cursor.next();
                    column.collation = Some(cursor.collation_name()?);
                }
                t if is_keyword(t, "CONSTRAINT") => {
                    cursor.next();
                    constraint_name = Some(cursor.identifier("constraint name")?);
                }
                t if is_keyword(t, "PRIMARY") && cursor.peek_at(1).is_some_and(|n| is_keyword(n, "KEY")) => {
                    cursor.advance(2);
                    table.push_inline(ConstraintSpec::primary_key([name.clone()]), constraint_name.take());
                }
                t if is_keyword(t, "UNIQUE") => {
                    cursor.next();
                    cursor.eat_keyword("KEY");
                    table.push_inline(ConstraintSpec::unique([name.clone()]), constraint_name.take());
                }
                t if is_keyword(t, "REFERENCES") => {
                    cursor.next();
                    let (object, columns) = parse_reference_target(cursor)?;
                    table.push_inline(
                        ConstraintSpec::foreign_key([name.clone()], object, columns),
                        constraint_name.take(),
                    );
                }
                // FORMAT 'x', CHARACTER SET x, AUTO_INCREMENT, COMMENT 'x', ...
                _ => {
                    cursor.next();
                }
            }
        }

        table.columns.push(column);
        Ok(())
    }

    fn parse_view(&self, cursor: &mut Cursor<'_>, name: ObjectName) -> Result<SchemaObject, ParseErrorKind> {
        loop {
            match cursor.peek() {
                Some(Token::LParen) => cursor.skip_group()?,
                Some(t) if is_keyword(t, "AS") => {
                    cursor.next();
                    break;
                }
                Some(_) => {
                    cursor.next();
                }
                None => return Err(cursor.unexpected("AS")),
            }
        }

        let body = normalize_body(cursor.rest());
        if body.is_empty() {
            return Err(cursor.unexpected("view body"));
        }
        Ok(SchemaObject::view(name, self.dialect, body))
    }
}

/// Parse one statement with a throwaway parser
pub fn parse(dialect: Dialect, sql: &str) -> Result<SchemaObject, ParseError> {
    SqlParser::new(dialect).parse(sql)
}

#[derive(Default)]
struct TableBuilder {
    columns: Vec<ColumnSpec>,
    constraints: Vec<ConstraintSpec>,
}

impl TableBuilder {
    fn push_inline(&mut self, constraint: ConstraintSpec, name: Option<String>) {
        let constraint = match name {
            Some(name) => constraint.named(name),
            None => constraint,
        };
        self.constraints.push(constraint);
    }

    fn finish(mut self, name: ObjectName, dialect: Dialect) -> SchemaObject {
        let key_columns: Vec<String> = self
            .constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::PrimaryKey)
            .flat_map(|c| c.columns.iter().cloned())
            .collect();
        for column in &mut self.columns {
            if key_columns.contains(&column.name) {
                column.nullable = false;
            }
        }

        SchemaObject::table(name, dialect, self.columns, self.constraints)
    }
}

/// `[CREATE [OR REPLACE|OR ALTER] [modifiers] | REPLACE] TABLE|VIEW [IF NOT EXISTS] name`
fn parse_header(cursor: &mut Cursor<'_>) -> Result<(ObjectKind, ObjectName), ParseErrorKind> {
    let kind = if cursor.eat_keyword("REPLACE") {
        cursor.expect_keyword("VIEW")?;
        ObjectKind::View
    } else {
        if !cursor.eat_keyword("CREATE") {
            let found = cursor.peek().map(|t| t.to_string()).unwrap_or_default();
            return Err(ParseErrorKind::Unsupported(found));
        }
        if cursor.eat_keyword("OR") && !cursor.eat_keyword("REPLACE") {
            cursor.expect_keyword("ALTER")?;
        }
        while cursor.peek().is_some_and(|t| is_any_keyword(t, CREATE_MODIFIERS)) {
            cursor.next();
        }

        match cursor.next() {
            Some(t) if is_keyword(t, "TABLE") => ObjectKind::Table,
            Some(t) if is_keyword(t, "VIEW") => ObjectKind::View,
            Some(t) => return Err(ParseErrorKind::Unsupported(format!("CREATE {}", t))),
            None => return Err(cursor.unexpected("TABLE or VIEW")),
        }
    };

    cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    let name = cursor.object_name()?;
    Ok((kind, name))
}

/// Table-level PRIMARY KEY / UNIQUE / FOREIGN KEY
fn parse_table_constraint(cursor: &mut Cursor<'_>) -> Result<Option<ConstraintSpec>, ParseErrorKind> {
    if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
        cursor.skip_index_options();
        let columns = cursor.identifier_list()?;
        return Ok(Some(ConstraintSpec::primary_key(columns)));
    }

    if cursor.at_keyword("UNIQUE") {
        cursor.next();
        if !cursor.eat_keyword("KEY") {
            cursor.eat_keyword("INDEX");
        }
        cursor.skip_index_options();
        if !matches!(cursor.peek(), Some(Token::LParen)) {
            cursor.identifier("index name")?;
        }
        let columns = cursor.identifier_list()?;
        return Ok(Some(ConstraintSpec::unique(columns)));
    }

    if cursor.eat_keywords(&["FOREIGN", "KEY"]) {
        if !matches!(cursor.peek(), Some(Token::LParen)) {
            cursor.identifier("index name")?;
        }
        let columns = cursor.identifier_list()?;
        cursor.expect_keyword("REFERENCES")?;
        let (object, ref_columns) = parse_reference_target(cursor)?;
        return Ok(Some(ConstraintSpec::foreign_key(columns, object, ref_columns)));
    }

    Ok(None)
}

/// `name [(cols)]` after REFERENCES
fn parse_reference_target(cursor: &mut Cursor<'_>) -> Result<(ObjectName, Vec<String>), ParseErrorKind> {
    let object = cursor.object_name()?;
    let columns = if matches!(cursor.peek(), Some(Token::LParen)) {
        cursor.identifier_list()?
    } else {
        Vec::new()
    };
    Ok((object, columns))
}

/// Trailing `[UNIQUE] PRIMARY INDEX [name] (cols)`; only the unique form is a key
fn parse_primary_index(cursor: &mut Cursor<'_>, table: &mut TableBuilder) -> Result<(), ParseErrorKind> {
    while !cursor.is_done() {
        if !cursor.eat_keywords(&["UNIQUE", "PRIMARY", "INDEX"]) {
            cursor.next();
            continue;
        }
        if !matches!(cursor.peek(), Some(Token::LParen)) {
            cursor.identifier("index name")?;
        }
        let key = ConstraintSpec::primary_key(cursor.identifier_list()?);
        let duplicate = table
            .constraints
            .iter()
            .any(|c| c.kind == key.kind && c.columns == key.columns);
        if !duplicate {
            table.constraints.push(key);
        }
    }
    Ok(())
}

/// Column type tokens, rendered back to text
fn parse_type(cursor: &mut Cursor<'_>) -> Result<String, ParseErrorKind> {
    let first = match cursor.next() {
        Some(Token::Word(w)) => w.value.to_uppercase(),
        Some(other) => {
            return Err(ParseErrorKind::UnexpectedToken {
                expected: "data type".to_string(),
                found: other.to_string(),
            })
        }
        None => return Err(cursor.unexpected("data type")),
    };
    let start = cursor.pos - 1;
    let interval = first == "INTERVAL";

    if matches!(first.as_str(), "LONG" | "NATIONAL") {
        cursor.next();
    }

    loop {
        match cursor.peek() {
            Some(Token::LParen) => cursor.skip_group()?,
            Some(Token::LBracket) if cursor.peek_at(1) == Some(&Token::RBracket) => cursor.advance(2),
            Some(Token::Lt) => cursor.skip_angle_group()?,
            Some(t) if is_any_keyword(t, TYPE_CONTINUATIONS) => cursor.advance(1),
            Some(t) if interval && is_any_keyword(t, INTERVAL_UNITS) => cursor.advance(1),
            Some(t)
                if is_any_keyword(t, &["WITH", "WITHOUT"])
                    && cursor.peek_at(1).is_some_and(|n| is_any_keyword(n, &["TIME", "LOCAL"])) =>
            {
                cursor.advance(1);
                while cursor.peek().is_some_and(|n| is_any_keyword(n, &["TIME", "LOCAL", "ZONE"])) {
                    cursor.next();
                }
            }
            _ => break,
        }
    }

    let tokens: Vec<Token> = cursor.tokens[start..cursor.pos]
        .iter()
        .map(|t| match t {
            Token::Word(w) => Token::make_word(&w.value, None),
            other => other.clone(),
        })
        .collect();
    Ok(lexer::render(&tokens))
}

/// DEFAULT expression up to the next column modifier
fn parse_default(cursor: &mut Cursor<'_>) -> Result<String, ParseErrorKind> {
    let start = cursor.pos;
    let mut first = true;

    loop {
        match cursor.peek() {
            None | Some(Token::Comma) | Some(Token::RParen) => break,
            Some(Token::LParen) => cursor.skip_group()?,
            Some(t) if !first && is_any_keyword(t, DEFAULT_STOP_WORDS) => break,
            Some(_) => cursor.advance(1),
        }
        first = false;
    }

    if cursor.pos == start {
        return Err(cursor.unexpected("default expression"));
    }
    Ok(lexer::render(&cursor.tokens[start..cursor.pos]))
}

/// Position-tracking view over a token slice
struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.tokens.len());
    }

    fn rest(&self) -> &'a [Token] {
        &self.tokens[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_keyword(&self, kw: &str) -> bool {
        self.peek().is_some_and(|t| is_keyword(t, kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        let found = self.at_keyword(kw);
        if found {
            self.pos += 1;
        }
        found
    }

    /// Consume a keyword sequence, all or nothing
    fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let all = keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_at(i).is_some_and(|t| is_keyword(t, kw)));
        if all {
            self.pos += keywords.len();
        }
        all
    }

    fn eat(&mut self, token: &Token) -> bool {
        let found = self.peek() == Some(token);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseErrorKind> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(kw))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseErrorKind {
        match self.peek() {
            Some(token) => ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token.to_string(),
            },
            None => ParseErrorKind::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<String, ParseErrorKind> {
        match self.peek() {
            Some(Token::Word(w)) => {
                self.pos += 1;
                Ok(fold_identifier(w))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn object_name(&mut self) -> Result<ObjectName, ParseErrorKind> {
        match read_object_name(self.tokens, self.pos) {
            Some((name, next)) => {
                self.pos = next;
                Ok(name)
            }
            None => Err(self.unexpected("object name")),
        }
    }

    fn collation_name(&mut self) -> Result<String, ParseErrorKind> {
        match self.peek() {
            Some(Token::Word(w)) => {
                self.pos += 1;
                Ok(w.value.clone())
            }
            Some(Token::SingleQuotedString(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            _ => Err(self.unexpected("collation name")),
        }
    }

    /// `(a [ASC], b(10), ...)`
    fn identifier_list(&mut self) -> Result<Vec<String>, ParseErrorKind> {
        if !self.eat(&Token::LParen) {
            return Err(self.unexpected("'('"));
        }

        let mut names = Vec::new();
        loop {
            names.push(self.identifier("column name")?);
            // sort order, prefix length
            loop {
                match self.peek() {
                    Some(Token::Comma) | Some(Token::RParen) => break,
                    Some(Token::LParen) => self.skip_group()?,
                    Some(_) => self.advance(1),
                    None => return Err(self.unexpected("')'")),
                }
            }
            if self.eat(&Token::RParen) {
                return Ok(names);
            }
            self.next();
        }
    }

    /// CLUSTERED / NONCLUSTERED and similar
    fn skip_index_options(&mut self) {
        while self
            .peek()
            .is_some_and(|t| is_any_keyword(t, &["CLUSTERED", "NONCLUSTERED", "USING", "BTREE", "HASH"]))
        {
            self.next();
        }
    }

    /// Skip a parenthesized group starting at the cursor
    fn skip_group(&mut self) -> Result<(), ParseErrorKind> {
        match lexer::matching_paren(self.tokens, self.pos) {
            Some(close) => {
                self.pos = close + 1;
                Ok(())
            }
            None => Err(ParseErrorKind::UnexpectedEnd {
                expected: "')'".to_string(),
            }),
        }
    }

    /// Skip `<...>` type parameters
    fn skip_angle_group(&mut self) -> Result<(), ParseErrorKind> {
        let mut depth = 0usize;
        while let Some(token) = self.next() {
            match token {
                Token::Lt => depth += 1,
                Token::Gt => depth = depth.saturating_sub(1),
                Token::ShiftRight => depth = depth.saturating_sub(2),
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
        Err(ParseErrorKind::UnexpectedEnd {
            expected: "'>'".to_string(),
        })
    }

    /// Advance to the `,` or `)` ending the current column-list element
    fn skip_to_element_end(&mut self) -> Result<(), ParseErrorKind> {
        loop {
            match self.peek() {
                Some(Token::Comma) | Some(Token::RParen) => return Ok(()),
                Some(Token::LParen) => self.skip_group()?,
                Some(_) => self.advance(1),
                None => return Err(self.unexpected("')'")),
            }
        }
    }
}
