//! SQL DDL handling
//!
//! This crate handles:
//! - Splitting SQL text blobs into CREATE statements
//! - Parsing CREATE TABLE / CREATE VIEW into the canonical schema model
//! - Normalizing dialect type tokens and deciding type equivalence
//! - Scanning definitions for referenced objects
//!
//! Tokenizing is delegated to the `sqlparser` tokenizer; the statement
//! grammar itself is parsed here because catalog DDL from several
//! dialects carries clauses no single `sqlparser` dialect accepts.

pub mod lexer;
pub mod normalizer;
pub mod parser;
pub mod profile;
pub mod references;
pub mod splitter;

pub use normalizer::{normalize, TypeEquivalence};
pub use parser::{parse, ParseError, ParseErrorKind, SqlParser};
pub use profile::{profile, DialectProfile, TypeRule};
pub use references::referenced_objects;
pub use splitter::split_statements;
