//! Definition sources for DDL comparison
//!
//! A source hands out CREATE TABLE / CREATE VIEW statements for object
//! names. Sources are opened through a [`CatalogConnector`]; each worker
//! owns the [`CatalogSession`]s it opened.
//!
//! ## Backends
//!
//! - [`TextCatalog`] - statements split out of version-controlled SQL files
//! - [`MockCatalog`] - in-memory catalog for tests (latency, failures, call counts)
//! - [`PostgresCatalog`] - live PostgreSQL catalog (enable the `postgres` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use ddlcompare_catalog::{CatalogConnector, TextCatalog};
//! use ddlcompare_core::{Dialect, ObjectName};
//!
//! let catalog = TextCatalog::from_files("git", Dialect::Postgres, &["schema.sql".into()])?;
//! let session = catalog.connect().await?;
//! let orders = session.fetch_definition(&ObjectName::parse("sales.orders")).await?;
//! ```

pub mod mock;
pub mod postgres;
pub mod secrets;
pub mod source;
pub mod text;

pub use mock::{MockCatalog, MockCatalogBuilder};
pub use postgres::PostgresCatalog;
pub use secrets::{Credentials, EnvSecretResolver, SecretError, SecretResolver};
pub use source::{CatalogConnector, CatalogSession, FetchError, ObjectLister};
pub use text::TextCatalog;
