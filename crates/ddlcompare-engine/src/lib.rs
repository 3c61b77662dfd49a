//! ddlcompare engine - comparison and extraction runs
//!
//! This crate drives a run from worklist to report:
//! - Schema comparator (columns, constraints, view bodies)
//! - Default-expression rules
//! - Dependency resolver for extraction
//! - Batch orchestrator with a bounded worker pool
//! - Report aggregation

pub mod aggregator;
pub mod comparator;
pub mod context;
pub mod defaults;
pub mod dependency;
pub mod orchestrator;
pub mod pipeline;
pub mod worklist;

pub use aggregator::Aggregator;
pub use comparator::Comparator;
pub use context::RunContext;
pub use defaults::DefaultRules;
pub use dependency::{DependencyFailure, DependencyResolver, Resolution};
pub use orchestrator::{Orchestrator, RunError};
pub use pipeline::{FetchPolicy, Outcome, Pipeline, PipelineError, Sessions};
pub use worklist::{WorkItem, Worklist};
