//! AskQL: guarded natural-language query pipeline
//!
//! Takes untrusted, machine-generated SQL, proves it safe to run against one
//! access-controlled dataset, executes it with bounded resources, and on
//! failure drives a bounded repair loop through the query synthesizer.
//!
//! # Stages
//!
//! - **Sanitize**: strip comments, collapse terminators, normalize whitespace
//! - **Validate**: ordered policy checks (read-only, single statement,
//!   dataset isolation, injection signatures)
//! - **Limit**: clamp or append a top-level row ceiling
//! - **Execute**: read-only PostgreSQL transaction with timeout and local
//!   retry of transient failures
//! - **Repair**: hand execution errors to the synthesizer, re-validate the
//!   answer from scratch
//!
//! # Example
//!
//! ```no_run
//! use askql::data::Dataset;
//! use askql::guard::{prepare, QueryValidator};
//!
//! let sales = Dataset::named("sales");
//! let prepared = prepare(
//!     "SELECT name FROM sales.products /* top */",
//!     &sales,
//!     &QueryValidator::default(),
//!     1000,
//! )
//! .unwrap();
//! assert_eq!(prepared.sql, "SELECT name FROM sales.products LIMIT 1000");
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod data;
pub mod exec;
pub mod guard;
pub mod pipeline;
pub mod synth;

// Re-export commonly used types
pub use data::{Dataset, ResultSet, Value};
pub use exec::{ExecutionFailure, ExecutionOutcome, QueryExecutor};
pub use guard::{prepare, QueryValidator, RejectReason, ValidationRejection, ValidationVerdict};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput};
