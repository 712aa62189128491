//! Core types and trait definitions for the Sparkify ETL job.
//!
//! Tables are DataFusion [`DataFrame`](datafusion::prelude::DataFrame)s. This
//! crate adds what the pipeline needs on top of them: the `Storage`
//! abstraction that backends implement, hierarchical path patterns, and
//! dataframe verbs DataFusion has no built-in for.

pub mod error;
pub mod frame;
pub mod pattern;
pub mod storage;

pub use error::{Error, Result};
pub use frame::with_monotonic_id;
pub use storage::{Storage, WriteMode, WriteSummary};
