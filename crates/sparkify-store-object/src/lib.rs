//! Object-store backend for the Sparkify ETL job.
//!
//! Implements [`sparkify_core::Storage`] over any [`object_store`] backend:
//! S3 (and compatible endpoints), the local filesystem, or memory. The store
//! is registered on a DataFusion session, which scans the JSON input and
//! writes Snappy-compressed Parquet laid out in Hive-style `column=value`
//! directories.

mod factory;
mod json;
mod partition;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use factory::{Location, StoreOptions};
pub use store::ObjectStorage;

#[cfg(test)]
mod tests;
