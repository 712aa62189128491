//! Error type for `sparkify-store-object`.

use datafusion::{arrow::error::ArrowError, error::DataFusionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sparkify_core::Error),

  #[error("dataframe error: {0}")]
  DataFusion(#[from] DataFusionError),

  #[error("object store error: {0}")]
  ObjectStore(#[from] object_store::Error),

  #[error("arrow error: {0}")]
  Arrow(#[from] ArrowError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("malformed json in {path}: {source}")]
  Json {
    path:   String,
    #[source]
    source: serde_json::Error,
  },

  /// A JSON document held something other than an object at the top level.
  #[error("expected a json object in {path}, found {found}")]
  NotAnObject { path: String, found: &'static str },

  #[error("no objects match {0:?}")]
  PathNotFound(String),

  #[error("destination {0:?} already holds data")]
  AlreadyExists(String),

  #[error("column not found: {0:?}")]
  ColumnNotFound(String),

  /// Only integers and strings read back from a directory name unchanged.
  #[error("cannot partition by {column:?} of type {data_type}")]
  UnsupportedPartitionType { column: String, data_type: String },

  #[error("partition directory {0:?} repeats a column stored in the files")]
  AmbiguousPartition(String),

  #[error("cannot partition {0:?} by every one of its columns")]
  NoDataColumns(String),

  #[error("files under {0:?} disagree on partition columns")]
  InconsistentPartitions(String),

  #[error("invalid storage location {0:?}")]
  InvalidLocation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
