//! Error types for `sparkify-core`.

use datafusion::{arrow::error::ArrowError, error::DataFusionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("dataframe error: {0}")]
  DataFusion(#[from] DataFusionError),

  #[error("arrow error: {0}")]
  Arrow(#[from] ArrowError),

  #[error("column {0:?} already exists")]
  DuplicateColumn(String),

  #[error("partition {partition} holds more rows than its id range")]
  IdRangeExhausted { partition: usize },

  #[error("invalid path pattern {pattern:?}: {reason}")]
  InvalidPattern { pattern: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
