//! The `Storage` trait: read and write access to a hierarchical object store.
//!
//! The trait is implemented by storage backends (e.g.
//! `sparkify-store-object`). The pipeline depends on this abstraction, not on
//! any concrete backend. All paths are relative to the backend's root.

use std::future::Future;

use datafusion::prelude::DataFrame;
use serde::{Deserialize, Serialize};

// ─── Write options ───────────────────────────────────────────────────────────

/// What to do when the destination of a columnar write already has data.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
  /// Delete the whole destination tree before writing.
  #[default]
  Overwrite,
  /// Add new files next to the existing ones.
  Append,
  /// Fail if the destination holds any object.
  ErrorIfExists,
}

/// What a columnar write produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
  pub rows:        u64,
  /// Data files this write added.
  pub files:       usize,
  /// Distinct directories holding those files (1 for an unpartitioned write
  /// with data).
  pub directories: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a blob store holding JSON input and columnar output.
///
/// Each call completes (or fails) before returning; callers sequence calls
/// to obtain ordering guarantees. A failure leaves no guarantee about partial
/// output, and no retry is attempted.
pub trait Storage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Scan every JSON object in the files matching `pattern`. The schema is
  /// inferred from the data.
  fn read_json<'a>(
    &'a self,
    pattern: &'a str,
  ) -> impl Future<Output = Result<DataFrame, Self::Error>> + Send + 'a;

  /// Scan the columnar files matching `pattern`, recovering `key=value`
  /// partition directories as trailing columns.
  fn read_columnar<'a>(
    &'a self,
    pattern: &'a str,
  ) -> impl Future<Output = Result<DataFrame, Self::Error>> + Send + 'a;

  /// Execute `df` and write it under `path` as columnar files, one directory
  /// level per entry of `partition_by`. Partition columns are not stored in
  /// the files.
  fn write_columnar<'a>(
    &'a self,
    df: DataFrame,
    path: &'a str,
    partition_by: &'a [&'a str],
    mode: WriteMode,
  ) -> impl Future<Output = Result<WriteSummary, Self::Error>> + Send + 'a;

  /// Delete every object under `path`, returning how many were removed.
  fn delete_prefix<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}
