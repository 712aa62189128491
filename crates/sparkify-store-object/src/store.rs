//! [`ObjectStorage`]: the [`object_store`] implementation of [`Storage`].
//!
//! Listing, pattern matching and deletes talk to the store directly. Scans
//! and writes are DataFusion plans over the same store, which is registered
//! on the session under a private `sparkify://` URL.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use bytes::Bytes;
use datafusion::{
  arrow::{array::AsArray, datatypes::UInt64Type},
  config::TableParquetOptions,
  dataframe::DataFrameWriteOptions,
  execution::object_store::ObjectStoreUrl,
  prelude::{
    DataFrame, NdJsonReadOptions, ParquetReadOptions, SessionContext, ident,
    lit,
  },
};
use futures::{StreamExt as _, TryStreamExt as _, stream};
use object_store::{ObjectStore, PutPayload, path::Path as ObjectPath};
use sparkify_core::{
  Storage, WriteMode, WriteSummary,
  pattern::{PathPattern, split_path},
};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
  Error, Result,
  factory::{Location, StoreOptions, build_object_store},
  json, partition,
};

/// Objects fetched or deleted at once.
const IO_CONCURRENCY: usize = 16;

const SUCCESS_MARKER: &str = "_SUCCESS";
const PARQUET_EXTENSION: &str = "parquet";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Storage rooted at one location of an object store.
///
/// Cloning is cheap; the store and the session are reference-counted.
#[derive(Clone)]
pub struct ObjectStorage {
  ctx:   SessionContext,
  store: Arc<dyn ObjectStore>,
  /// URL the session resolves to `store`.
  base:  String,
  url:   String,
}

impl std::fmt::Debug for ObjectStorage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ObjectStorage")
      .field("url", &self.url)
      .field("base", &self.base)
      .finish()
  }
}

impl ObjectStorage {
  /// Register an already-configured store on `ctx`. `url` is only used for
  /// display.
  pub fn new(
    ctx: &SessionContext,
    url: impl Into<String>,
    store: Arc<dyn ObjectStore>,
  ) -> Result<Self> {
    let base = format!("sparkify://{}", Uuid::new_v4().simple());
    let registered = ObjectStoreUrl::parse(&base)?;
    ctx.register_object_store(registered.as_ref(), store.clone());
    Ok(Self { ctx: ctx.clone(), store, base, url: url.into() })
  }

  /// Resolve `url` (see [`Location`]) and connect to it.
  pub fn open(
    ctx: &SessionContext,
    url: &str,
    options: &StoreOptions,
  ) -> Result<Self> {
    let location = Location::parse(url)?;
    let store = build_object_store(&location, options)?;
    debug!(url, ?location, "opened object storage");
    Self::new(ctx, url, store)
  }

  pub fn url(&self) -> &str { &self.url }

  /// The session this store is registered on.
  pub fn context(&self) -> &SessionContext { &self.ctx }

  pub fn object_store(&self) -> &Arc<dyn ObjectStore> { &self.store }

  fn file_url(&self, location: &ObjectPath) -> String {
    format!("{}/{location}", self.base)
  }

  fn dir_url(&self, location: &ObjectPath) -> String {
    format!("{}/{location}/", self.base)
  }

  /// Every object under `prefix`, sorted by key.
  async fn list(&self, prefix: &ObjectPath) -> Result<Vec<ObjectPath>> {
    let prefix = (!prefix.as_ref().is_empty()).then_some(prefix);
    let mut paths: Vec<ObjectPath> = self
      .store
      .list(prefix)
      .map_ok(|meta| meta.location)
      .try_collect()
      .await?;
    paths.sort();
    Ok(paths)
  }

  /// List from the pattern's literal prefix and keep the visible objects it
  /// selects. Also returns whether anything at all was found under the
  /// prefix.
  async fn resolve(
    &self,
    pattern: &PathPattern,
  ) -> Result<(Vec<ObjectPath>, bool)> {
    let prefix = pattern.literal_prefix();
    let listed = self.list(&ObjectPath::from_iter(prefix.iter().copied())).await?;
    let found_any = !listed.is_empty();

    let selected = listed
      .into_iter()
      .filter(|location| {
        let parts = decoded_parts(location);
        let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
        pattern.matches(&parts) && !is_hidden(&parts[prefix.len()..])
      })
      .collect();
    Ok((selected, found_any))
  }

  async fn fetch_all(
    &self,
    locations: Vec<ObjectPath>,
  ) -> Result<Vec<(ObjectPath, Bytes)>> {
    stream::iter(locations)
      .map(|location| async move {
        let bytes = self.store.get(&location).await?.bytes().await?;
        trace!(%location, size = bytes.len(), "fetched object");
        Ok::<_, Error>((location, bytes))
      })
      .buffered(IO_CONCURRENCY)
      .try_collect()
      .await
  }

  async fn delete_all(&self, locations: Vec<ObjectPath>) -> Result<usize> {
    let count = locations.len();
    stream::iter(locations)
      .map(|location| async move {
        self.store.delete(&location).await?;
        trace!(%location, "deleted object");
        Ok::<_, Error>(())
      })
      .buffer_unordered(IO_CONCURRENCY)
      .try_collect::<Vec<()>>()
      .await?;
    Ok(count)
  }
}

// ─── Storage impl ────────────────────────────────────────────────────────────

impl Storage for ObjectStorage {
  type Error = Error;

  async fn read_json<'a>(&'a self, pattern: &'a str) -> Result<DataFrame> {
    let pattern = PathPattern::parse(pattern)?;
    let (locations, _) = self.resolve(&pattern).await?;
    if locations.is_empty() {
      return Err(Error::PathNotFound(pattern.as_str().to_owned()));
    }

    // The scan only samples one file, so the schema comes from all of them.
    let urls: Vec<String> = locations.iter().map(|l| self.file_url(l)).collect();
    let fetched = self.fetch_all(locations).await?;
    let schema = tokio::task::spawn_blocking(move || {
      let files = fetched
        .iter()
        .map(|(location, bytes)| json::parse_objects(location.as_ref(), bytes))
        .collect::<Result<Vec<_>>>()?;
      json::infer_schema(&files)
    })
    .await??;

    let files = urls.len();
    let options = NdJsonReadOptions::default().schema(&schema).file_extension("");
    let df = self.ctx.read_json(urls, options).await?;
    debug!(
      pattern = pattern.as_str(),
      files,
      columns = schema.fields().len(),
      "read json"
    );
    Ok(df)
  }

  async fn read_columnar<'a>(&'a self, pattern: &'a str) -> Result<DataFrame> {
    let pattern = PathPattern::parse(pattern)?;
    let (locations, found_any) = self.resolve(&pattern).await?;
    let depth = pattern.literal_prefix().len();

    let mut groups: BTreeMap<Vec<(String, Option<String>)>, Vec<String>> =
      BTreeMap::new();
    for location in locations
      .iter()
      .filter(|l| l.extension() == Some(PARQUET_EXTENSION))
    {
      groups
        .entry(partition_values(location, depth))
        .or_default()
        .push(self.file_url(location));
    }
    if groups.is_empty() {
      return if found_any {
        Ok(self.ctx.read_empty()?)
      } else {
        Err(Error::PathNotFound(pattern.as_str().to_owned()))
      };
    }

    let names: Vec<String> = groups
      .keys()
      .next()
      .map(|k| k.iter().map(|(name, _)| name.clone()).collect())
      .unwrap_or_default();
    if groups
      .keys()
      .any(|k| !k.iter().map(|(name, _)| name).eq(names.iter()))
    {
      return Err(Error::InconsistentPartitions(pattern.as_str().to_owned()));
    }
    let types: Vec<_> = (0..names.len())
      .map(|i| partition::infer_type(groups.keys().map(|k| &k[i].1)))
      .collect();

    let files: usize = groups.values().map(Vec::len).sum();
    let directories = groups.len();
    let mut tables = Vec::with_capacity(directories);
    for (values, urls) in groups {
      let mut df = self.ctx.read_parquet(urls, ParquetReadOptions::default()).await?;
      for ((name, raw), data_type) in values.iter().zip(&types) {
        if df.schema().has_column_with_unqualified_name(name) {
          return Err(Error::AmbiguousPartition(name.clone()));
        }
        df = df.with_column(name, lit(partition::parse_value(raw.as_deref(), data_type)))?;
      }
      tables.push(df);
    }

    let mut tables = tables.into_iter();
    let first = tables
      .next()
      .ok_or_else(|| Error::PathNotFound(pattern.as_str().to_owned()))?;
    let df = union_aligned(first, tables)?;
    debug!(pattern = pattern.as_str(), files, directories, "read columnar");
    Ok(df)
  }

  async fn write_columnar<'a>(
    &'a self,
    df: DataFrame,
    path: &'a str,
    partition_by: &'a [&'a str],
    mode: WriteMode,
  ) -> Result<WriteSummary> {
    let parts: Vec<&str> = split_path(path).collect();
    if parts.is_empty() {
      return Err(Error::InvalidLocation(path.to_owned()));
    }
    let root = ObjectPath::from_iter(parts);
    let df = with_hive_columns(df, path, partition_by)?;

    let existing: BTreeSet<ObjectPath> = match mode {
      WriteMode::Overwrite => {
        let removed = self.delete_all(self.list(&root).await?).await?;
        if removed > 0 {
          debug!(path, removed, "cleared destination");
        }
        BTreeSet::new()
      }
      WriteMode::ErrorIfExists => {
        if !self.list(&root).await?.is_empty() {
          return Err(Error::AlreadyExists(path.to_owned()));
        }
        BTreeSet::new()
      }
      WriteMode::Append => self.list(&root).await?.into_iter().collect(),
    };

    let options = DataFrameWriteOptions::new()
      .with_partition_by(partition_by.iter().map(|c| (*c).to_owned()).collect());
    let mut parquet = TableParquetOptions::default();
    parquet.global.compression = Some("snappy".to_owned());
    let counts = df
      .write_parquet(&self.dir_url(&root), options, Some(parquet))
      .await?;
    let rows: u64 = counts
      .iter()
      .filter_map(|batch| batch.column_by_name("count"))
      .filter_map(|column| column.as_primitive_opt::<UInt64Type>())
      .flat_map(|column| column.values().iter().copied())
      .sum();

    self
      .store
      .put(&root.child(SUCCESS_MARKER), PutPayload::from(Bytes::new()))
      .await?;

    let written: Vec<ObjectPath> = self
      .list(&root)
      .await?
      .into_iter()
      .filter(|l| l.extension() == Some(PARQUET_EXTENSION) && !existing.contains(l))
      .collect();
    let directories = written
      .iter()
      .filter_map(|l| l.as_ref().rsplit_once('/').map(|(dir, _)| dir))
      .collect::<BTreeSet<_>>()
      .len();

    let summary = WriteSummary { rows, files: written.len(), directories };
    debug!(
      path,
      rows = summary.rows,
      files = summary.files,
      directories = summary.directories,
      "wrote columnar"
    );
    Ok(summary)
  }

  async fn delete_prefix<'a>(&'a self, path: &'a str) -> Result<usize> {
    let parts: Vec<&str> = split_path(path).collect();
    if parts.is_empty() {
      return Err(Error::InvalidLocation(path.to_owned()));
    }
    let removed = self
      .delete_all(self.list(&ObjectPath::from_iter(parts)).await?)
      .await?;
    debug!(path, removed, "deleted prefix");
    Ok(removed)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Path segments with the store's percent-encoding removed.
fn decoded_parts(location: &ObjectPath) -> Vec<String> {
  location
    .parts()
    .map(|part| {
      let raw = part.as_ref();
      urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
    })
    .collect()
}

/// Names starting with `_` or `.` are bookkeeping (markers, temp files), not
/// data. Partition directories are never hidden.
fn is_hidden(parts: &[&str]) -> bool {
  parts
    .iter()
    .any(|p| (p.starts_with('_') || p.starts_with('.')) && !p.contains('='))
}

/// The `column=value` directories between the first `depth` segments and the
/// file name.
fn partition_values(
  location: &ObjectPath,
  depth: usize,
) -> Vec<(String, Option<String>)> {
  let parts: Vec<_> = location.parts().collect();
  let end = parts.len().saturating_sub(1);
  parts
    .get(depth.min(end)..end)
    .unwrap_or_default()
    .iter()
    .filter_map(|p| partition::decode_segment(p.as_ref()))
    .collect()
}

/// Union `rest` onto `first`, reordering each table's columns to match it.
fn union_aligned(
  first: DataFrame,
  rest: impl IntoIterator<Item = DataFrame>,
) -> Result<DataFrame> {
  let columns: Vec<String> = first
    .schema()
    .fields()
    .iter()
    .map(|f| f.name().clone())
    .collect();
  rest.into_iter().try_fold(first, |acc, df| -> Result<DataFrame> {
    let aligned = df.select(columns.iter().map(ident).collect())?;
    Ok(acc.union(aligned)?)
  })
}

/// Check the partition columns of `df` and replace each with the text of its
/// directory segment.
fn with_hive_columns(
  df: DataFrame,
  path: &str,
  partition_by: &[&str],
) -> Result<DataFrame> {
  if partition_by.is_empty() {
    return Ok(df);
  }
  let schema = df.schema();
  for column in partition_by {
    let field = schema
      .field_with_unqualified_name(column)
      .map_err(|_| Error::ColumnNotFound((*column).to_owned()))?;
    if !partition::is_supported(field.data_type()) {
      return Err(Error::UnsupportedPartitionType {
        column:    (*column).to_owned(),
        data_type: field.data_type().to_string(),
      });
    }
  }
  if schema
    .fields()
    .iter()
    .all(|f| partition_by.contains(&f.name().as_str()))
  {
    return Err(Error::NoDataColumns(path.to_owned()));
  }

  let columns = schema
    .fields()
    .iter()
    .map(|f| {
      let name = f.name().as_str();
      if partition_by.contains(&name) {
        partition::hive_value(name)
      } else {
        ident(name)
      }
    })
    .collect();
  Ok(df.select(columns)?)
}
