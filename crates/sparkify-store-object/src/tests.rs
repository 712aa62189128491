//! Integration tests for `ObjectStorage` against in-memory and local stores.

use std::sync::Arc;

use datafusion::{
  arrow::{
    array::{AsArray as _, Float64Array, Int64Array, RecordBatch, StringArray},
    datatypes::{DataType, Field, Int64Type, Schema},
  },
  prelude::{DataFrame, SessionContext, cast, ident},
};
use futures::TryStreamExt as _;
use object_store::{
  ObjectStore, PutPayload, memory::InMemory, path::Path as ObjectPath,
};
use sparkify_core::{Storage, WriteMode};

use crate::{Error, ObjectStorage, StoreOptions};

fn storage() -> (ObjectStorage, Arc<dyn ObjectStore>) {
  let ctx = SessionContext::new();
  let inner: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
  let storage = ObjectStorage::new(&ctx, "memory://", inner.clone()).unwrap();
  (storage, inner)
}

async fn put(store: &Arc<dyn ObjectStore>, key: &str, body: &str) {
  store
    .put(&ObjectPath::from(key), PutPayload::from(body.as_bytes().to_vec()))
    .await
    .expect("put object");
}

async fn keys(store: &Arc<dyn ObjectStore>) -> Vec<String> {
  let mut keys: Vec<String> = store
    .list(None)
    .map_ok(|meta| meta.location.to_string())
    .try_collect()
    .await
    .expect("list objects");
  keys.sort();
  keys
}

fn songs(s: &ObjectStorage) -> DataFrame {
  let schema = Arc::new(Schema::new(vec![
    Field::new("song_id", DataType::Utf8, true),
    Field::new("title", DataType::Utf8, true),
    Field::new("year", DataType::Int64, true),
    Field::new("artist_id", DataType::Utf8, true),
  ]));
  let batch = RecordBatch::try_new(schema, vec![
    Arc::new(StringArray::from(vec!["S1", "S2", "S3"])),
    Arc::new(StringArray::from(vec!["One", "Two", "Three"])),
    Arc::new(Int64Array::from(vec![2000, 2000, 1999])),
    Arc::new(StringArray::from(vec!["AR1", "AR1", "AR2"])),
  ])
  .unwrap();
  s.context().read_batch(batch).unwrap()
}

/// Every value of `name` as text, sorted.
async fn strings(df: DataFrame, name: &str) -> Vec<Option<String>> {
  let batches = df
    .select(vec![cast(ident(name), DataType::Utf8)])
    .unwrap()
    .collect()
    .await
    .unwrap();
  let mut values: Vec<Option<String>> = batches
    .iter()
    .flat_map(|b| {
      b.column(0)
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(str::to_owned))
        .collect::<Vec<_>>()
    })
    .collect();
  values.sort();
  values
}

async fn ints(df: DataFrame, name: &str) -> Vec<Option<i64>> {
  let batches = df
    .select(vec![cast(ident(name), DataType::Int64)])
    .unwrap()
    .collect()
    .await
    .unwrap();
  let mut values: Vec<Option<i64>> = batches
    .iter()
    .flat_map(|b| b.column(0).as_primitive::<Int64Type>().iter().collect::<Vec<_>>())
    .collect();
  values.sort();
  values
}

fn column_names(df: &DataFrame) -> Vec<String> {
  df.schema().fields().iter().map(|f| f.name().clone()).collect()
}

// ─── JSON ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_json_merges_the_schema_of_every_file() {
  let (s, inner) = storage();
  put(&inner, "song_data/A/B/C/TRA.json", r#"{"song_id":"S1","year":0}"#).await;
  put(&inner, "song_data/A/B/D/TRB.json", r#"{"song_id":"S2","year":2000}"#)
    .await;
  put(&inner, "song_data/A/B/E/TRC.json", r#"{"song_id":"S4"}"#).await;
  put(&inner, "song_data/A/B/TRD.json", r#"{"song_id":"S3"}"#).await;

  let df = s.read_json("song_data/*/*/*/*.json").await.unwrap();
  assert_eq!(column_names(&df), ["song_id", "year"]);
  assert_eq!(
    df.schema().field_with_unqualified_name("year").unwrap().data_type(),
    &DataType::Int64
  );
  assert_eq!(strings(df.clone(), "song_id").await, [
    Some("S1".to_owned()),
    Some("S2".to_owned()),
    Some("S4".to_owned()),
  ]);
  assert_eq!(ints(df, "year").await, [None, Some(0), Some(2000)]);
}

#[tokio::test]
async fn read_json_accepts_pretty_printed_objects() {
  let (s, inner) = storage();
  put(&inner, "in/a.json", "{\n  \"a\": 1\n}\n{\n  \"a\": 2.5,\n  \"b\": null\n}\n")
    .await;

  let df = s.read_json("in/*.json").await.unwrap();
  assert_eq!(column_names(&df), ["a", "b"]);
  assert_eq!(df.count().await.unwrap(), 2);
}

#[tokio::test]
async fn read_json_skips_hidden_files() {
  let (s, inner) = storage();
  put(&inner, "log_data/2018/11/a.json", r#"{"page":"NextSong"}"#).await;
  put(&inner, "log_data/2018/11/_tmp.json", "not json").await;
  put(&inner, "log_data/2018/11/.crc.json", "not json").await;

  let df = s.read_json("log_data/*/*/*.json").await.unwrap();
  assert_eq!(df.count().await.unwrap(), 1);
}

#[tokio::test]
async fn read_json_without_matches_is_path_not_found() {
  let (s, inner) = storage();
  put(&inner, "log_data/2018/11/a.jsonl", "{}").await;

  let err = s.read_json("log_data/*/*/*.json").await.unwrap_err();
  assert!(matches!(err, Error::PathNotFound(_)));
}

#[tokio::test]
async fn read_json_reports_the_offending_file() {
  let (s, inner) = storage();
  put(&inner, "in/bad.json", "{\"a\":").await;
  let err = s.read_json("in/*.json").await.unwrap_err();
  assert!(matches!(err, Error::Json { ref path, .. } if path == "in/bad.json"));

  put(&inner, "list/a.json", "[1,2]").await;
  let err = s.read_json("list/*.json").await.unwrap_err();
  assert!(matches!(err, Error::NotAnObject { found: "array", .. }));
}

// ─── Columnar ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn partitioned_write_lays_out_hive_directories() {
  let (s, inner) = storage();
  let summary = s
    .write_columnar(songs(&s), "songs", &["year", "artist_id"], WriteMode::Overwrite)
    .await
    .unwrap();
  assert_eq!(summary.rows, 3);
  assert_eq!(summary.directories, 2);

  let keys = keys(&inner).await;
  assert_eq!(keys[0], "songs/_SUCCESS");
  let files = &keys[1..];
  assert_eq!(files.len(), summary.files);
  assert!(files.iter().all(|k| k.ends_with(".parquet")));
  assert!(
    files
      .iter()
      .any(|k| k.starts_with("songs/year=1999/artist_id=AR2/"))
  );
  assert!(
    files
      .iter()
      .any(|k| k.starts_with("songs/year=2000/artist_id=AR1/"))
  );
}

#[tokio::test]
async fn partition_columns_are_recovered_on_read() {
  let (s, _) = storage();
  s.write_columnar(songs(&s), "songs", &["year", "artist_id"], WriteMode::Overwrite)
    .await
    .unwrap();

  let df = s.read_columnar("songs/*/*/*.parquet").await.unwrap();
  assert_eq!(column_names(&df), ["song_id", "title", "year", "artist_id"]);
  let schema = df.schema();
  assert_eq!(
    schema.field_with_unqualified_name("year").unwrap().data_type(),
    &DataType::Int64
  );
  assert_eq!(
    schema.field_with_unqualified_name("artist_id").unwrap().data_type(),
    &DataType::Utf8
  );
  assert_eq!(ints(df.clone(), "year").await, [
    Some(1999),
    Some(2000),
    Some(2000)
  ]);
  assert_eq!(strings(df, "artist_id").await, [
    Some("AR1".to_owned()),
    Some("AR1".to_owned()),
    Some("AR2".to_owned()),
  ]);

  let whole_dir = s.read_columnar("songs").await.unwrap();
  assert_eq!(whole_dir.count().await.unwrap(), 3);
}

#[tokio::test]
async fn null_partition_values_use_the_default_directory() {
  let (s, inner) = storage();
  let schema = Arc::new(Schema::new(vec![
    Field::new("user_id", DataType::Utf8, true),
    Field::new("level", DataType::Utf8, true),
  ]));
  let batch = RecordBatch::try_new(schema, vec![
    Arc::new(StringArray::from(vec!["39"])),
    Arc::new(StringArray::from(vec![None::<&str>])),
  ])
  .unwrap();
  s.write_columnar(s.context().read_batch(batch).unwrap(), "users", &["level"], WriteMode::Overwrite)
    .await
    .unwrap();

  assert!(
    keys(&inner)
      .await
      .iter()
      .any(|k| k.starts_with("users/level=__HIVE_DEFAULT_PARTITION__/"))
  );
  let back = s.read_columnar("users").await.unwrap();
  assert_eq!(strings(back, "level").await, [None]);
}

#[tokio::test]
async fn float_partition_column_is_rejected_before_writing() {
  let (s, inner) = storage();
  let schema = Arc::new(Schema::new(vec![
    Field::new("song_id", DataType::Utf8, true),
    Field::new("duration", DataType::Float64, true),
  ]));
  let batch = RecordBatch::try_new(schema, vec![
    Arc::new(StringArray::from(vec!["S1"])),
    Arc::new(Float64Array::from(vec![218.93])),
  ])
  .unwrap();

  let err = s
    .write_columnar(s.context().read_batch(batch).unwrap(), "songs", &["duration"], WriteMode::Overwrite)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::UnsupportedPartitionType { ref column, .. } if column == "duration"
  ));
  assert!(keys(&inner).await.is_empty());
}

#[tokio::test]
async fn overwrite_replaces_and_append_accumulates() {
  let (s, _) = storage();

  s.write_columnar(songs(&s), "songs", &[], WriteMode::Overwrite).await.unwrap();
  s.write_columnar(songs(&s), "songs", &[], WriteMode::Overwrite).await.unwrap();
  assert_eq!(s.read_columnar("songs").await.unwrap().count().await.unwrap(), 3);

  let appended = s
    .write_columnar(songs(&s), "songs", &[], WriteMode::Append)
    .await
    .unwrap();
  assert_eq!(appended.rows, 3);
  assert!(appended.files >= 1);
  assert_eq!(s.read_columnar("songs").await.unwrap().count().await.unwrap(), 6);
}

#[tokio::test]
async fn error_if_exists_refuses_existing_destination() {
  let (s, _) = storage();
  s.write_columnar(songs(&s), "songs", &[], WriteMode::ErrorIfExists)
    .await
    .unwrap();

  let err = s
    .write_columnar(songs(&s), "songs", &[], WriteMode::ErrorIfExists)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyExists(_)));
}

#[tokio::test]
async fn empty_partitioned_write_leaves_only_the_marker() {
  let (s, inner) = storage();
  let empty = songs(&s).limit(0, Some(0)).unwrap();

  let summary = s
    .write_columnar(empty, "songs", &["year"], WriteMode::Overwrite)
    .await
    .unwrap();
  assert_eq!(summary.rows, 0);
  assert_eq!(summary.files, 0);
  assert_eq!(keys(&inner).await, ["songs/_SUCCESS"]);

  let back = s.read_columnar("songs").await.unwrap();
  assert_eq!(back.count().await.unwrap(), 0);
  assert!(matches!(
    s.read_columnar("missing").await.unwrap_err(),
    Error::PathNotFound(_)
  ));
}

#[tokio::test]
async fn partitioning_by_every_column_is_rejected() {
  let (s, _) = storage();
  let years = songs(&s).select_columns(&["year"]).unwrap();
  let err = s
    .write_columnar(years, "years", &["year"], WriteMode::Overwrite)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NoDataColumns(_)));
}

#[tokio::test]
async fn unknown_partition_column_is_rejected() {
  let (s, _) = storage();
  let err = s
    .write_columnar(songs(&s), "songs", &["decade"], WriteMode::Overwrite)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ColumnNotFound(ref c) if c == "decade"));
}

#[tokio::test]
async fn delete_prefix_counts_removed_objects() {
  let (s, inner) = storage();
  put(&inner, "songs/a.parquet", "x").await;
  put(&inner, "songs/b/c.parquet", "x").await;
  put(&inner, "songsx/d.parquet", "x").await;

  assert_eq!(s.delete_prefix("songs").await.unwrap(), 2);
  assert_eq!(keys(&inner).await, ["songsx/d.parquet"]);
  assert!(s.delete_prefix("/").await.is_err());
}

// ─── Local filesystem ────────────────────────────────────────────────────────

#[tokio::test]
async fn local_filesystem_roundtrip() {
  let dir = tempfile::tempdir().unwrap();
  let url = dir.path().join("out");
  let ctx = SessionContext::new();
  let s = ObjectStorage::open(&ctx, url.to_str().unwrap(), &StoreOptions::default())
    .unwrap();

  s.write_columnar(songs(&s), "songs", &["year"], WriteMode::Overwrite)
    .await
    .unwrap();
  assert!(url.join("songs/_SUCCESS").exists());
  assert!(url.join("songs/year=2000").is_dir());

  let back = s.read_columnar("songs/*/*.parquet").await.unwrap();
  assert_eq!(
    back.schema().field_with_unqualified_name("year").unwrap().data_type(),
    &DataType::Int64
  );
  assert_eq!(back.count().await.unwrap(), 3);
}
