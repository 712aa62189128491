//! Resolve a storage root URL to an [`ObjectStore`].
//!
//! | Location | Backend |
//! |----------|---------|
//! | `s3://bucket/prefix`, `s3a://…`, `s3n://…` | Amazon S3 (or a compatible endpoint) |
//! | `file:///abs/path`, `./relative`, `/abs` | Local filesystem, created if missing |
//! | `memory://` | Process-local in-memory store |

use std::{path::PathBuf, sync::Arc};

use object_store::{
  ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory,
  path::Path as ObjectPath, prefix::PrefixStore,
};

use crate::{Error, Result};

/// Connection settings for remote backends. Ignored by local backends.
///
/// Unset fields fall back to the standard `AWS_*` environment variables and
/// instance credentials.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
  pub region:            Option<String>,
  pub access_key_id:     Option<String>,
  pub secret_access_key: Option<String>,
  /// Custom S3-compatible endpoint (e.g. MinIO).
  pub endpoint:          Option<String>,
  pub allow_http:        bool,
}

/// A parsed storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
  S3 { bucket: String, prefix: String },
  Local(PathBuf),
  Memory,
}

impl Location {
  pub fn parse(url: &str) -> Result<Self> {
    let url = url.trim();
    if url.is_empty() {
      return Err(Error::InvalidLocation(url.to_owned()));
    }

    for scheme in ["s3://", "s3a://", "s3n://"] {
      if let Some(rest) = url.strip_prefix(scheme) {
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
          return Err(Error::InvalidLocation(url.to_owned()));
        }
        return Ok(Location::S3 {
          bucket: bucket.to_owned(),
          prefix: prefix.trim_matches('/').to_owned(),
        });
      }
    }

    if url.starts_with("memory://") {
      return Ok(Location::Memory);
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    if path.contains("://") {
      return Err(Error::InvalidLocation(url.to_owned()));
    }
    Ok(Location::Local(PathBuf::from(path)))
  }
}

pub fn build_object_store(
  location: &Location,
  options: &StoreOptions,
) -> Result<Arc<dyn ObjectStore>> {
  match location {
    Location::S3 { bucket, prefix } => build_s3(bucket, prefix, options),
    Location::Local(path) => build_local(path),
    Location::Memory => Ok(Arc::new(InMemory::new())),
  }
}

fn build_local(path: &PathBuf) -> Result<Arc<dyn ObjectStore>> {
  // LocalFileSystem::new_with_prefix requires an absolute path that exists.
  std::fs::create_dir_all(path)?;
  let absolute = path.canonicalize()?;
  Ok(Arc::new(LocalFileSystem::new_with_prefix(absolute)?))
}

fn build_s3(
  bucket: &str,
  prefix: &str,
  options: &StoreOptions,
) -> Result<Arc<dyn ObjectStore>> {
  // Start from the ambient AWS environment; explicit options win.
  let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
  if let Some(region) = &options.region {
    builder = builder.with_region(region);
  }

  if let Some(endpoint) = &options.endpoint {
    builder = builder
      .with_endpoint(endpoint)
      .with_virtual_hosted_style_request(false);
  }
  if options.allow_http {
    builder = builder.with_allow_http(true);
  }
  if let Some(key) = &options.access_key_id {
    builder = builder.with_access_key_id(key);
  }
  if let Some(secret) = &options.secret_access_key {
    builder = builder.with_secret_access_key(secret);
  }

  let store = builder.build()?;
  if prefix.is_empty() {
    Ok(Arc::new(store))
  } else {
    Ok(Arc::new(PrefixStore::new(store, ObjectPath::from(prefix))))
  }
}
