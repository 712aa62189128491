//! [`Session`]: the explicit execution context handed to the pipeline.

use std::{sync::Arc, time::Instant};

use datafusion::prelude::{SessionConfig, SessionContext};
use object_store::memory::InMemory;
use sparkify_store_object::{Location, ObjectStorage, StoreOptions};
use tracing::info;

use crate::{Error, Result, config::EtlConfig};

/// The query engine, credentials and engine options for one run.
///
/// Built once at start-up and passed down; nothing is stored in process-wide
/// state or in environment variables. Every `memory://` root of a session
/// names the same in-memory store.
pub struct Session {
  ctx:     SessionContext,
  options: StoreOptions,
  memory:  Arc<InMemory>,
  started: Instant,
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("session_id", &self.ctx.session_id())
      .field("options", &self.options)
      .field("started", &self.started)
      .finish()
  }
}

impl Session {
  pub fn open(config: &EtlConfig) -> Self {
    let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_owned());
    let options = StoreOptions {
      region:            non_empty(&config.cluster.aws_region),
      access_key_id:     non_empty(&config.aws.aws_access_key_id),
      secret_access_key: non_empty(&config.aws.aws_secret_access_key),
      endpoint:          config.engine.s3_endpoint.clone(),
      allow_http:        config.engine.s3_allow_http,
    };
    info!(
      region = options.region.as_deref().unwrap_or("default"),
      cluster = config.cluster.emr_cluster_identifier.as_deref(),
      workers = config.cluster.emr_num_worker_nodes,
      endpoint = options.endpoint.as_deref(),
      target_partitions = config.engine.target_partitions,
      "session opened"
    );
    Self::new(options, config.engine.target_partitions)
  }

  /// A session without credentials, for local and in-memory roots.
  pub fn local() -> Self { Self::new(StoreOptions::default(), None) }

  fn new(options: StoreOptions, target_partitions: Option<usize>) -> Self {
    // A pretty-printed JSON object must never be split across scan ranges.
    let mut config = SessionConfig::new().with_repartition_file_scans(false);
    if let Some(n) = target_partitions {
      config = config.with_target_partitions(n);
    }
    Self {
      ctx: SessionContext::new_with_config(config),
      options,
      memory: Arc::new(InMemory::new()),
      started: Instant::now(),
    }
  }

  pub fn context(&self) -> &SessionContext { &self.ctx }

  /// Resolve a root URL (`s3a://…`, a local path, `memory://`) to storage
  /// registered on this session.
  pub fn storage(&self, url: &str) -> Result<ObjectStorage> {
    let storage = match Location::parse(url).map_err(Error::storage)? {
      Location::Memory => ObjectStorage::new(&self.ctx, url, self.memory.clone()),
      _ => ObjectStorage::open(&self.ctx, url, &self.options),
    };
    storage.map_err(Error::storage)
  }

  pub fn close(self) {
    info!(elapsed = ?self.started.elapsed(), "session closed");
  }
}
