//! Job configuration, deserialised from an INI file such as `dl.cfg`.
//!
//! ```ini
//! [AWS]
//! AWS_ACCESS_KEY_ID     = ...
//! AWS_SECRET_ACCESS_KEY = ...
//!
//! [CLUSTER]
//! AWS_REGION = us-west-2
//!
//! [S3_BUCKET]
//! INPUT_DATA      = s3a://udacity-dend/
//! OUTPUT_DATA_S3A = s3a://sparkify-output/
//! ```
//!
//! Any key can be overridden from the environment as
//! `SPARKIFY__<SECTION>__<KEY>`, e.g. `SPARKIFY__S3_BUCKET__INPUT_DATA`.

use std::{fmt, path::Path};

use config::{Environment, File, FileFormat};
use serde::Deserialize;

use crate::{Error, Result};

const ENV_PREFIX: &str = "SPARKIFY";

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Deserialize, Clone)]
pub struct AwsConfig {
  #[serde(alias = "AWS_ACCESS_KEY_ID")]
  pub aws_access_key_id:     String,
  #[serde(alias = "AWS_SECRET_ACCESS_KEY")]
  pub aws_secret_access_key: String,
}

impl fmt::Debug for AwsConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AwsConfig")
      .field("aws_access_key_id", &self.aws_access_key_id)
      .field("aws_secret_access_key", &"<redacted>")
      .finish()
  }
}

/// Cluster settings. Only the region is used by the job itself; the rest
/// describe the environment it was provisioned in and are logged.
#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
  #[serde(alias = "AWS_REGION")]
  pub aws_region:             String,
  #[serde(default, alias = "EMR_CLUSTER_IDENTIFIER")]
  pub emr_cluster_identifier: Option<String>,
  #[serde(default, alias = "EMR_NUM_WORKER_NODES")]
  pub emr_num_worker_nodes:   Option<u32>,
  #[serde(default, alias = "EMR_INSTANCE_TYPE")]
  pub emr_instance_type:      Option<String>,
  #[serde(default, alias = "EMR_RELEASE_LABEL")]
  pub emr_release_label:      Option<String>,
  #[serde(default, alias = "AWS_IAM_ROLE_NAME")]
  pub aws_iam_role_name:      Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BucketConfig {
  /// Root holding `song_data/` and `log_data/`.
  #[serde(alias = "INPUT_DATA")]
  pub input_data:         String,
  /// Root the five tables are written under.
  #[serde(alias = "OUTPUT_DATA_S3A")]
  pub output_data_s3a:    String,
  #[serde(default, alias = "OUTPUT_DATA")]
  pub output_data:        Option<String>,
  #[serde(default, alias = "OUTPUT_BUCKET_NAME")]
  pub output_bucket_name: Option<String>,
}

/// Storage engine options.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
  /// S3-compatible endpoint to use instead of AWS.
  #[serde(default, alias = "S3_ENDPOINT")]
  pub s3_endpoint:       Option<String>,
  #[serde(default, alias = "S3_ALLOW_HTTP")]
  pub s3_allow_http:     bool,
  /// Partitions each query plan runs with. Defaults to the CPU count.
  #[serde(default, alias = "TARGET_PARTITIONS")]
  pub target_partitions: Option<usize>,
}

// ─── Root ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Clone)]
pub struct EtlConfig {
  #[serde(alias = "AWS")]
  pub aws:       AwsConfig,
  #[serde(alias = "CLUSTER")]
  pub cluster:   ClusterConfig,
  #[serde(alias = "S3_BUCKET")]
  pub s3_bucket: BucketConfig,
  #[serde(default, alias = "ENGINE")]
  pub engine:    EngineConfig,
}

impl EtlConfig {
  /// Read `path`, apply environment overrides and validate.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(File::from(path.as_ref()).format(FileFormat::Ini))
      .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
      .build()?;
    Self::from_settings(settings)
  }

  /// Parse INI text directly, without environment overrides.
  pub fn from_ini(text: &str) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(File::from_str(text, FileFormat::Ini))
      .build()?;
    Self::from_settings(settings)
  }

  fn from_settings(settings: config::Config) -> Result<Self> {
    let config: EtlConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    let required = [
      ("CLUSTER.AWS_REGION", &self.cluster.aws_region),
      ("S3_BUCKET.INPUT_DATA", &self.s3_bucket.input_data),
      ("S3_BUCKET.OUTPUT_DATA_S3A", &self.s3_bucket.output_data_s3a),
    ];
    if let Some((key, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
      return Err(Error::InvalidConfig(format!("{key} is empty")));
    }
    if self.engine.target_partitions == Some(0) {
      return Err(Error::InvalidConfig(
        "ENGINE.TARGET_PARTITIONS must be at least 1".into(),
      ));
    }
    Ok(())
  }
}
