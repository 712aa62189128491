//! The Sparkify ETL job.
//!
//! Turns the raw song metadata and event logs into a star schema of five
//! partitioned Parquet tables: `songs`, `artists`, `users`, `time` and the
//! `songplays` fact table. Tables are DataFusion dataframes; stages are
//! generic over [`sparkify_core::Storage`], and [`Session`] owns the query
//! engine and resolves root URLs to object-store backends registered on it.
//!
//! # Running
//!
//! ```rust,ignore
//! let config = EtlConfig::load("dl.cfg")?;
//! let session = Session::open(&config);
//! let summary = run_pipeline(
//!   &session,
//!   &config.s3_bucket.input_data,
//!   &config.s3_bucket.output_data_s3a,
//! )
//! .await?;
//! session.close();
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod logs;
pub mod pipeline;
pub mod session;
pub mod songplays;
pub mod songs;

pub use crate::config::EtlConfig;
pub use error::{Error, Result};
pub use pipeline::{RunSummary, run_pipeline, run_stages};
pub use session::Session;

/// Every table the job writes, relative to the output root.
pub const TABLES: [&str; 5] = [
  songs::SONGS_TABLE,
  songs::ARTISTS_TABLE,
  logs::USERS_TABLE,
  logs::TIME_TABLE,
  songplays::SONGPLAYS_TABLE,
];
