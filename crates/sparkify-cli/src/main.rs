//! sparkify binary.
//!
//! Reads `dl.cfg` (or the path given with `--config`), opens a session with
//! its credentials and runs the ETL job from the configured input root to the
//! configured output root.
//!
//! ```text
//! sparkify --config dl.cfg run
//! sparkify run --input ./data --output ./out
//! sparkify clean --output ./out
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use sparkify_core::Storage as _;
use sparkify_etl::{EtlConfig, Session, TABLES, run_pipeline};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "dl.cfg";

#[derive(Parser)]
#[command(author, version, about = "Sparkify song-play ETL job")]
struct Cli {
  /// Path to the INI configuration file. Without it, `dl.cfg` in the working
  /// directory is used when present.
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Build all five tables (the default).
  Run(RunArgs),
  /// Delete every table under the output root.
  Clean {
    /// Output root; defaults to `S3_BUCKET.OUTPUT_DATA_S3A`.
    #[arg(long)]
    output: Option<String>,
  },
}

#[derive(Args, Default)]
struct RunArgs {
  /// Input root holding `song_data/` and `log_data/`; defaults to
  /// `S3_BUCKET.INPUT_DATA`.
  #[arg(long)]
  input:  Option<String>,
  /// Output root; defaults to `S3_BUCKET.OUTPUT_DATA_S3A`.
  #[arg(long)]
  output: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref(), Path::new(DEFAULT_CONFIG))?;
  let session = match &config {
    Some(config) => Session::open(config),
    None => Session::local(),
  };

  match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
    Command::Run(args) => {
      let input = root(args.input, &config, |c| &c.s3_bucket.input_data)
        .context("no input root: pass --input or set S3_BUCKET.INPUT_DATA")?;
      let output = root(args.output, &config, |c| &c.s3_bucket.output_data_s3a)
        .context("no output root: pass --output or set S3_BUCKET.OUTPUT_DATA_S3A")?;

      let summary = run_pipeline(&session, &input, &output)
        .await
        .with_context(|| format!("pipeline from {input} to {output} failed"))?;
      tracing::info!(
        songplays = summary.songplays.rows,
        files = summary.songplays.files,
        "script completed"
      );
    }
    Command::Clean { output } => {
      let output = root(output, &config, |c| &c.s3_bucket.output_data_s3a)
        .context("no output root: pass --output or set S3_BUCKET.OUTPUT_DATA_S3A")?;
      let storage = session
        .storage(&output)
        .with_context(|| format!("failed to open {output}"))?;

      let mut removed = 0;
      for table in TABLES {
        removed += storage
          .delete_prefix(table)
          .await
          .with_context(|| format!("failed to delete {output}/{table}"))?;
      }
      tracing::info!(output = %output, removed, "output cleaned");
    }
  }

  session.close();
  Ok(())
}

/// Load the `explicit` configuration file, which must exist, or else
/// `default` if it exists. Without either, every root must be given on the
/// command line.
fn load_config(
  explicit: Option<&Path>,
  default: &Path,
) -> anyhow::Result<Option<EtlConfig>> {
  let path = match explicit {
    Some(path) => {
      if !path.exists() {
        bail!("configuration file {path:?} does not exist");
      }
      path
    }
    None if default.exists() => default,
    None => {
      tracing::debug!(path = %default.display(), "no configuration file");
      return Ok(None);
    }
  };
  let config = EtlConfig::load(path)
    .with_context(|| format!("failed to load configuration from {path:?}"))?;
  Ok(Some(config))
}

fn root(
  flag: Option<String>,
  config: &Option<EtlConfig>,
  field: impl Fn(&EtlConfig) -> &String,
) -> anyhow::Result<String> {
  match (flag, config) {
    (Some(url), _) => Ok(url),
    (None, Some(config)) => Ok(field(config).clone()),
    (None, None) => bail!("no configuration file found"),
  }
}
