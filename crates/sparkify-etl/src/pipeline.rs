//! The orchestrator: songs first, then logs, which depend on the songs table.

use datafusion::prelude::SessionContext;
use serde::Serialize;
use sparkify_core::{Storage, WriteSummary};
use tracing::info;

use crate::{
  Result, logs::process_log_data, session::Session, songs::process_song_data,
};

/// What each table write produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
  pub songs:     WriteSummary,
  pub artists:   WriteSummary,
  pub users:     WriteSummary,
  pub time:      WriteSummary,
  pub songplays: WriteSummary,
}

/// Run the whole job from `input_url` to `output_url`.
pub async fn run_pipeline(
  session: &Session,
  input_url: &str,
  output_url: &str,
) -> Result<RunSummary> {
  let input = session.storage(input_url)?;
  let output = session.storage(output_url)?;
  info!(input = input.url(), output = output.url(), "starting pipeline");
  run_stages(session.context(), &input, &output).await
}

/// Run both stages against already-opened storage registered on `ctx`. The
/// songs table must be fully written before the log stage reads it back.
pub async fn run_stages<I, O>(
  ctx: &SessionContext,
  input: &I,
  output: &O,
) -> Result<RunSummary>
where
  I: Storage,
  O: Storage,
{
  let songs = process_song_data(input, output).await?;
  let logs = process_log_data(ctx, input, output).await?;

  let summary = RunSummary {
    songs:     songs.songs,
    artists:   songs.artists,
    users:     logs.users,
    time:      logs.time,
    songplays: logs.songplays,
  };
  info!(
    songs = summary.songs.rows,
    artists = summary.artists.rows,
    users = summary.users.rows,
    time = summary.time.rows,
    songplays = summary.songplays.rows,
    "pipeline completed"
  );
  Ok(summary)
}
