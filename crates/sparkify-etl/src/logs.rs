//! Users and time dimensions, extracted from the event logs.

use datafusion::prelude::{DataFrame, SessionContext, ident, lit};
use serde::Serialize;
use sparkify_core::{Storage, WriteMode, WriteSummary};
use tracing::info;

use crate::{Error, Result, calendar, songplays, songs::renamed};

/// Event logs, one file per day, under the input root.
pub const LOG_DATA: &str = "log_data/*/*/*.json";

pub const USERS_TABLE: &str = "users";
pub const TIME_TABLE: &str = "time";

/// The `page` value of an actual song play.
pub const NEXT_SONG: &str = "NextSong";

const USER_COLUMNS: [(&str, &str); 5] = [
  ("userId", "user_id"),
  ("firstName", "first_name"),
  ("lastName", "last_name"),
  ("gender", "gender"),
  ("level", "level"),
];

const TIME_COLUMNS: [&str; 7] =
  ["start_time", "hour", "day", "week", "month", "year", "weekday"];

pub const TIME_PARTITIONS: [&str; 2] = ["year_partition", "month_partition"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSummary {
  pub users:     WriteSummary,
  pub time:      WriteSummary,
  pub songplays: WriteSummary,
}

/// Keep only song plays.
pub fn song_plays(logs: DataFrame) -> Result<DataFrame> {
  Ok(logs.filter(ident("page").eq(lit(NEXT_SONG)))?)
}

/// Users as seen in song plays. A user whose level changed appears once per
/// level.
pub fn users_table(plays: DataFrame) -> Result<DataFrame> {
  Ok(plays.select(renamed(&USER_COLUMNS))?.distinct()?)
}

/// Add `start_time` (from the millisecond `ts`) and its calendar fields.
pub fn with_time_columns(plays: DataFrame) -> Result<DataFrame> {
  let mut timed = plays.with_column("start_time", calendar::start_time(ident("ts")))?;
  for (name, expr) in calendar::fields(ident("start_time")) {
    timed = timed.with_column(name, expr)?;
  }
  Ok(timed)
}

pub fn time_table(timed: DataFrame) -> Result<DataFrame> {
  Ok(
    timed
      .select_columns(&TIME_COLUMNS)?
      .with_column("month_partition", ident("month"))?
      .with_column("year_partition", ident("year"))?
      .distinct()?,
  )
}

/// Read the event logs under `input`, write the users and time tables, then
/// build the songplays table against the songs already written to `output`.
pub async fn process_log_data<I, O>(
  ctx: &SessionContext,
  input: &I,
  output: &O,
) -> Result<LogSummary>
where
  I: Storage,
  O: Storage,
{
  info!(pattern = LOG_DATA, "read log data");
  let logs = input.read_json(LOG_DATA).await.map_err(Error::storage)?;
  let plays = song_plays(logs)?;

  info!("create users table");
  let users = output
    .write_columnar(users_table(plays.clone())?, USERS_TABLE, &[], WriteMode::Overwrite)
    .await
    .map_err(Error::storage)?;
  info!(rows = users.rows, "wrote users table");

  info!("create time table");
  let timed = with_time_columns(plays)?;
  let time = output
    .write_columnar(time_table(timed.clone())?, TIME_TABLE, &TIME_PARTITIONS, WriteMode::Overwrite)
    .await
    .map_err(Error::storage)?;
  info!(rows = time.rows, "wrote time table");

  let songplays = songplays::process_songplays(ctx, output, timed).await?;

  Ok(LogSummary { users, time, songplays })
}
