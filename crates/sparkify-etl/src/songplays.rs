//! The songplays fact table: song plays joined to the songs table on title.

use datafusion::{
  common::JoinType,
  prelude::{DataFrame, SessionContext},
};
use sparkify_core::{Storage, WriteMode, WriteSummary, with_monotonic_id};
use tracing::info;

use crate::{Error, Result, songs::renamed};

/// Data files of the songs table, two partition levels down.
pub const SONGS_FILES: &str = "songs/*/*/*.parquet";

pub const SONGPLAYS_TABLE: &str = "songplays";

pub const SONGPLAY_PARTITIONS: [&str; 2] = ["year_partition", "month_partition"];

const SONGPLAY_COLUMNS: [(&str, &str); 11] = [
  ("songplay_id", "songplay_id"),
  ("start_time", "start_time"),
  ("userId", "user_id"),
  ("level", "level"),
  ("song_id", "song_id"),
  ("artist_id", "artist_id"),
  ("sessionId", "session_id"),
  ("location", "location"),
  ("userAgent", "user_agent"),
  ("year", "year_partition"),
  ("month", "month_partition"),
];

/// Join timed song plays to `songs` (the songs table as read back, with
/// `year` already renamed to `song_year`).
///
/// The join key is the title alone, so a play whose title is shared by
/// several songs yields one row per song. `year_partition` and
/// `month_partition` come from the play's `start_time`.
pub async fn songplays_table(
  ctx: &SessionContext,
  timed: DataFrame,
  songs: DataFrame,
) -> Result<DataFrame> {
  let joined = timed.join(songs, JoinType::Inner, &["song"], &["title"], None)?;
  let numbered = with_monotonic_id(ctx, joined, "songplay_id").await?;
  Ok(numbered.select(renamed(&SONGPLAY_COLUMNS))?.distinct()?)
}

/// Re-read the songs table from `output`, build songplays and write it.
pub async fn process_songplays<O: Storage>(
  ctx: &SessionContext,
  output: &O,
  timed: DataFrame,
) -> Result<WriteSummary> {
  info!(pattern = SONGS_FILES, "read songs table for songplays");
  let songs = output
    .read_columnar(SONGS_FILES)
    .await
    .map_err(Error::storage)?;
  // Renaming a missing column is a no-op, so check first.
  songs.schema().field_with_unqualified_name("year")?;
  let songs = songs.with_column_renamed("year", "song_year")?;

  info!("create songplays table");
  let songplays = songplays_table(ctx, timed, songs).await?;

  let summary = output
    .write_columnar(
      songplays,
      SONGPLAYS_TABLE,
      &SONGPLAY_PARTITIONS,
      WriteMode::Overwrite,
    )
    .await
    .map_err(Error::storage)?;
  info!(rows = summary.rows, "wrote songplays table");
  Ok(summary)
}
