//! Songs and artists dimensions, extracted from the song metadata files.

use datafusion::prelude::{DataFrame, ident};
use serde::Serialize;
use sparkify_core::{Storage, WriteMode, WriteSummary};
use tracing::info;

use crate::{Error, Result};

/// Song metadata, one object per file, under the input root.
pub const SONG_DATA: &str = "song_data/*/*/*/*.json";

pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";

const SONG_COLUMNS: [&str; 5] = ["song_id", "title", "artist_id", "year", "duration"];

const ARTIST_COLUMNS: [(&str, &str); 5] = [
  ("artist_id", "artist_id"),
  ("artist_name", "name"),
  ("artist_location", "location"),
  ("artist_latitude", "latitude"),
  ("artist_longitude", "longitude"),
];

/// Partition columns of the songs table. Both hold the song's year:
/// `artist_id_partition` is filled from `year`, not `artist_id`.
pub const SONG_PARTITIONS: [&str; 2] = ["year_partition", "artist_id_partition"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SongSummary {
  pub songs:   WriteSummary,
  pub artists: WriteSummary,
}

/// Project the songs table: one row per distinct song record.
pub fn songs_table(song_data: DataFrame) -> Result<DataFrame> {
  Ok(
    song_data
      .select_columns(&SONG_COLUMNS)?
      .with_column("year_partition", ident("year"))?
      .with_column("artist_id_partition", ident("year"))?
      .distinct()?,
  )
}

pub fn artists_table(song_data: DataFrame) -> Result<DataFrame> {
  Ok(song_data.select(renamed(&ARTIST_COLUMNS))?.distinct()?)
}

/// `from AS to` for each pair, in order.
pub(crate) fn renamed(columns: &[(&str, &str)]) -> Vec<datafusion::prelude::Expr> {
  columns
    .iter()
    .map(|(from, to)| ident(*from).alias(*to))
    .collect()
}

/// Read the song files under `input` and write the songs and artists tables
/// under `output`. The two writes run concurrently.
pub async fn process_song_data<I, O>(input: &I, output: &O) -> Result<SongSummary>
where
  I: Storage,
  O: Storage,
{
  info!(pattern = SONG_DATA, "read song data");
  let song_data = input.read_json(SONG_DATA).await.map_err(Error::storage)?;

  info!("create songs table");
  let songs = songs_table(song_data.clone())?;

  info!("create artists table");
  let artists = artists_table(song_data)?;

  let (songs, artists) = tokio::try_join!(
    async {
      output
        .write_columnar(songs, SONGS_TABLE, &SONG_PARTITIONS, WriteMode::Overwrite)
        .await
        .map_err(Error::storage)
    },
    async {
      output
        .write_columnar(artists, ARTISTS_TABLE, &[], WriteMode::Overwrite)
        .await
        .map_err(Error::storage)
    },
  )?;
  info!(
    songs = songs.rows,
    artists = artists.rows,
    "wrote songs and artists tables"
  );

  Ok(SongSummary { songs, artists })
}
