use common::{Album, Artist, Track};
use rusqlite::{params, Connection, Row};

use super::albums::{album_from_row, ALBUM_COLUMNS};
use super::artists::{artist_from_row, ARTIST_COLUMNS};
use super::query::{Field, Filter, Page};
use crate::error::LibraryError;
use crate::patch::TrackPatch;

pub(crate) const TRACK_COLUMNS: &str =
    "track.id, track.tracknumber, track.name, track.grouping, track.filename";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackField {
    Id,
    Tracknumber,
    Name,
    Grouping,
    Filename,
}

impl Field for TrackField {
    fn column(self) -> &'static str {
        match self {
            TrackField::Id => "id",
            TrackField::Tracknumber => "tracknumber",
            TrackField::Name => "name",
            TrackField::Grouping => "grouping",
            TrackField::Filename => "filename",
        }
    }
}

pub(crate) fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        tracknumber: row.get(1)?,
        name: row.get(2)?,
        grouping: row.get(3)?,
        filename: row.get(4)?,
    })
}

pub fn get(conn: &Connection, track_id: i64) -> Result<Option<Track>, LibraryError> {
    let sql = format!("SELECT {} FROM track WHERE id = ?1", TRACK_COLUMNS);
    super::query_one(conn, &sql, params![track_id], track_from_row)
}

pub fn find_by_filename(conn: &Connection, filename: &str) -> Result<Option<Track>, LibraryError> {
    let sql = format!("SELECT {} FROM track WHERE filename = ?1", TRACK_COLUMNS);
    super::query_one(conn, &sql, params![filename], track_from_row)
}

/// The album a track belongs to. A track keeps at most one album; should more
/// than one link exist, the earliest album wins.
pub fn album_of(conn: &Connection, track_id: i64) -> Result<Option<Album>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM album
         JOIN album_track ON album_track.album_id = album.id
         WHERE album_track.track_id = ?1
         ORDER BY album.id LIMIT 1",
        ALBUM_COLUMNS
    );
    super::query_one(conn, &sql, params![track_id], album_from_row)
}

pub fn artists_of(conn: &Connection, track_id: i64) -> Result<Vec<Artist>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM artist
         JOIN artist_track ON artist_track.artist_id = artist.id
         WHERE artist_track.track_id = ?1
         ORDER BY artist.name, artist.id",
        ARTIST_COLUMNS
    );
    super::query_all(conn, &sql, params![track_id], artist_from_row)
}

pub(crate) fn album_ids_of(conn: &Connection, track_id: i64) -> Result<Vec<i64>, LibraryError> {
    super::query_ids(
        conn,
        "SELECT album_id FROM album_track WHERE track_id = ?1 ORDER BY album_id",
        params![track_id],
    )
}

pub(crate) fn artist_ids_of(conn: &Connection, track_id: i64) -> Result<Vec<i64>, LibraryError> {
    super::query_ids(
        conn,
        "SELECT artist_id FROM artist_track WHERE track_id = ?1 ORDER BY artist_id",
        params![track_id],
    )
}

/// Tracks whose filename lies inside the directory `dir`, in filename order.
pub fn under_prefix(conn: &Connection, dir: &str) -> Result<Vec<Track>, LibraryError> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    let sql = format!(
        "SELECT {} FROM track
         WHERE substr(filename, 1, length(?1)) = ?1
         ORDER BY filename",
        TRACK_COLUMNS
    );
    super::query_all(conn, &sql, params![prefix], track_from_row)
}

pub fn search(conn: &Connection, filter: &Filter<TrackField>) -> Result<Vec<Track>, LibraryError> {
    super::search_table(conn, TRACK_COLUMNS, "track", filter, track_from_row)
}

pub fn all(conn: &Connection, page: &Page<TrackField>) -> Result<Vec<Track>, LibraryError> {
    super::page_table(conn, TRACK_COLUMNS, "track", page, track_from_row)
}

pub fn count(conn: &Connection) -> Result<usize, LibraryError> {
    super::count_table(conn, "track")
}

pub fn update(conn: &Connection, track_id: i64, patch: &TrackPatch) -> Result<bool, LibraryError> {
    patch.apply(conn, track_id)
}

pub(crate) fn insert(
    conn: &Connection,
    filename: &str,
    name: Option<&str>,
    tracknumber: Option<i64>,
    grouping: Option<&str>,
) -> Result<Track, LibraryError> {
    conn.execute(
        "INSERT INTO track (tracknumber, name, grouping, filename) VALUES (?1, ?2, ?3, ?4)",
        params![tracknumber, name, grouping, filename],
    )?;
    Ok(Track {
        id: conn.last_insert_rowid(),
        tracknumber,
        name: name.map(str::to_string),
        grouping: grouping.map(str::to_string),
        filename: filename.to_string(),
    })
}

/// Deletes the track row; its link rows go with it through `ON DELETE CASCADE`.
pub(crate) fn delete(conn: &Connection, track_id: i64) -> Result<bool, LibraryError> {
    let changed = conn.execute("DELETE FROM track WHERE id = ?1", params![track_id])?;
    Ok(changed > 0)
}
