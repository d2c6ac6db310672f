use common::{Album, Artist, Track};
use rusqlite::{params, Connection, Row};

use super::artists::{artist_from_row, ARTIST_COLUMNS};
use super::query::{Field, Filter, Page};
use super::tracks::{track_from_row, TRACK_COLUMNS};
use crate::error::LibraryError;
use crate::patch::AlbumPatch;

pub(crate) const ALBUM_COLUMNS: &str =
    "album.id, album.name, album.date, album.musicbrainz_albumid";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlbumField {
    Id,
    Name,
    Date,
    MusicbrainzAlbumId,
}

impl Field for AlbumField {
    fn column(self) -> &'static str {
        match self {
            AlbumField::Id => "id",
            AlbumField::Name => "name",
            AlbumField::Date => "date",
            AlbumField::MusicbrainzAlbumId => "musicbrainz_albumid",
        }
    }
}

pub(crate) fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        musicbrainz_albumid: row.get(3)?,
    })
}

pub fn get(conn: &Connection, album_id: i64) -> Result<Option<Album>, LibraryError> {
    let sql = format!("SELECT {} FROM album WHERE id = ?1", ALBUM_COLUMNS);
    super::query_one(conn, &sql, params![album_id], album_from_row)
}

pub fn find_by_musicbrainz_id(conn: &Connection, mbid: &str) -> Result<Option<Album>, LibraryError> {
    let sql = format!("SELECT {} FROM album WHERE musicbrainz_albumid = ?1", ALBUM_COLUMNS);
    super::query_one(conn, &sql, params![mbid], album_from_row)
}

/// An album called `name` already credited to one of `artist_ids`. Artists are
/// tried in the order given and the first hit wins.
pub fn find_by_name_and_artist(
    conn: &Connection,
    name: &str,
    artist_ids: &[i64],
) -> Result<Option<Album>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM album
         JOIN album_artist ON album_artist.album_id = album.id
         WHERE album.name = ?1 AND album_artist.artist_id = ?2
         ORDER BY album.id LIMIT 1",
        ALBUM_COLUMNS
    );
    for artist_id in artist_ids {
        if let Some(album) = super::query_one(conn, &sql, params![name, artist_id], album_from_row)? {
            return Ok(Some(album));
        }
    }
    Ok(None)
}

pub fn tracks_of(conn: &Connection, album_id: i64) -> Result<Vec<Track>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM track
         JOIN album_track ON album_track.track_id = track.id
         WHERE album_track.album_id = ?1
         ORDER BY track.tracknumber, track.name, track.id",
        TRACK_COLUMNS
    );
    super::query_all(conn, &sql, params![album_id], track_from_row)
}

pub fn artists_of(conn: &Connection, album_id: i64) -> Result<Vec<Artist>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM artist
         JOIN album_artist ON album_artist.artist_id = artist.id
         WHERE album_artist.album_id = ?1
         ORDER BY artist.name, artist.id",
        ARTIST_COLUMNS
    );
    super::query_all(conn, &sql, params![album_id], artist_from_row)
}

pub fn search(conn: &Connection, filter: &Filter<AlbumField>) -> Result<Vec<Album>, LibraryError> {
    super::search_table(conn, ALBUM_COLUMNS, "album", filter, album_from_row)
}

pub fn all(conn: &Connection, page: &Page<AlbumField>) -> Result<Vec<Album>, LibraryError> {
    super::page_table(conn, ALBUM_COLUMNS, "album", page, album_from_row)
}

pub fn count(conn: &Connection) -> Result<usize, LibraryError> {
    super::count_table(conn, "album")
}

pub fn update(conn: &Connection, album_id: i64, patch: &AlbumPatch) -> Result<bool, LibraryError> {
    patch.apply(conn, album_id)
}

/// Inserts a new album. The raw database error is returned so callers can tell a
/// lost `musicbrainz_albumid` race from a real failure.
pub(crate) fn insert(
    conn: &Connection,
    name: &str,
    date: Option<&str>,
    musicbrainz_albumid: Option<&str>,
) -> rusqlite::Result<Album> {
    conn.execute(
        "INSERT INTO album (name, date, musicbrainz_albumid) VALUES (?1, ?2, ?3)",
        params![name, date, musicbrainz_albumid],
    )?;
    Ok(Album {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        date: date.map(str::to_string),
        musicbrainz_albumid: musicbrainz_albumid.map(str::to_string),
    })
}

/// Deletes the album when no track links to it any more.
pub(crate) fn delete_if_orphaned(conn: &Connection, album_id: i64) -> Result<bool, LibraryError> {
    let changed = conn.execute(
        "DELETE FROM album WHERE id = ?1
         AND NOT EXISTS (SELECT 1 FROM album_track WHERE album_id = ?1)",
        params![album_id],
    )?;
    Ok(changed > 0)
}

/// Drops `album_artist` rows whose artist no longer appears on any of the album's tracks.
pub(crate) fn prune_artists(conn: &Connection, album_id: i64) -> Result<usize, LibraryError> {
    Ok(conn.execute(
        "DELETE FROM album_artist WHERE album_id = ?1
         AND artist_id NOT IN (
             SELECT artist_track.artist_id FROM artist_track
             JOIN album_track ON album_track.track_id = artist_track.track_id
             WHERE album_track.album_id = ?1)",
        params![album_id],
    )?)
}
