use common::{Album, Artist, Track};
use rusqlite::{params, Connection, Row};

use super::albums::{album_from_row, ALBUM_COLUMNS};
use super::query::{Field, Filter, Page};
use super::tracks::{track_from_row, TRACK_COLUMNS};
use crate::error::LibraryError;
use crate::patch::ArtistPatch;

pub(crate) const ARTIST_COLUMNS: &str =
    "artist.id, artist.name, artist.sortname, artist.musicbrainz_artistid";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtistField {
    Id,
    Name,
    Sortname,
    MusicbrainzArtistId,
}

impl Field for ArtistField {
    fn column(self) -> &'static str {
        match self {
            ArtistField::Id => "id",
            ArtistField::Name => "name",
            ArtistField::Sortname => "sortname",
            ArtistField::MusicbrainzArtistId => "musicbrainz_artistid",
        }
    }
}

pub(crate) fn artist_from_row(row: &Row<'_>) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        sortname: row.get(2)?,
        musicbrainz_artistid: row.get(3)?,
    })
}

pub fn get(conn: &Connection, artist_id: i64) -> Result<Option<Artist>, LibraryError> {
    let sql = format!("SELECT {} FROM artist WHERE id = ?1", ARTIST_COLUMNS);
    super::query_one(conn, &sql, params![artist_id], artist_from_row)
}

pub fn find_by_musicbrainz_id(
    conn: &Connection,
    mbid: &str,
) -> Result<Option<Artist>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM artist WHERE musicbrainz_artistid = ?1",
        ARTIST_COLUMNS
    );
    super::query_one(conn, &sql, params![mbid], artist_from_row)
}

/// Exact name match. Rows without a MusicBrainz id come first, then the oldest.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Artist>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM artist WHERE name = ?1
         ORDER BY musicbrainz_artistid IS NOT NULL, id LIMIT 1",
        ARTIST_COLUMNS
    );
    super::query_one(conn, &sql, params![name], artist_from_row)
}

/// Exact name match restricted to rows that carry no MusicBrainz id yet.
pub fn find_unidentified_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Artist>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM artist WHERE name = ?1 AND musicbrainz_artistid IS NULL
         ORDER BY id LIMIT 1",
        ARTIST_COLUMNS
    );
    super::query_one(conn, &sql, params![name], artist_from_row)
}

pub fn tracks_of(conn: &Connection, artist_id: i64) -> Result<Vec<Track>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM track
         JOIN artist_track ON artist_track.track_id = track.id
         WHERE artist_track.artist_id = ?1
         ORDER BY track.name, track.id",
        TRACK_COLUMNS
    );
    super::query_all(conn, &sql, params![artist_id], track_from_row)
}

pub fn albums_of(conn: &Connection, artist_id: i64) -> Result<Vec<Album>, LibraryError> {
    let sql = format!(
        "SELECT {} FROM album
         JOIN album_artist ON album_artist.album_id = album.id
         WHERE album_artist.artist_id = ?1
         ORDER BY album.date, album.id",
        ALBUM_COLUMNS
    );
    super::query_all(conn, &sql, params![artist_id], album_from_row)
}

pub fn search(conn: &Connection, filter: &Filter<ArtistField>) -> Result<Vec<Artist>, LibraryError> {
    super::search_table(conn, ARTIST_COLUMNS, "artist", filter, artist_from_row)
}

pub fn all(conn: &Connection, page: &Page<ArtistField>) -> Result<Vec<Artist>, LibraryError> {
    super::page_table(conn, ARTIST_COLUMNS, "artist", page, artist_from_row)
}

pub fn count(conn: &Connection) -> Result<usize, LibraryError> {
    super::count_table(conn, "artist")
}

pub fn update(conn: &Connection, artist_id: i64, patch: &ArtistPatch) -> Result<bool, LibraryError> {
    patch.apply(conn, artist_id)
}

/// Inserts a new artist. The raw database error is returned so callers can tell a
/// lost `musicbrainz_artistid` race from a real failure.
pub(crate) fn insert(
    conn: &Connection,
    name: &str,
    sortname: Option<&str>,
    musicbrainz_artistid: Option<&str>,
) -> rusqlite::Result<Artist> {
    conn.execute(
        "INSERT INTO artist (name, sortname, musicbrainz_artistid) VALUES (?1, ?2, ?3)",
        params![name, sortname, musicbrainz_artistid],
    )?;
    Ok(Artist {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        sortname: sortname.map(str::to_string),
        musicbrainz_artistid: musicbrainz_artistid.map(str::to_string),
    })
}

/// Deletes the artist when no track credits it any more. Its `album_artist`
/// rows cascade.
pub(crate) fn delete_if_orphaned(conn: &Connection, artist_id: i64) -> Result<bool, LibraryError> {
    let changed = conn.execute(
        "DELETE FROM artist WHERE id = ?1
         AND NOT EXISTS (SELECT 1 FROM artist_track WHERE artist_id = ?1)",
        params![artist_id],
    )?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::query::{Direction, Operator};
    use crate::schema::create_schema;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO artist (id, name, sortname, musicbrainz_artistid) VALUES
                 (1, 'The Band', 'Band, The', 'mb-band'),
                 (2, 'The Band', NULL, NULL),
                 (3, 'Solo', NULL, NULL);
             INSERT INTO album (id, name, date) VALUES (1, 'Late', '2010'), (2, 'Early', '1990');
             INSERT INTO album_artist (album_id, artist_id) VALUES (1, 1), (2, 1);
             INSERT INTO track (id, name, filename) VALUES (1, 'b-side', '1.mp3'), (2, 'a-side', '2.mp3');
             INSERT INTO artist_track (artist_id, track_id) VALUES (1, 1), (1, 2);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn name_lookup_prefers_unidentified_rows() {
        let conn = seeded();
        assert_eq!(find_by_name(&conn, "The Band").unwrap().map(|a| a.id), Some(2));
        assert_eq!(
            find_unidentified_by_name(&conn, "The Band").unwrap().map(|a| a.id),
            Some(2)
        );
        conn.execute("DELETE FROM artist WHERE id = 2", []).unwrap();
        assert_eq!(find_by_name(&conn, "The Band").unwrap().map(|a| a.id), Some(1));
        assert!(find_unidentified_by_name(&conn, "The Band").unwrap().is_none());
        assert_eq!(
            find_by_musicbrainz_id(&conn, "mb-band").unwrap().map(|a| a.id),
            Some(1)
        );
    }

    #[test]
    fn relationships_are_ordered() {
        let conn = seeded();
        let tracks: Vec<i64> = tracks_of(&conn, 1).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(tracks, vec![2, 1]);
        let albums: Vec<String> = albums_of(&conn, 1)
            .unwrap()
            .into_iter()
            .map(|album| album.name)
            .collect();
        assert_eq!(albums, vec!["Early", "Late"]);
    }

    #[test]
    fn orphans_are_collected() {
        let conn = seeded();
        assert!(!delete_if_orphaned(&conn, 1).unwrap());
        assert!(delete_if_orphaned(&conn, 3).unwrap());
        assert_eq!(count(&conn).unwrap(), 2);
    }

    #[test]
    fn search_and_page() {
        let conn = seeded();
        let identified = search(
            &conn,
            &Filter::all().with(ArtistField::MusicbrainzArtistId, Operator::NotEq, None::<String>),
        )
        .unwrap();
        assert_eq!(identified.len(), 1);
        assert_eq!(identified[0].sortname.as_deref(), Some("Band, The"));

        let either = search(
            &conn,
            &Filter::any()
                .with(ArtistField::Name, Operator::Eq, "Solo")
                .with(ArtistField::Id, Operator::Eq, 1),
        )
        .unwrap();
        let ids: Vec<i64> = either.iter().map(|artist| artist.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let page = Page::sorted_by(ArtistField::Name)
            .direction(Direction::Desc)
            .window(1, 0);
        let top = all(&conn, &page).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, 1);
    }
}
