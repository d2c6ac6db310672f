//! Partial updates. A patch carries only the columns meant to change; applying an
//! empty patch touches nothing.

use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::error::LibraryError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtistPatch {
    pub sortname: Option<Option<String>>,
    pub musicbrainz_artistid: Option<Option<String>>,
}

impl ArtistPatch {
    pub fn sortname(mut self, value: Option<String>) -> Self {
        self.sortname = Some(value);
        self
    }

    pub fn musicbrainz_artistid(mut self, value: Option<String>) -> Self {
        self.musicbrainz_artistid = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sortname.is_none() && self.musicbrainz_artistid.is_none()
    }

    pub fn apply(&self, conn: &Connection, artist_id: i64) -> Result<bool, LibraryError> {
        let mut set = SetClause::default();
        set.push("sortname", &self.sortname);
        set.push("musicbrainz_artistid", &self.musicbrainz_artistid);
        set.run(conn, "artist", artist_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlbumPatch {
    pub date: Option<Option<String>>,
    pub musicbrainz_albumid: Option<Option<String>>,
}

impl AlbumPatch {
    pub fn date(mut self, value: Option<String>) -> Self {
        self.date = Some(value);
        self
    }

    pub fn musicbrainz_albumid(mut self, value: Option<String>) -> Self {
        self.musicbrainz_albumid = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.musicbrainz_albumid.is_none()
    }

    pub fn apply(&self, conn: &Connection, album_id: i64) -> Result<bool, LibraryError> {
        let mut set = SetClause::default();
        set.push("date", &self.date);
        set.push("musicbrainz_albumid", &self.musicbrainz_albumid);
        set.run(conn, "album", album_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackPatch {
    pub filename: Option<String>,
    pub name: Option<Option<String>>,
    pub tracknumber: Option<Option<i64>>,
    pub grouping: Option<Option<String>>,
}

impl TrackPatch {
    pub fn filename(mut self, value: impl Into<String>) -> Self {
        self.filename = Some(value.into());
        self
    }

    pub fn name(mut self, value: Option<String>) -> Self {
        self.name = Some(value);
        self
    }

    pub fn tracknumber(mut self, value: Option<i64>) -> Self {
        self.tracknumber = Some(value);
        self
    }

    pub fn grouping(mut self, value: Option<String>) -> Self {
        self.grouping = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filename.is_none()
            && self.name.is_none()
            && self.tracknumber.is_none()
            && self.grouping.is_none()
    }

    pub fn apply(&self, conn: &Connection, track_id: i64) -> Result<bool, LibraryError> {
        let mut set = SetClause::default();
        set.push("filename", &self.filename);
        set.push("name", &self.name);
        set.push("tracknumber", &self.tracknumber);
        set.push("grouping", &self.grouping);
        set.run(conn, "track", track_id)
    }
}

#[derive(Default)]
struct SetClause<'a> {
    columns: Vec<&'static str>,
    values: Vec<&'a dyn ToSql>,
}

impl<'a> SetClause<'a> {
    fn push<T: ToSql>(&mut self, column: &'static str, value: &'a Option<T>) {
        if let Some(value) = value {
            self.columns.push(column);
            self.values.push(value);
        }
    }

    fn run(self, conn: &Connection, table: &str, id: i64) -> Result<bool, LibraryError> {
        if self.columns.is_empty() {
            return Ok(false);
        }
        let assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{} = ?{}", column, index + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            assignments.join(", "),
            self.columns.len() + 1
        );
        let mut values: Vec<&dyn ToSql> = self.values.iter().copied().collect();
        values.push(&id);
        let changed = conn.execute(&sql, values.as_slice())?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_schema;
    use rusqlite::params;

    fn conn_with_track() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO track (tracknumber, name, grouping, filename) VALUES (?1, ?2, ?3, ?4)",
            params![1, "T1", "Rock", "a.mp3"],
        )
        .unwrap();
        conn
    }

    #[test]
    fn empty_patch_is_a_noop() {
        let conn = conn_with_track();
        assert!(TrackPatch::default().is_empty());
        assert!(!TrackPatch::default().apply(&conn, 1).unwrap());
    }

    #[test]
    fn only_set_fields_change() {
        let conn = conn_with_track();
        let patch = TrackPatch::default().name(Some("T2".to_string())).grouping(None);
        assert!(patch.apply(&conn, 1).unwrap());

        let row: (Option<i64>, Option<String>, Option<String>, String) = conn
            .query_row(
                "SELECT tracknumber, name, grouping, filename FROM track WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(row, (Some(1), Some("T2".to_string()), None, "a.mp3".to_string()));
    }

    #[test]
    fn missing_row_reports_unchanged() {
        let conn = conn_with_track();
        let patch = TrackPatch::default().filename("b.mp3");
        assert!(!patch.apply(&conn, 99).unwrap());
    }

    #[test]
    fn artist_patch_backfills() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute("INSERT INTO artist (name) VALUES ('X')", []).unwrap();
        let patch = ArtistPatch::default()
            .sortname(Some("X, The".to_string()))
            .musicbrainz_artistid(Some("mb-x".to_string()));
        assert!(patch.apply(&conn, 1).unwrap());
        let row: (Option<String>, Option<String>) = conn
            .query_row(
                "SELECT sortname, musicbrainz_artistid FROM artist WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(row, (Some("X, The".to_string()), Some("mb-x".to_string())));
    }
}
