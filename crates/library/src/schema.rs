use rusqlite::Connection;

pub const CATALOG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS artist (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sortname TEXT,
    musicbrainz_artistid TEXT);

CREATE UNIQUE INDEX IF NOT EXISTS artist_musicbrainz_artistid
    ON artist(musicbrainz_artistid);
CREATE INDEX IF NOT EXISTS artist_name_IDX ON artist(name);

CREATE TABLE IF NOT EXISTS album (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    date TEXT,
    musicbrainz_albumid TEXT);

CREATE UNIQUE INDEX IF NOT EXISTS album_musicbrainz_albumid
    ON album(musicbrainz_albumid);
CREATE INDEX IF NOT EXISTS album_name_IDX ON album(name);

CREATE TABLE IF NOT EXISTS track (
    id INTEGER PRIMARY KEY,
    tracknumber INTEGER,
    name TEXT,
    grouping TEXT,
    filename TEXT NOT NULL UNIQUE);

CREATE INDEX IF NOT EXISTS track_grouping_IDX ON track(grouping);
CREATE INDEX IF NOT EXISTS track_name_IDX ON track(name);
CREATE INDEX IF NOT EXISTS track_tracknumber_IDX ON track(tracknumber);

CREATE TABLE IF NOT EXISTS album_artist (
    album_id INTEGER NOT NULL REFERENCES album(id) ON DELETE CASCADE,
    artist_id INTEGER NOT NULL REFERENCES artist(id) ON DELETE CASCADE,
    PRIMARY KEY (album_id, artist_id));

CREATE INDEX IF NOT EXISTS album_artist_artist_IDX ON album_artist(artist_id);

CREATE TABLE IF NOT EXISTS album_track (
    album_id INTEGER NOT NULL REFERENCES album(id) ON DELETE CASCADE,
    track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
    PRIMARY KEY (album_id, track_id));

CREATE INDEX IF NOT EXISTS album_track_track_IDX ON album_track(track_id);

CREATE TABLE IF NOT EXISTS artist_track (
    artist_id INTEGER NOT NULL REFERENCES artist(id) ON DELETE CASCADE,
    track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
    PRIMARY KEY (artist_id, track_id));

CREATE INDEX IF NOT EXISTS artist_track_track_IDX ON artist_track(track_id);
";

pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CATALOG_SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let rows = stmt.query_map([], |row| row.get(0)).unwrap();
        rows.map(|row| row.unwrap()).collect()
    }

    #[test]
    fn creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        assert_eq!(
            table_names(&conn),
            vec![
                "album",
                "album_artist",
                "album_track",
                "artist",
                "artist_track",
                "track"
            ]
        );
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute("INSERT INTO artist (name) VALUES ('X')", []).unwrap();
        create_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM artist", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn musicbrainz_ids_are_unique_when_present() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute("INSERT INTO artist (name) VALUES ('A')", []).unwrap();
        conn.execute("INSERT INTO artist (name) VALUES ('B')", []).unwrap();
        conn.execute(
            "INSERT INTO artist (name, musicbrainz_artistid) VALUES ('C', 'mb-1')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO artist (name, musicbrainz_artistid) VALUES ('D', 'mb-1')",
            [],
        );
        assert!(dup.is_err());
    }
}
