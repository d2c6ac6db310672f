//! Turns (path, tags) observations into catalog mutations.
//!
//! Every public operation runs in a single store transaction, so a failure part
//! way through leaves the catalog as it was. After each operation no album or
//! artist is left without tracks and no link row points at a missing entity.

use common::Track;
use metadata::TagMap;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::catalog::{albums, artists, tracks};
use crate::error::{is_duplicate, LibraryError};
use crate::patch::{AlbumPatch, ArtistPatch, TrackPatch};
use crate::store::Store;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtistCredit {
    pub name: String,
    pub sortname: Option<String>,
    pub musicbrainz_artistid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlbumCredit {
    pub name: String,
    pub date: Option<String>,
    pub musicbrainz_albumid: Option<String>,
}

/// The part of a file's tags the catalog cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackTags {
    pub artists: Vec<ArtistCredit>,
    pub album: Option<AlbumCredit>,
    pub title: Option<String>,
    pub tracknumber: Option<i64>,
    pub grouping: Option<String>,
}

impl TrackTags {
    /// Interprets raw tags. Returns `None` when no artist is credited, since a
    /// track must belong to at least one artist.
    pub fn from_tags(tags: &TagMap) -> Option<Self> {
        let sortnames = tags.values("artistsort");
        let artist_ids = tags.values("musicbrainz_artistid");

        let mut artists: Vec<ArtistCredit> = Vec::new();
        for (index, raw) in tags.values("artist").iter().enumerate() {
            let Some(name) = clean(raw) else {
                continue;
            };
            let credit = ArtistCredit {
                name,
                sortname: sortnames.get(index).and_then(|value| clean(value)),
                musicbrainz_artistid: artist_ids.get(index).and_then(|value| clean(value)),
            };
            let repeated = artists.iter().any(|seen| {
                seen.name == credit.name && seen.musicbrainz_artistid == credit.musicbrainz_artistid
            });
            if !repeated {
                artists.push(credit);
            }
        }
        if artists.is_empty() {
            return None;
        }

        let album = tags.first("album").and_then(clean).map(|name| AlbumCredit {
            name,
            date: tags.first("date").and_then(clean),
            musicbrainz_albumid: tags.first("musicbrainz_albumid").and_then(clean),
        });

        Some(Self {
            artists,
            album,
            title: tags.first("title").and_then(clean),
            tracknumber: tags.first("tracknumber").and_then(parse_tracknumber),
            grouping: tags.first("grouping").and_then(clean),
        })
    }
}

fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Leading integer of values such as `"3"`, `"03"` or `"3/12"`.
fn parse_tracknumber(value: &str) -> Option<i64> {
    value.split('/').next()?.trim().parse().ok()
}

/// Result of [`Reconciler::observe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    Created(Track),
    /// The path was already catalogued; nothing changed.
    Existing(Track),
    /// No usable tags; nothing changed.
    Skipped,
}

impl Observed {
    pub fn track(&self) -> Option<&Track> {
        match self {
            Observed::Created(track) | Observed::Existing(track) => Some(track),
            Observed::Skipped => None,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: Store,
}

impl Reconciler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn find(&self, path: &str) -> Result<Option<Track>, LibraryError> {
        self.store.read(|conn| tracks::find_by_filename(conn, path))
    }

    pub fn contains(&self, path: &str) -> Result<bool, LibraryError> {
        Ok(self.find(path)?.is_some())
    }

    /// Adds the track at `path` unless it is already catalogued. `None` tags mean
    /// the extractor found nothing to read.
    pub fn observe(&self, path: &str, tags: Option<&TagMap>) -> Result<Observed, LibraryError> {
        let Some(tags) = tags else {
            info!("Skipping {} (no tags)", path);
            return Ok(Observed::Skipped);
        };
        let Some(parsed) = TrackTags::from_tags(tags) else {
            info!("Skipping {} (no artist tag)", path);
            return Ok(Observed::Skipped);
        };

        self.store.write(|tx| {
            if let Some(existing) = tracks::find_by_filename(tx, path)? {
                return Ok(Observed::Existing(existing));
            }
            let artist_ids = resolve_artists(tx, &parsed.artists)?;
            let album_id = resolve_album(tx, parsed.album.as_ref(), &artist_ids)?;
            let track = tracks::insert(
                tx,
                path,
                parsed.title.as_deref(),
                parsed.tracknumber,
                parsed.grouping.as_deref(),
            )?;
            install_links(tx, track.id, album_id, &artist_ids)?;
            debug!("Catalogued {} as track {}", path, track.id);
            Ok(Observed::Created(track))
        })
    }

    /// Re-reads tags for a catalogued track: relinks its album and artists, updates
    /// its own columns, then drops whatever the old tags referenced and nothing
    /// references any more.
    pub fn resync(&self, path: &str, tags: &TagMap) -> Result<Track, LibraryError> {
        self.store.write(|tx| {
            let track = tracks::find_by_filename(tx, path)?
                .ok_or_else(|| LibraryError::NotFound(path.to_string()))?;
            let parsed = TrackTags::from_tags(tags)
                .ok_or_else(|| LibraryError::Unreadable(path.to_string()))?;
            let prior_albums = tracks::album_ids_of(tx, track.id)?;
            let prior_artists = tracks::artist_ids_of(tx, track.id)?;

            tx.execute("DELETE FROM album_track WHERE track_id = ?1", params![track.id])?;
            tx.execute("DELETE FROM artist_track WHERE track_id = ?1", params![track.id])?;

            let artist_ids = resolve_artists(tx, &parsed.artists)?;
            let album_id = resolve_album(tx, parsed.album.as_ref(), &artist_ids)?;
            let patch = TrackPatch::default()
                .name(parsed.title.clone())
                .tracknumber(parsed.tracknumber)
                .grouping(parsed.grouping.clone());
            tracks::update(tx, track.id, &patch)?;
            install_links(tx, track.id, album_id, &artist_ids)?;

            collect_orphans(tx, &prior_albums, &prior_artists)?;
            if let Some(album_id) = album_id {
                albums::prune_artists(tx, album_id)?;
            }

            tracks::get(tx, track.id)?.ok_or_else(|| LibraryError::NotFound(path.to_string()))
        })
    }

    /// Drops the track at `path`. Returns `false` when the path was never catalogued.
    pub fn remove(&self, path: &str) -> Result<bool, LibraryError> {
        self.store.write(|tx| match tracks::find_by_filename(tx, path)? {
            Some(track) => {
                remove_track(tx, &track)?;
                debug!("Removed track {} ({})", track.id, path);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    /// Drops every track under the directory `dir`. Used when a whole directory
    /// leaves the watched tree.
    pub fn remove_tree(&self, dir: &str) -> Result<usize, LibraryError> {
        self.store.write(|tx| {
            let gone = tracks::under_prefix(tx, dir)?;
            for track in &gone {
                remove_track(tx, track)?;
            }
            Ok(gone.len())
        })
    }

    /// Moves a track to a new path in place, keeping its id and links. A track
    /// already catalogued at `new_path` is removed first.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<Track, LibraryError> {
        self.store.write(|tx| {
            let track = tracks::find_by_filename(tx, old_path)?
                .ok_or_else(|| LibraryError::NotFound(old_path.to_string()))?;
            move_track(tx, track, new_path)
        })
    }

    /// Renames every track under the directory `old_dir` to sit under `new_dir`.
    pub fn rename_tree(&self, old_dir: &str, new_dir: &str) -> Result<usize, LibraryError> {
        let old_prefix = old_dir.trim_end_matches('/');
        let new_prefix = new_dir.trim_end_matches('/');
        self.store.write(|tx| {
            let moved = tracks::under_prefix(tx, old_prefix)?;
            let count = moved.len();
            for track in moved {
                let new_path = format!("{}{}", new_prefix, &track.filename[old_prefix.len()..]);
                move_track(tx, track, &new_path)?;
            }
            Ok(count)
        })
    }
}

fn move_track(conn: &Connection, track: Track, new_path: &str) -> Result<Track, LibraryError> {
    if track.filename == new_path {
        return Ok(track);
    }
    if let Some(displaced) = tracks::find_by_filename(conn, new_path)? {
        debug!("Replacing track {} at {}", displaced.id, new_path);
        remove_track(conn, &displaced)?;
    }
    tracks::update(conn, track.id, &TrackPatch::default().filename(new_path))?;
    Ok(Track {
        filename: new_path.to_string(),
        ..track
    })
}

fn remove_track(conn: &Connection, track: &Track) -> Result<(), LibraryError> {
    let album_ids = tracks::album_ids_of(conn, track.id)?;
    let artist_ids = tracks::artist_ids_of(conn, track.id)?;
    tracks::delete(conn, track.id)?;
    collect_orphans(conn, &album_ids, &artist_ids)
}

fn collect_orphans(
    conn: &Connection,
    album_ids: &[i64],
    artist_ids: &[i64],
) -> Result<(), LibraryError> {
    for &album_id in album_ids {
        if albums::delete_if_orphaned(conn, album_id)? {
            debug!("Deleted empty album {}", album_id);
        } else {
            albums::prune_artists(conn, album_id)?;
        }
    }
    for &artist_id in artist_ids {
        if artists::delete_if_orphaned(conn, artist_id)? {
            debug!("Deleted artist {} with no tracks", artist_id);
        }
    }
    Ok(())
}

fn resolve_artists(conn: &Connection, credits: &[ArtistCredit]) -> Result<Vec<i64>, LibraryError> {
    let mut ids = Vec::with_capacity(credits.len());
    for credit in credits {
        let id = resolve_artist(conn, credit)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn resolve_artist(conn: &Connection, credit: &ArtistCredit) -> Result<i64, LibraryError> {
    let existing = match credit.musicbrainz_artistid.as_deref() {
        Some(mbid) => match artists::find_by_musicbrainz_id(conn, mbid)? {
            Some(artist) => Some(artist),
            None => artists::find_unidentified_by_name(conn, &credit.name)?,
        },
        None => artists::find_by_name(conn, &credit.name)?,
    };

    if let Some(artist) = existing {
        let mut patch = ArtistPatch::default();
        if artist.musicbrainz_artistid.is_none() && credit.musicbrainz_artistid.is_some() {
            patch = patch.musicbrainz_artistid(credit.musicbrainz_artistid.clone());
        }
        if artist.sortname.is_none() && credit.sortname.is_some() {
            patch = patch.sortname(credit.sortname.clone());
        }
        artists::update(conn, artist.id, &patch)?;
        return Ok(artist.id);
    }

    let artist = artists::insert(
        conn,
        &credit.name,
        credit.sortname.as_deref(),
        credit.musicbrainz_artistid.as_deref(),
    )?;
    Ok(artist.id)
}

fn resolve_album(
    conn: &Connection,
    credit: Option<&AlbumCredit>,
    artist_ids: &[i64],
) -> Result<Option<i64>, LibraryError> {
    let Some(credit) = credit else {
        return Ok(None);
    };

    let existing = match credit.musicbrainz_albumid.as_deref() {
        Some(mbid) => albums::find_by_musicbrainz_id(conn, mbid)?,
        None => albums::find_by_name_and_artist(conn, &credit.name, artist_ids)?,
    };

    if let Some(album) = existing {
        if album.date.is_none() && credit.date.is_some() {
            albums::update(conn, album.id, &AlbumPatch::default().date(credit.date.clone()))?;
        }
        return Ok(Some(album.id));
    }

    let album = albums::insert(
        conn,
        &credit.name,
        credit.date.as_deref(),
        credit.musicbrainz_albumid.as_deref(),
    )?;
    Ok(Some(album.id))
}

#[derive(Clone, Copy)]
enum Link {
    AlbumTrack,
    AlbumArtist,
    ArtistTrack,
}

impl Link {
    fn table(self) -> &'static str {
        match self {
            Link::AlbumTrack => "album_track",
            Link::AlbumArtist => "album_artist",
            Link::ArtistTrack => "artist_track",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Link::AlbumTrack => "INSERT INTO album_track (album_id, track_id) VALUES (?1, ?2)",
            Link::AlbumArtist => "INSERT INTO album_artist (album_id, artist_id) VALUES (?1, ?2)",
            Link::ArtistTrack => "INSERT INTO artist_track (artist_id, track_id) VALUES (?1, ?2)",
        }
    }
}

/// Inserts one link row. An existing identical row is a benign duplicate.
fn link(conn: &Connection, kind: Link, left: i64, right: i64) -> Result<bool, LibraryError> {
    match conn.execute(kind.insert_sql(), params![left, right]) {
        Ok(_) => Ok(true),
        Err(err) if is_duplicate(&err) => {
            debug!("Link already present in {}: ({}, {})", kind.table(), left, right);
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn install_links(
    conn: &Connection,
    track_id: i64,
    album_id: Option<i64>,
    artist_ids: &[i64],
) -> Result<(), LibraryError> {
    if let Some(album_id) = album_id {
        link(conn, Link::AlbumTrack, album_id, track_id)?;
        for &artist_id in artist_ids {
            link(conn, Link::AlbumArtist, album_id, artist_id)?;
        }
    }
    for &artist_id in artist_ids {
        link(conn, Link::ArtistTrack, artist_id, track_id)?;
    }
    Ok(())
}
