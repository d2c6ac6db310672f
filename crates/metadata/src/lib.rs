use std::collections::BTreeMap;
use std::path::Path;

use lofty::error::LoftyError;
use lofty::prelude::{ItemKey, TaggedFileExt};
use lofty::tag::Tag;

/// Tag keys the catalog consumes, paired with the item each is read from.
fn tag_keys() -> [(&'static str, ItemKey); 8] {
    [
        ("artist", ItemKey::TrackArtist),
        ("artistsort", ItemKey::TrackArtistSortOrder),
        ("musicbrainz_artistid", ItemKey::MusicBrainzArtistId),
        ("album", ItemKey::AlbumTitle),
        ("musicbrainz_albumid", ItemKey::MusicBrainzReleaseId),
        ("title", ItemKey::TrackTitle),
        ("tracknumber", ItemKey::TrackNumber),
        ("grouping", ItemKey::ContentGroup),
    ]
}

/// Multi-valued tag data for one file, keyed by lowercase tag name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TagMap::insert_all`].
    pub fn with<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_all(key, values);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn insert_all<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.insert(key, value);
        }
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(|value| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|values| values.is_empty())
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Reads tag data for a file. `Ok(None)` means the file parsed but carries no tags.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Option<TagMap>, MetadataError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl Extractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> Result<Option<TagMap>, MetadataError> {
        read_tags(path)
    }
}

pub fn read_tags(path: &Path) -> Result<Option<TagMap>, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => tag,
        None => return Ok(None),
    };

    let map = tag_map(tag);
    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(map))
    }
}

fn tag_map(tag: &Tag) -> TagMap {
    let mut map = TagMap::new();
    for (key, item_key) in tag_keys() {
        map.insert_all(key, non_blank(tag.get_strings(&item_key)));
    }

    let date = non_blank(tag.get_strings(&ItemKey::RecordingDate));
    if date.is_empty() {
        map.insert_all("date", non_blank(tag.get_strings(&ItemKey::Year)));
    } else {
        map.insert_all("date", date);
    }
    map
}

fn non_blank<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(|value| value.trim_matches('\0').trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
        .collect()
}
