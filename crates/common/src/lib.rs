use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extensions the scanner and watcher treat as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "flac", "wav", "aac", "ape", "m4a", "opus"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sortname: Option<String>,
    #[serde(default)]
    pub musicbrainz_artistid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub musicbrainz_albumid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub tracknumber: Option<i64>,
    pub name: Option<String>,
    pub grouping: Option<String>,
    pub filename: String,
}

/// The catalog key for a filesystem path. One track row exists per key.
/// Paths that are not valid UTF-8 have no key.
pub fn path_key(path: &Path) -> Option<String> {
    path.to_str().map(str::to_owned)
}

pub fn is_audio_path(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => AUDIO_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Picks the worker responsible for `key`. Stable for a given key and worker count.
pub fn shard_for(key: &str, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let hash = blake3::hash(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(head) % shards as u64) as usize
}
