use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use common::{is_audio_path, path_key, shard_for};
use metadata::Extractor;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::LibraryError;
use crate::reconcile::{Observed, Reconciler};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub files: usize,
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl ScanStats {
    fn merge(&mut self, other: &ScanStats) {
        self.files += other.files;
        self.created += other.created;
        self.existing += other.existing;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// One pass over a media root, feeding every audio file to `observe`.
/// Safe to repeat: files already in the catalog are counted, not re-read.
pub struct Scanner {
    root: PathBuf,
    reconciler: Reconciler,
    extractor: Arc<dyn Extractor>,
    workers: usize,
}

impl Scanner {
    pub fn new(root: PathBuf, reconciler: Reconciler, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            root,
            reconciler,
            extractor,
            workers: 1,
        }
    }

    /// Number of worker threads. Each file is owned by exactly one worker,
    /// chosen by hashing its path.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run(&self) -> Result<ScanStats, LibraryError> {
        let started = Instant::now();
        let files = collect_audio_files(&self.root);
        info!("Found {} audio files under {:?}", files.len(), self.root);

        let workers = self.workers.min(files.len()).max(1);
        let mut shards: Vec<Vec<PathBuf>> = vec![Vec::new(); workers];
        for file in files {
            let shard = shard_for(&file.to_string_lossy(), workers);
            shards[shard].push(file);
        }

        let abort = AtomicBool::new(false);
        let results: Vec<Result<ScanStats, LibraryError>> = if workers == 1 {
            shards
                .iter()
                .map(|shard| self.scan_shard(shard, &abort))
                .collect()
        } else {
            thread::scope(|scope| {
                let abort = &abort;
                let handles: Vec<_> = shards
                    .iter()
                    .map(|shard| scope.spawn(move || self.scan_shard(shard, abort)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(payload) => panic::resume_unwind(payload),
                    })
                    .collect()
            })
        };

        let mut stats = ScanStats::default();
        for result in results {
            stats.merge(&result?);
        }
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Scan finished: {} files, {} new, {} known, {} skipped, {} failed in {}ms",
            stats.files, stats.created, stats.existing, stats.skipped, stats.failed, stats.elapsed_ms
        );
        Ok(stats)
    }

    fn scan_shard(&self, files: &[PathBuf], abort: &AtomicBool) -> Result<ScanStats, LibraryError> {
        let mut stats = ScanStats::default();
        for file in files {
            if abort.load(Ordering::Relaxed) {
                break;
            }
            stats.files += 1;
            match self.scan_file(file) {
                Ok(Observed::Created(_)) => stats.created += 1,
                Ok(Observed::Existing(_)) => stats.existing += 1,
                Ok(Observed::Skipped) => stats.skipped += 1,
                Err(err) if err.is_store_unavailable() => {
                    abort.store(true, Ordering::Relaxed);
                    return Err(err);
                }
                Err(err) => {
                    warn!("Failed to catalogue {:?}: {}", file, err);
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }

    fn scan_file(&self, file: &Path) -> Result<Observed, LibraryError> {
        let Some(key) = catalog_key(file) else {
            return Ok(Observed::Skipped);
        };
        if let Some(track) = self.reconciler.find(&key)? {
            return Ok(Observed::Existing(track));
        }
        let tags = match self.extractor.extract(file) {
            Ok(tags) => tags,
            Err(err) => {
                warn!("Failed to read tags for {:?}: {}", file, err);
                return Ok(Observed::Skipped);
            }
        };
        self.reconciler.observe(&key, tags.as_ref())
    }
}

/// Audio files under `root` in sorted path order. Symlinks are not followed, and
/// paths that cannot be catalogued are left out.
pub fn collect_audio_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio_path(entry.path()))
        .filter(|entry| catalog_key(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect()
}

/// The catalog key for `path`, or `None` (logged) when the path is not UTF-8.
pub(crate) fn catalog_key(path: &Path) -> Option<String> {
    let key = path_key(path);
    if key.is_none() {
        warn!("Skipping {:?}: path is not valid UTF-8", path);
    }
    key
}
