use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use metadata::{Extractor, LoftyExtractor};
use tracing::info;

pub mod catalog;
mod error;
pub mod patch;
pub mod reconcile;
pub mod scan;
pub mod schema;
mod store;
pub mod watch;

pub use error::LibraryError;
pub use patch::{AlbumPatch, ArtistPatch, TrackPatch};
pub use reconcile::{Observed, Reconciler, TrackTags};
pub use scan::{collect_audio_files, ScanStats, Scanner};
pub use store::{LibraryStats, Store};
pub use watch::{fs_events, EventDispatcher, FsEvent, LibraryWatcher};

/// A media root bound to its catalog. Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct Library {
    root: PathBuf,
    reconciler: Reconciler,
    extractor: Arc<dyn Extractor>,
}

impl Library {
    /// Opens (or creates) the catalog at `db_path` for the media under `root`,
    /// reading tags with lofty.
    pub fn open(root: PathBuf, db_path: &Path) -> Result<Self, LibraryError> {
        let store = Store::open(db_path)?;
        Ok(Self::with_store(root, store, Arc::new(LoftyExtractor)))
    }

    pub fn with_store(root: PathBuf, store: Store, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            root,
            reconciler: Reconciler::new(store),
            extractor,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &Store {
        self.reconciler.store()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn stats(&self) -> Result<LibraryStats, LibraryError> {
        self.store().stats()
    }

    /// Walks the whole media root once. Files already catalogued are left alone.
    pub fn scan(&self, workers: usize) -> Result<ScanStats, LibraryError> {
        info!("Scanning {:?} with {} workers", self.root, workers.max(1));
        Scanner::new(self.root.clone(), self.reconciler.clone(), self.extractor.clone())
            .workers(workers)
            .run()
    }

    pub fn watch(&self, poll: Duration) -> Result<LibraryWatcher, LibraryError> {
        LibraryWatcher::start(
            self.root.clone(),
            self.reconciler.clone(),
            self.extractor.clone(),
            poll,
        )
    }
}
