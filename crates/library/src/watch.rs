use std::collections::HashMap;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use common::is_audio_path;
use metadata::Extractor;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::error::LibraryError;
use crate::reconcile::Reconciler;
use crate::scan::{catalog_key, collect_audio_files};

/// A filesystem change, reduced to what the catalog reacts to. Move halves carry
/// the backend's rename tracker when it has one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Modified(PathBuf),
    MovedFrom(PathBuf, Option<usize>),
    MovedTo(PathBuf, Option<usize>),
}

pub fn fs_events(event: Event) -> Vec<FsEvent> {
    let tracker = event.tracker();
    let mut paths = event.paths.into_iter();
    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => paths.map(FsEvent::Created).collect(),
        EventKind::Remove(_) => paths.map(FsEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .map(|path| FsEvent::MovedFrom(path, tracker))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
            .map(|path| FsEvent::MovedTo(path, tracker))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match (paths.next(), paths.next()) {
            (Some(from), Some(to)) => vec![
                FsEvent::MovedFrom(from, tracker),
                FsEvent::MovedTo(to, tracker),
            ],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|path| {
                if path.exists() {
                    FsEvent::Modified(path)
                } else {
                    FsEvent::Deleted(path)
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => paths.map(FsEvent::Modified).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Applies filesystem events to the catalog, one at a time and in arrival order.
///
/// Move halves are paired by tracker. A move-from that finds no partner by the
/// end of the following poll cycle is taken to have left the tree.
pub struct EventDispatcher {
    reconciler: Reconciler,
    extractor: Arc<dyn Extractor>,
    pending: HashMap<usize, (PathBuf, u64)>,
    paired: HashMap<usize, u64>,
    cycle: u64,
}

impl EventDispatcher {
    pub fn new(reconciler: Reconciler, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            reconciler,
            extractor,
            pending: HashMap::new(),
            paired: HashMap::new(),
            cycle: 0,
        }
    }

    pub fn dispatch(&mut self, event: FsEvent) -> Result<(), LibraryError> {
        debug!("Dispatching {:?}", event);
        match event {
            FsEvent::Created(path) => self.created(&path),
            FsEvent::Deleted(path) => {
                if let Some(key) = catalog_key(&path) {
                    self.reconciler.remove(&key)?;
                }
                Ok(())
            }
            FsEvent::Modified(path) => self.modified(&path),
            FsEvent::MovedFrom(path, Some(tracker)) => {
                if !self.paired.contains_key(&tracker) {
                    self.pending.insert(tracker, (path, self.cycle));
                }
                Ok(())
            }
            FsEvent::MovedFrom(path, None) => self.moved_out(&path),
            FsEvent::MovedTo(path, Some(tracker)) => {
                if self.paired.contains_key(&tracker) {
                    return Ok(());
                }
                match self.pending.remove(&tracker) {
                    Some((from, _)) => {
                        self.paired.insert(tracker, self.cycle);
                        self.moved(&from, &path)
                    }
                    None => self.moved_in(&path),
                }
            }
            FsEvent::MovedTo(path, None) => self.moved_in(&path),
        }
    }

    /// Closes a poll cycle: move-froms left unpaired since the previous cycle are
    /// treated as removals.
    pub fn end_cycle(&mut self) -> Result<(), LibraryError> {
        let cycle = self.cycle;
        let mut stale: Vec<(u64, usize)> = self
            .pending
            .iter()
            .filter(|(_, (_, seen))| *seen < cycle)
            .map(|(tracker, (_, seen))| (*seen, *tracker))
            .collect();
        stale.sort_unstable();

        for (_, tracker) in stale {
            if let Some((path, _)) = self.pending.remove(&tracker) {
                debug!("{:?} moved out of the library", path);
                absorb(self.moved_out(&path), &path)?;
            }
        }

        self.paired.retain(|_, seen| *seen + 1 >= cycle);
        self.cycle += 1;
        Ok(())
    }

    pub fn pending_moves(&self) -> usize {
        self.pending.len()
    }

    fn created(&self, path: &Path) -> Result<(), LibraryError> {
        if path.is_dir() || !is_audio_path(path) {
            return Ok(());
        }
        self.observe(path)
    }

    /// Refreshes a catalogued file or catalogues a new one. Covers in-place writes
    /// as well as a file renamed over one already in the catalog.
    fn modified(&self, path: &Path) -> Result<(), LibraryError> {
        if path.is_dir() || !is_audio_path(path) {
            return Ok(());
        }
        let Some(key) = catalog_key(path) else {
            return Ok(());
        };
        if self.reconciler.contains(&key)? {
            self.refresh(path, &key)
        } else {
            self.observe(path)
        }
    }

    fn moved(&self, from: &Path, to: &Path) -> Result<(), LibraryError> {
        let Some(new) = catalog_key(to) else {
            return self.moved_out(from);
        };
        let Some(old) = catalog_key(from) else {
            return self.moved_in(to);
        };
        if to.is_dir() {
            let moved = self.reconciler.rename_tree(&old, &new)?;
            debug!("Moved {} tracks from {} to {}", moved, old, new);
            return Ok(());
        }
        if !is_audio_path(to) {
            self.reconciler.remove(&old)?;
            return Ok(());
        }
        match self.reconciler.rename(&old, &new) {
            Ok(_) => self.refresh(to, &new),
            Err(err) if err.is_not_found() => self.modified(to),
            Err(err) => Err(err),
        }
    }

    fn moved_in(&self, path: &Path) -> Result<(), LibraryError> {
        if !path.is_dir() {
            return self.modified(path);
        }
        for file in collect_audio_files(path) {
            absorb(self.observe(&file), &file)?;
        }
        Ok(())
    }

    fn moved_out(&self, path: &Path) -> Result<(), LibraryError> {
        let Some(key) = catalog_key(path) else {
            return Ok(());
        };
        if !self.reconciler.remove(&key)? {
            let removed = self.reconciler.remove_tree(&key)?;
            if removed > 0 {
                debug!("Removed {} tracks under {}", removed, key);
            }
        }
        Ok(())
    }

    fn observe(&self, path: &Path) -> Result<(), LibraryError> {
        let Some(key) = catalog_key(path) else {
            return Ok(());
        };
        match self.extractor.extract(path) {
            Ok(tags) => {
                self.reconciler.observe(&key, tags.as_ref())?;
                Ok(())
            }
            Err(err) => {
                warn!("Failed to read tags for {:?}: {}", path, err);
                Ok(())
            }
        }
    }

    /// Re-reads a catalogued file. A file whose tags became unreadable keeps its
    /// current catalog entry.
    fn refresh(&self, path: &Path, key: &str) -> Result<(), LibraryError> {
        let tags = match self.extractor.extract(path) {
            Ok(Some(tags)) => tags,
            Ok(None) => {
                info!("No tags in {:?}; keeping catalog entry", path);
                return Ok(());
            }
            Err(err) => {
                warn!("Failed to read tags for {:?}: {}", path, err);
                return Ok(());
            }
        };
        match self.reconciler.resync(key, &tags) {
            Ok(_) => Ok(()),
            Err(LibraryError::Unreadable(_)) => {
                info!("No usable tags in {:?}; keeping catalog entry", path);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Logs a failed per-file step and carries on, unless the store itself is gone.
fn absorb(result: Result<(), LibraryError>, path: &Path) -> Result<(), LibraryError> {
    match result {
        Err(err) if err.is_store_unavailable() => Err(err),
        Err(err) => {
            warn!("Failed to update catalog for {:?}: {}", path, err);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Keeps the catalog in step with a media root until stopped. All events are
/// handled on one thread, strictly in order.
pub struct LibraryWatcher {
    root: PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), LibraryError>>>,
}

impl LibraryWatcher {
    pub fn start(
        root: PathBuf,
        reconciler: Reconciler,
        extractor: Arc<dyn Extractor>,
        poll: Duration,
    ) -> Result<Self, LibraryError> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let dispatcher = EventDispatcher::new(reconciler, extractor);
        let loop_root = root.clone();
        let loop_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("library-watch".to_string())
            .spawn(move || watch_loop(watcher, loop_root, rx, dispatcher, poll, loop_stop))?;

        info!("Watching {} for changes", root.display());
        Ok(Self {
            root,
            stop,
            handle: Some(handle),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the loop has exited, either after `stop` or on a fatal store error.
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Stops polling once the event in flight completes and returns the loop's
    /// exit status.
    pub fn stop(mut self) -> Result<(), LibraryError> {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(payload) => panic::resume_unwind(payload),
            },
            None => Ok(()),
        }
    }
}

impl Drop for LibraryWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn watch_loop(
    mut watcher: RecommendedWatcher,
    root: PathBuf,
    rx: Receiver<notify::Result<Event>>,
    mut dispatcher: EventDispatcher,
    poll: Duration,
    stop: Arc<AtomicBool>,
) -> Result<(), LibraryError> {
    let result = loop {
        if stop.load(Ordering::SeqCst) {
            break Ok(());
        }
        let mut batch = Vec::new();
        match rx.recv_timeout(poll) {
            Ok(res) => batch.push(res),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
        while let Ok(res) = rx.try_recv() {
            batch.push(res);
        }
        if let Err(err) = run_cycle(&mut dispatcher, batch) {
            error!("Catalog store failed; stopping watcher: {}", err);
            break Err(err);
        }
    };

    if let Err(err) = watcher.unwatch(&root) {
        debug!("Unwatch {} failed: {}", root.display(), err);
    }
    info!("Stopped watching {}", root.display());
    result
}

fn run_cycle(
    dispatcher: &mut EventDispatcher,
    batch: Vec<notify::Result<Event>>,
) -> Result<(), LibraryError> {
    for res in batch {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                warn!("Watch error: {}", err);
                continue;
            }
        };
        for fs_event in fs_events(event) {
            let path = match &fs_event {
                FsEvent::Created(path)
                | FsEvent::Deleted(path)
                | FsEvent::Modified(path)
                | FsEvent::MovedFrom(path, _)
                | FsEvent::MovedTo(path, _) => path.clone(),
            };
            absorb(dispatcher.dispatch(fs_event), &path)?;
        }
    }
    dispatcher.end_cycle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use metadata::{MetadataError, TagMap};
    use common::path_key;
    use parking_lot::Mutex;
    use std::fs;
    use std::time::Instant;

    #[derive(Default)]
    struct FakeExtractor {
        tags: Mutex<HashMap<PathBuf, TagMap>>,
    }

    impl FakeExtractor {
        fn set(&self, path: &Path, tags: TagMap) {
            self.tags.lock().insert(path.to_path_buf(), tags);
        }

        fn forget(&self, path: &Path) {
            self.tags.lock().remove(path);
        }
    }

    impl Extractor for FakeExtractor {
        fn extract(&self, path: &Path) -> Result<Option<TagMap>, MetadataError> {
            Ok(self.tags.lock().get(path).cloned())
        }
    }

    fn song(artist: &str, album: &str, title: &str) -> TagMap {
        TagMap::new()
            .with("artist", [artist])
            .with("album", [album])
            .with("title", [title])
    }

    struct Fixture {
        dir: tempfile::TempDir,
        reconciler: Reconciler,
        extractor: Arc<FakeExtractor>,
        dispatcher: EventDispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let reconciler = Reconciler::new(Store::open_in_memory().unwrap());
            let extractor = Arc::new(FakeExtractor::default());
            let dispatcher = EventDispatcher::new(reconciler.clone(), extractor.clone());
            Self {
                dir,
                reconciler,
                extractor,
                dispatcher,
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        /// Writes a file and registers its tags.
        fn put(&self, rel: &str, tags: TagMap) -> PathBuf {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"audio").unwrap();
            self.extractor.set(&path, tags);
            path
        }

        fn track_id(&self, path: &Path) -> Option<i64> {
            self.reconciler
                .find(&path_key(path).unwrap())
                .unwrap()
                .map(|track| track.id)
        }

        fn dispatch(&mut self, event: FsEvent) {
            self.dispatcher.dispatch(event).unwrap();
        }
    }

    #[test]
    fn translates_notify_events() {
        let file = PathBuf::from("/m/a.mp3");
        let other = PathBuf::from("/m/b.mp3");

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(fs_events(created), vec![FsEvent::Created(file.clone())]);

        let folder = Event::new(EventKind::Create(CreateKind::Folder)).add_path(file.clone());
        assert!(fs_events(folder).is_empty());

        let written = Event::new(EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Content,
        )))
        .add_path(file.clone());
        assert_eq!(fs_events(written), vec![FsEvent::Modified(file.clone())]);

        let chmod = Event::new(EventKind::Modify(ModifyKind::Metadata(
            notify::event::MetadataKind::Permissions,
        )))
        .add_path(file.clone());
        assert!(fs_events(chmod).is_empty());

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(file.clone())
            .add_path(other.clone())
            .set_tracker(9);
        assert_eq!(
            fs_events(both),
            vec![
                FsEvent::MovedFrom(file.clone(), Some(9)),
                FsEvent::MovedTo(other.clone(), Some(9))
            ]
        );

        let gone = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(PathBuf::from("/definitely/not/here.mp3"));
        assert_eq!(
            fs_events(gone),
            vec![FsEvent::Deleted(PathBuf::from("/definitely/not/here.mp3"))]
        );

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(file.clone());
        assert_eq!(fs_events(removed), vec![FsEvent::Deleted(file)]);
    }

    #[test]
    fn create_modify_delete() {
        let mut fx = Fixture::new();
        let path = fx.put("X/Y/01.mp3", song("X", "Y", "T1"));

        fx.dispatch(FsEvent::Created(path.clone()));
        fx.dispatch(FsEvent::Created(path.clone()));
        let id = fx.track_id(&path).unwrap();
        assert_eq!(fx.reconciler.store().stats().unwrap().tracks, 1);

        fx.extractor.set(&path, song("Z", "Y", "T1"));
        fx.dispatch(FsEvent::Modified(path.clone()));
        assert_eq!(fx.track_id(&path), Some(id));
        let artists: Vec<String> = fx
            .reconciler
            .store()
            .query("SELECT name FROM artist", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artists, vec!["Z"]);

        fx.dispatch(FsEvent::Deleted(path.clone()));
        assert!(fx.track_id(&path).is_none());
        assert_eq!(fx.reconciler.store().stats().unwrap(), Default::default());
    }

    #[test]
    fn modify_of_unknown_file_observes_it() {
        let mut fx = Fixture::new();
        let path = fx.path("late.mp3");
        fs::write(&path, b"").unwrap();

        fx.dispatch(FsEvent::Created(path.clone()));
        assert!(fx.track_id(&path).is_none());

        fx.extractor.set(&path, song("X", "Y", "T1"));
        fx.dispatch(FsEvent::Modified(path.clone()));
        assert!(fx.track_id(&path).is_some());
    }

    #[test]
    fn ignores_directories_and_other_files() {
        let mut fx = Fixture::new();
        let dir = fx.path("Artist");
        fs::create_dir_all(&dir).unwrap();
        let cover = fx.put("Artist/cover.jpg", song("X", "Y", "T1"));

        fx.dispatch(FsEvent::Created(dir.clone()));
        fx.dispatch(FsEvent::Modified(dir));
        fx.dispatch(FsEvent::Created(cover));
        assert_eq!(fx.reconciler.store().stats().unwrap().tracks, 0);
    }

    #[test]
    fn paired_move_renames_in_place() {
        let mut fx = Fixture::new();
        let old = fx.put("old.mp3", song("X", "Y", "T1"));
        fx.dispatch(FsEvent::Created(old.clone()));
        let id = fx.track_id(&old).unwrap();

        let new = fx.path("new.mp3");
        fs::rename(&old, &new).unwrap();
        fx.extractor.forget(&old);
        fx.extractor.set(&new, song("X", "Y", "T1 (remaster)"));

        // inotify reports both halves, then the combined event.
        fx.dispatch(FsEvent::MovedFrom(old.clone(), Some(4)));
        fx.dispatch(FsEvent::MovedTo(new.clone(), Some(4)));
        fx.dispatch(FsEvent::MovedFrom(old.clone(), Some(4)));
        fx.dispatch(FsEvent::MovedTo(new.clone(), Some(4)));
        fx.dispatcher.end_cycle().unwrap();
        fx.dispatcher.end_cycle().unwrap();

        assert_eq!(fx.dispatcher.pending_moves(), 0);
        assert!(fx.track_id(&old).is_none());
        assert_eq!(fx.track_id(&new), Some(id));
        let track = fx.reconciler.find(&path_key(&new).unwrap()).unwrap().unwrap();
        assert_eq!(track.name.as_deref(), Some("T1 (remaster)"));
        assert_eq!(fx.reconciler.store().stats().unwrap().tracks, 1);
    }

    #[test]
    fn temp_file_renamed_into_place_is_observed() {
        let mut fx = Fixture::new();
        let partial = fx.path("download.part");
        fs::write(&partial, b"").unwrap();
        fx.dispatch(FsEvent::Created(partial.clone()));

        let done = fx.path("download.mp3");
        fs::rename(&partial, &done).unwrap();
        fx.extractor.set(&done, song("X", "Y", "T1"));
        fx.dispatch(FsEvent::MovedFrom(partial, Some(11)));
        fx.dispatch(FsEvent::MovedTo(done.clone(), Some(11)));
        assert!(fx.track_id(&done).is_some());
    }

    #[test]
    fn save_by_rename_over_catalogued_file_refreshes_it() {
        let mut fx = Fixture::new();
        let path = fx.put("song.mp3", song("X", "Y", "Old title"));
        fx.dispatch(FsEvent::Created(path.clone()));
        let id = fx.track_id(&path).unwrap();

        // Editors write a sibling file, then rename it over the original.
        let scratch = fx.path(".song.mp3.tmp");
        fs::write(&scratch, b"audio").unwrap();
        fs::rename(&scratch, &path).unwrap();
        fx.extractor.set(&path, song("Z", "Y", "New title"));
        fx.dispatch(FsEvent::MovedFrom(scratch, Some(21)));
        fx.dispatch(FsEvent::MovedTo(path.clone(), Some(21)));

        let track = fx.reconciler.find(&path_key(&path).unwrap()).unwrap().unwrap();
        assert_eq!(track.id, id);
        assert_eq!(track.name.as_deref(), Some("New title"));
        let artists: Vec<String> = fx
            .reconciler
            .store()
            .query("SELECT name FROM artist", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artists, vec!["Z"]);

        // The scratch file may have lived outside the tree, leaving only the move-to.
        fx.extractor.set(&path, song("W", "Y", "Third title"));
        fx.dispatch(FsEvent::MovedTo(path.clone(), Some(22)));
        let track = fx.reconciler.find(&path_key(&path).unwrap()).unwrap().unwrap();
        assert_eq!(track.id, id);
        assert_eq!(track.name.as_deref(), Some("Third title"));
        let artists: Vec<String> = fx
            .reconciler
            .store()
            .query("SELECT name FROM artist", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artists, vec!["W"]);
        assert_eq!(fx.reconciler.store().stats().unwrap().tracks, 1);
    }

    #[test]
    fn unpaired_move_from_is_a_removal_after_a_cycle() {
        let mut fx = Fixture::new();
        let path = fx.put("leaving.mp3", song("X", "Y", "T1"));
        fx.dispatch(FsEvent::Created(path.clone()));

        fx.dispatch(FsEvent::MovedFrom(path.clone(), Some(5)));
        fx.dispatcher.end_cycle().unwrap();
        assert!(fx.track_id(&path).is_some());
        assert_eq!(fx.dispatcher.pending_moves(), 1);

        fx.dispatcher.end_cycle().unwrap();
        assert!(fx.track_id(&path).is_none());
        assert_eq!(fx.dispatcher.pending_moves(), 0);
    }

    #[test]
    fn unpaired_move_to_is_a_create() {
        let mut fx = Fixture::new();
        let path = fx.put("arrived.flac", song("X", "Y", "T1"));
        fx.dispatch(FsEvent::MovedTo(path.clone(), Some(6)));
        assert!(fx.track_id(&path).is_some());
    }

    #[test]
    fn directory_moves() {
        let mut fx = Fixture::new();
        let one = fx.put("X/Y/01.mp3", song("X", "Y", "T1"));
        let two = fx.put("X/Y/02.mp3", song("X", "Y", "T2"));
        fx.dispatch(FsEvent::Created(one.clone()));
        fx.dispatch(FsEvent::Created(two.clone()));
        let id = fx.track_id(&one).unwrap();

        let renamed = fx.path("X/Y (2001)");
        fs::rename(fx.path("X/Y"), &renamed).unwrap();
        fx.dispatch(FsEvent::MovedFrom(fx.path("X/Y"), Some(8)));
        fx.dispatch(FsEvent::MovedTo(renamed.clone(), Some(8)));
        assert_eq!(fx.track_id(&renamed.join("01.mp3")), Some(id));
        assert!(fx.track_id(&one).is_none());

        fx.dispatch(FsEvent::MovedFrom(renamed.clone(), None));
        assert_eq!(fx.reconciler.store().stats().unwrap(), Default::default());

        let incoming = fx.put("Z/V/01.ogg", song("Z", "V", "V1"));
        fx.dispatch(FsEvent::MovedTo(fx.path("Z"), None));
        assert!(fx.track_id(&incoming).is_some());
    }

    #[test]
    fn watcher_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let reconciler = Reconciler::new(Store::open_in_memory().unwrap());
        let extractor = Arc::new(FakeExtractor::default());
        let path = root.join("fresh.mp3");
        extractor.set(&path, song("X", "Y", "T1"));

        let watcher = LibraryWatcher::start(
            root.clone(),
            reconciler.clone(),
            extractor.clone(),
            Duration::from_millis(50),
        )
        .unwrap();
        fs::write(&path, b"audio").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !reconciler.contains(&path_key(&path).unwrap()).unwrap() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(25));
        }
        assert!(reconciler.contains(&path_key(&path).unwrap()).unwrap());
        assert!(!watcher.is_finished());
        watcher.stop().unwrap();
    }
}
