//! File system watcher for the build output directory
//!
//! Turns raw notify events into [`FileChange`]s. A burst of the same change to
//! the same file is forwarded once, after the file has gone quiet.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{
    Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
    event::{CreateKind, MetadataKind, ModifyKind, RenameMode},
};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Kind of change to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File appeared
    Add,
    /// File contents changed
    Change,
    /// File disappeared
    Unlink,
}

/// One change to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl FileChange {
    pub fn new(kind: ChangeKind, path: PathBuf) -> Self {
        Self { kind, path }
    }
}

/// Watch configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period a (path, kind) must see before its change is forwarded;
    /// zero forwards every change immediately
    pub debounce_duration: Duration,
    /// Whether to watch subdirectories
    pub recursive: bool,
    /// Ignore patterns (`*suffix`, `prefix*` or exact file name)
    pub ignore_patterns: Vec<String>,
    /// Use the polling backend instead of native notifications
    pub use_polling: bool,
    /// Interval of the polling backend
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(100),
            recursive: true,
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.swp".to_string(),
                "*~".to_string(),
                ".#*".to_string(),
            ],
            use_polling: false,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set debounce duration
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce_duration = duration;
        self
    }

    /// Set recursive mode
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Add ignore pattern
    pub fn with_ignore(mut self, pattern: &str) -> Self {
        self.ignore_patterns.push(pattern.to_string());
        self
    }

    /// Select the polling backend
    pub fn with_polling(mut self, use_polling: bool) -> Self {
        self.use_polling = use_polling;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn recursive_mode(&self) -> RecursiveMode {
        if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        }
    }

    /// Check if a path should be reported
    pub fn should_watch(&self, path: &Path) -> bool {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        for pattern in &self.ignore_patterns {
            if let Some(suffix) = pattern.strip_prefix('*') {
                if file_name.ends_with(suffix) {
                    return false;
                }
            } else if let Some(prefix) = pattern.strip_suffix('*') {
                if file_name.starts_with(prefix) {
                    return false;
                }
            } else if file_name == pattern {
                return false;
            }
        }
        true
    }
}

/// Map a raw notify event to file changes.
///
/// A paired rename is an unlink of the old path and a change of the new one,
/// which is how atomic saves replace an existing file. An unpaired rename
/// target is an add.
pub fn map_event(event: &Event) -> Vec<FileChange> {
    let change = |kind, path: &PathBuf| FileChange::new(kind, path.clone());

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| change(ChangeKind::Add, p))
            .collect(),
        EventKind::Modify(
            ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Metadata(MetadataKind::WriteTime),
        ) => event
            .paths
            .iter()
            .map(|p| change(ChangeKind::Change, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| change(ChangeKind::Unlink, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| change(ChangeKind::Add, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![change(ChangeKind::Unlink, from), change(ChangeKind::Change, to)],
            _ => Vec::new(),
        },
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| change(ChangeKind::Unlink, p))
            .collect(),
        _ => Vec::new(),
    }
}

/// Trailing-edge debouncer keyed by (path, kind)
///
/// A change is held until no change with the same key arrived for the whole
/// window, so the forwarded event always follows the last write of a burst.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    /// Held changes with their deadlines, oldest deadline first
    pending: Vec<(FileChange, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
        }
    }

    /// Hold `change` observed at `now`.
    ///
    /// Returns it straight back when debouncing is disabled.
    pub fn push(&mut self, change: FileChange, now: Instant) -> Option<FileChange> {
        if self.window.is_zero() {
            return Some(change);
        }

        self.pending
            .retain(|(held, _)| held.kind != change.kind || held.path != change.path);
        self.pending.push((change, now + self.window));
        None
    }

    /// Deadline of the oldest held change
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.first().map(|(_, deadline)| *deadline)
    }

    /// Release every held change whose quiet period ended by `now`, in order
    pub fn drain_due(&mut self, now: Instant) -> Vec<FileChange> {
        let due = self
            .pending
            .iter()
            .take_while(|(_, deadline)| *deadline <= now)
            .count();
        self.pending.drain(..due).map(|(change, _)| change).collect()
    }

    /// Number of held changes
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Send changes downstream; false once the receiver is gone
async fn forward(tx: &mpsc::Sender<FileChange>, changes: Vec<FileChange>) -> bool {
    for change in changes {
        debug!("File change: {:?}", change);
        if tx.send(change).await.is_err() {
            error!("Failed to send file change");
            return false;
        }
    }
    true
}

/// Watcher over the build output directory
pub struct DistWatcher {
    /// Watched directories
    watch_paths: Arc<RwLock<Vec<PathBuf>>>,
    config: WatchConfig,
    event_tx: mpsc::Sender<FileChange>,
    /// Event receiver (taken by consumer)
    event_rx: Option<mpsc::Receiver<FileChange>>,
    /// Backend handle, native or polling
    watcher: Option<Box<dyn Watcher + Send>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl DistWatcher {
    pub fn new(config: WatchConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1024);

        Self {
            watch_paths: Arc::new(RwLock::new(Vec::new())),
            config,
            event_tx,
            event_rx: Some(event_rx),
            watcher: None,
            shutdown_tx: None,
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<FileChange>> {
        self.event_rx.take()
    }

    /// Add a directory to watch
    pub async fn watch<P: AsRef<Path>>(&mut self, path: P) -> Result<(), notify::Error> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            warn!("Watch path does not exist: {:?}", path);
            return Ok(());
        }

        info!("Adding watch path: {:?}", path);

        {
            let mut paths = self.watch_paths.write().await;
            if !paths.contains(&path) {
                paths.push(path.clone());
            }
        }

        if let Some(watcher) = self.watcher.as_mut() {
            watcher.watch(&path, self.config.recursive_mode())?;
        }

        Ok(())
    }

    /// Start the backend and the event processing task
    pub async fn start(&mut self) -> Result<(), notify::Error> {
        info!(
            "Starting dist watcher ({})",
            if self.config.use_polling { "polling" } else { "native" }
        );

        let event_tx = self.event_tx.clone();
        let config = self.config.clone();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let (tx, mut rx) = mpsc::channel(1024);
        let handler = move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                let _ = tx.blocking_send(event);
            }
            Err(e) => error!("Watch error: {}", e),
        };

        let watcher_config = Config::default().with_poll_interval(self.config.poll_interval);
        let mut watcher: Box<dyn Watcher + Send> = if self.config.use_polling {
            Box::new(PollWatcher::new(handler, watcher_config)?)
        } else {
            Box::new(RecommendedWatcher::new(handler, watcher_config)?)
        };

        let paths = self.watch_paths.read().await;
        for path in paths.iter() {
            watcher.watch(path, self.config.recursive_mode())?;
        }
        drop(paths);

        self.watcher = Some(watcher);

        tokio::spawn(async move {
            let mut debouncer = Debouncer::new(config.debounce_duration);

            loop {
                let deadline = debouncer.next_deadline();
                let flush = tokio::time::sleep_until(tokio::time::Instant::from_std(
                    deadline.unwrap_or_else(Instant::now),
                ));

                tokio::select! {
                    Some(event) = rx.recv() => {
                        let mut ready = Vec::new();
                        for change in map_event(&event) {
                            if !config.should_watch(&change.path) {
                                continue;
                            }
                            match debouncer.push(change, Instant::now()) {
                                Some(change) => ready.push(change),
                                None => debug!("Holding change until quiet"),
                            }
                        }
                        if !forward(&event_tx, ready).await {
                            return;
                        }
                    }
                    _ = flush, if deadline.is_some() => {
                        if !forward(&event_tx, debouncer.drain_due(Instant::now())).await {
                            return;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Dist watcher shutting down");
                        return;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop watching
    pub async fn stop(&mut self) {
        info!("Stopping dist watcher");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        self.watcher = None;
    }

    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        self.watch_paths.read().await.clone()
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Every existing file under the watched directories, sorted
    pub async fn scan_existing(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let paths = self.watch_paths.read().await;

        for watch_path in paths.iter() {
            let mut walker = WalkDir::new(watch_path);
            if !self.config.recursive {
                walker = walker.max_depth(1);
            }
            for entry in walker.into_iter().filter_map(Result::ok) {
                let path = entry.path();
                if entry.file_type().is_file() && self.config.should_watch(path) {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RemoveKind};
    use tempfile::TempDir;

    #[test]
    fn test_watch_config_default() {
        let config = WatchConfig::default();
        assert_eq!(config.debounce_duration, Duration::from_millis(100));
        assert!(config.recursive);
        assert!(!config.use_polling);
    }

    #[test]
    fn test_should_watch() {
        let config = WatchConfig::default();

        assert!(config.should_watch(Path::new("/dist/index.rhai")));
        assert!(config.should_watch(Path::new("/dist/preload.js")));

        assert!(!config.should_watch(Path::new("/dist/ipc/a.rhai.tmp")));
        assert!(!config.should_watch(Path::new("/dist/ipc/.a.rhai.swp")));
        assert!(!config.should_watch(Path::new("/dist/index.rhai~")));
        assert!(!config.should_watch(Path::new("/dist/.#index.rhai")));
    }

    #[test]
    fn test_map_event_kinds() {
        let path = PathBuf::from("/dist/ipc/a.rhai");

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert_eq!(map_event(&created), vec![FileChange::new(ChangeKind::Add, path.clone())]);

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.clone());
        assert_eq!(
            map_event(&modified),
            vec![FileChange::new(ChangeKind::Change, path.clone())]
        );

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.clone());
        assert_eq!(
            map_event(&removed),
            vec![FileChange::new(ChangeKind::Unlink, path.clone())]
        );

        let folder = Event::new(EventKind::Create(CreateKind::Folder)).add_path(path);
        assert!(map_event(&folder).is_empty());
    }

    #[test]
    fn test_map_rename_both() {
        let from = PathBuf::from("/dist/ipc/.version.rhai.tmp123");
        let to = PathBuf::from("/dist/ipc/version.rhai");
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(to.clone());

        assert_eq!(
            map_event(&event),
            vec![
                FileChange::new(ChangeKind::Unlink, from),
                FileChange::new(ChangeKind::Change, to.clone()),
            ]
        );

        let unpaired = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(to.clone());
        assert_eq!(map_event(&unpaired), vec![FileChange::new(ChangeKind::Add, to)]);
    }

    #[test]
    fn test_debouncer_waits_for_quiet() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        let change = FileChange::new(ChangeKind::Change, PathBuf::from("/dist/ipc/a.rhai"));

        // truncate, then the rest of the write 30ms later
        assert!(debouncer.push(change.clone(), start).is_none());
        assert!(debouncer.push(change.clone(), start + Duration::from_millis(30)).is_none());
        assert_eq!(debouncer.pending(), 1);

        assert!(debouncer.drain_due(start + Duration::from_millis(100)).is_empty());
        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(130))
        );
        assert_eq!(
            debouncer.drain_due(start + Duration::from_millis(130)),
            vec![change]
        );
        assert_eq!(debouncer.pending(), 0);
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_debouncer_keeps_kinds_apart_and_in_order() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        let path = PathBuf::from("/dist/ipc/a.rhai");
        let unlink = FileChange::new(ChangeKind::Unlink, path.clone());
        let add = FileChange::new(ChangeKind::Add, path.clone());
        let other = FileChange::new(ChangeKind::Change, PathBuf::from("/dist/index.rhai"));

        debouncer.push(unlink.clone(), start);
        debouncer.push(other.clone(), start + Duration::from_millis(10));
        debouncer.push(add.clone(), start + Duration::from_millis(20));

        assert_eq!(
            debouncer.drain_due(start + Duration::from_millis(115)),
            vec![unlink, other]
        );
        assert_eq!(debouncer.drain_due(start + Duration::from_millis(120)), vec![add]);
    }

    #[test]
    fn test_zero_window_disables_debounce() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let now = Instant::now();
        let change = FileChange::new(ChangeKind::Change, PathBuf::from("/dist/index.rhai"));

        assert_eq!(debouncer.push(change.clone(), now), Some(change.clone()));
        assert_eq!(debouncer.push(change.clone(), now), Some(change));
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test]
    async fn test_take_event_receiver_once() {
        let mut watcher = DistWatcher::new(WatchConfig::default());

        assert!(watcher.take_event_receiver().is_some());
        assert!(watcher.take_event_receiver().is_none());
    }

    #[tokio::test]
    async fn test_watch_missing_path_is_skipped() {
        let mut watcher = DistWatcher::new(WatchConfig::default());
        watcher.watch("/definitely/not/here").await.unwrap();
        assert!(watcher.watched_paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("ipc")).unwrap();
        std::fs::write(dir.path().join("index.rhai"), "fn main(ctx) {}").unwrap();
        std::fs::write(dir.path().join("ipc/a.rhai"), "fn main(ctx) {}").unwrap();
        std::fs::write(dir.path().join("ipc/a.rhai.swp"), "").unwrap();

        let mut watcher = DistWatcher::new(WatchConfig::default());
        watcher.watch(dir.path()).await.unwrap();

        let files = watcher.scan_existing().await;
        assert_eq!(
            files,
            vec![dir.path().join("index.rhai"), dir.path().join("ipc/a.rhai")]
        );

        let mut shallow = DistWatcher::new(WatchConfig::default().with_recursive(false));
        shallow.watch(dir.path()).await.unwrap();
        assert_eq!(shallow.scan_existing().await, vec![dir.path().join("index.rhai")]);
    }
}
