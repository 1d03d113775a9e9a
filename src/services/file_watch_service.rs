//! Service for watching the displayed file for external changes.
//!
//! The parent directory is watched non-recursively and events are narrowed
//! down to the one file name being displayed. Opening or reading the file
//! without changing it does not count as a change.

use crate::config::{WATCH_DEBOUNCE, WATCH_SETTLE_PERIOD};
use crate::error::Result;
use crate::file_utils::PathExt;
use log::{debug, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Size and timestamps, used to tell real writes from mere accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
    /// Inode change time as (seconds, nanoseconds); not available on Windows.
    changed: Option<(i64, i64)>,
}

#[cfg(unix)]
fn inode_change_time(metadata: &fs::Metadata) -> Option<(i64, i64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.ctime(), metadata.ctime_nsec()))
}

#[cfg(not(unix))]
fn inode_change_time(_metadata: &fs::Metadata) -> Option<(i64, i64)> {
    None
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
            changed: inode_change_time(&metadata),
        })
    }

    /// Whole-second modification times point at a file system (FAT, HFS+,
    /// some network mounts) that cannot order writes within a second.
    fn has_coarse_timestamps(&self) -> bool {
        self.modified
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .is_some_and(|since_epoch| since_epoch.subsec_nanos() == 0)
    }
}

/// Decides whether an event batch for the watched file is a real change.
///
/// A different stamp always is. An identical stamp is an echo of the
/// viewer's own access while the watch is settling; after that it only
/// counts on file systems whose timestamps are too coarse to show the write.
fn is_real_change(
    previous: Option<FileStamp>,
    current: Option<FileStamp>,
    since_armed: Duration,
) -> bool {
    if previous != current {
        return true;
    }
    since_armed >= WATCH_SETTLE_PERIOD
        && current.is_some_and(|stamp| stamp.has_coarse_timestamps())
}

struct WatchTarget {
    path: PathBuf,
    stamp: Option<FileStamp>,
    armed_at: Instant,
}

/// Watches one file and reports changes until disabled.
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher>,
    watched_directory: Option<PathBuf>,
    target: Arc<Mutex<Option<WatchTarget>>>,
    enabled: Arc<AtomicBool>,
}

fn same_file_name(a: &Path, b: &Path) -> bool {
    match (a.file_name(), b.file_name()) {
        (Some(a), Some(b)) => {
            a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
        }
        _ => false,
    }
}

/// Handles debounced file system events.
///
/// Fires `on_change` at most once per arming: the watcher disables itself
/// before calling it.
fn handle_debounced_events<F>(
    events: Vec<DebouncedEvent>,
    target: &Mutex<Option<WatchTarget>>,
    enabled: &AtomicBool,
    on_change: &F,
) where
    F: Fn(PathBuf) + Send + Sync + 'static,
{
    if !enabled.load(Ordering::SeqCst) {
        return;
    }

    let changed_path = {
        let Ok(mut target) = target.lock() else {
            return;
        };
        let Some(target) = target.as_mut() else {
            return;
        };
        if !events.iter().any(|event| same_file_name(&event.path, &target.path)) {
            return;
        }

        let stamp = FileStamp::read(&target.path);
        if !is_real_change(target.stamp, stamp, target.armed_at.elapsed()) {
            debug!("{} touched but unchanged", target.path.format_for_log());
            return;
        }
        target.stamp = stamp;
        target.path.clone()
    };

    if enabled.swap(false, Ordering::SeqCst) {
        debug!("Change detected for {}", changed_path.format_for_log());
        on_change(changed_path);
    }
}

impl FileWatcher {
    /// Creates a disabled watcher that will call `on_change` from its own thread.
    pub fn new<F>(on_change: F) -> Result<Self>
    where
        F: Fn(PathBuf) + Send + Sync + 'static,
    {
        let target: Arc<Mutex<Option<WatchTarget>>> = Arc::new(Mutex::new(None));
        let enabled = Arc::new(AtomicBool::new(false));

        let debouncer = {
            let target = target.clone();
            let enabled = enabled.clone();
            new_debouncer(WATCH_DEBOUNCE, move |res: DebounceEventResult| match res {
                Ok(events) => handle_debounced_events(events, &target, &enabled, &on_change),
                Err(error) => warn!("File watcher error: {}", error),
            })?
        };

        Ok(Self {
            debouncer,
            watched_directory: None,
            target,
            enabled,
        })
    }

    /// Points the watcher at `file` and enables it.
    pub fn watch(&mut self, file: &Path) -> Result<()> {
        let directory = file
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        if self.watched_directory.as_ref() != Some(&directory) {
            if let Some(previous) = self.watched_directory.take() {
                if let Err(e) = self.debouncer.watcher().unwatch(&previous) {
                    debug!("Failed to unwatch {}: {}", previous.display(), e);
                }
            }
            self.debouncer
                .watcher()
                .watch(&directory, RecursiveMode::NonRecursive)?;
            self.watched_directory = Some(directory);
        }

        if let Ok(mut target) = self.target.lock() {
            *target = Some(WatchTarget {
                path: file.to_path_buf(),
                stamp: FileStamp::read(file),
                armed_at: Instant::now(),
            });
        }
        let was_enabled = self.is_enabled();
        self.enabled.store(true, Ordering::SeqCst);
        if !was_enabled {
            debug!("Watching {}", file.format_for_log());
        }
        Ok(())
    }

    /// Stops reporting changes until the next [`FileWatcher::watch`].
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    const EVENT_TIMEOUT: Duration = Duration::from_secs(10);
    const QUIET_PERIOD: Duration = Duration::from_millis(1500);

    fn watcher_with_channel() -> (FileWatcher, mpsc::Receiver<PathBuf>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let watcher = FileWatcher::new(move |path| {
            let _ = tx.lock().unwrap().send(path);
        })
        .expect("failed to create watcher");
        (watcher, rx)
    }

    #[test]
    fn new_watcher_starts_disabled() {
        let (watcher, _rx) = watcher_with_channel();
        assert!(!watcher.is_enabled());
    }

    #[test]
    fn reports_change_once_then_stays_quiet() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let path = temp_dir.path().join("a.png");
        fs::write(&path, b"one").unwrap();

        let (mut watcher, rx) = watcher_with_channel();
        watcher.watch(&path).expect("failed to watch");
        assert!(watcher.is_enabled());

        fs::write(&path, b"second version").unwrap();
        assert_eq!(rx.recv_timeout(EVENT_TIMEOUT).unwrap(), path);
        assert!(!watcher.is_enabled());

        fs::write(&path, b"third version, longer").unwrap();
        assert!(rx.recv_timeout(QUIET_PERIOD).is_err());

        watcher.watch(&path).expect("failed to re-arm");
        fs::write(&path, b"4").unwrap();
        assert_eq!(rx.recv_timeout(EVENT_TIMEOUT).unwrap(), path);
    }

    #[test]
    fn ignores_other_files_and_plain_access() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let path = temp_dir.path().join("a.png");
        let other = temp_dir.path().join("b.png");
        fs::write(&path, b"one").unwrap();

        let (mut watcher, rx) = watcher_with_channel();
        watcher.watch(&path).expect("failed to watch");

        fs::write(&other, b"unrelated").unwrap();
        drop(
            fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .unwrap(),
        );

        assert!(rx.recv_timeout(QUIET_PERIOD).is_err());
        assert!(watcher.is_enabled());
    }

    #[test]
    fn disable_suppresses_changes() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let path = temp_dir.path().join("a.png");
        fs::write(&path, b"one").unwrap();

        let (mut watcher, rx) = watcher_with_channel();
        watcher.watch(&path).expect("failed to watch");
        watcher.disable();

        fs::write(&path, b"changed content").unwrap();
        assert!(rx.recv_timeout(QUIET_PERIOD).is_err());
    }

    #[test]
    fn watching_missing_directory_fails() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let (mut watcher, _rx) = watcher_with_channel();

        let result = watcher.watch(&temp_dir.path().join("missing").join("a.png"));

        assert!(matches!(result, Err(crate::error::AppError::Watch(_))));
        assert!(!watcher.is_enabled());
    }

    fn stamp(len: u64, modified_nanos: u64, changed: Option<(i64, i64)>) -> Option<FileStamp> {
        Some(FileStamp {
            len,
            modified: Some(UNIX_EPOCH + Duration::from_nanos(modified_nanos)),
            changed,
        })
    }

    #[test]
    fn different_stamps_are_changes() {
        let fine = 1_700_000_000_123_456_789;
        assert!(is_real_change(stamp(3, fine, None), stamp(4, fine, None), Duration::ZERO));
        assert!(is_real_change(
            stamp(3, fine, Some((1, 0))),
            stamp(3, fine, Some((1, 5))),
            Duration::ZERO
        ));
        assert!(is_real_change(stamp(3, fine, None), None, Duration::ZERO));
    }

    #[test]
    fn unchanged_stamp_right_after_arming_is_ignored() {
        let coarse = 1_700_000_000_000_000_000;
        let same = stamp(3, coarse, None);
        assert!(!is_real_change(same, same, Duration::from_millis(200)));
    }

    #[test]
    fn unchanged_coarse_stamp_counts_once_settled() {
        let coarse = 1_700_000_000_000_000_000;
        let fine = 1_700_000_000_123_456_789;

        let coarse_stamp = stamp(3, coarse, None);
        assert!(is_real_change(coarse_stamp, coarse_stamp, WATCH_SETTLE_PERIOD));

        let fine_stamp = stamp(3, fine, None);
        assert!(!is_real_change(fine_stamp, fine_stamp, WATCH_SETTLE_PERIOD));
    }

    #[cfg(unix)]
    #[test]
    fn same_size_rewrite_with_restored_mtime_is_reported() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let path = temp_dir.path().join("a.png");
        fs::write(&path, b"one").unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        let (mut watcher, rx) = watcher_with_channel();
        watcher.watch(&path).expect("failed to watch");
        std::thread::sleep(Duration::from_millis(50));

        fs::write(&path, b"two").unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();

        assert_eq!(rx.recv_timeout(EVENT_TIMEOUT).unwrap(), path);
    }
}
