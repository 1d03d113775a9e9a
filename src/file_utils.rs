use crate::config::READINESS_POLL_INTERVAL;
use crate::error::Result;
use crate::formats;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

/// Helpers for printing paths in log lines.
pub trait PathExt {
    fn format_for_log(&self) -> String;
}

impl PathExt for Path {
    fn format_for_log(&self) -> String {
        self.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display().to_string())
    }
}

/// Whether the viewer can open this file, judged by its name only.
///
/// The name must be at least two characters long and carry a non-empty
/// extension that a readable codec claims.
pub fn is_supported_image(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if name.chars().count() < 2 {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(formats::is_format_readable)
}

/// Lists the supported image files of a directory, sorted by case-insensitive file name.
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut image_files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect();

    image_files.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(image_files)
}

/// Opens the file for read-write access and takes an exclusive lock on it.
///
/// The handle is closed again before returning; this only tells whether
/// another process still holds the file.
fn probe_exclusive_access(path: &Path) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.read(true).write(true);

    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(0);
    }

    let file: File = options.open(path)?;
    file.try_lock().map_err(|err| match err {
        TryLockError::WouldBlock => io::Error::from(io::ErrorKind::WouldBlock),
        TryLockError::Error(err) => err,
    })
}

/// Blocks until the file can be opened exclusively.
///
/// Retries every [`READINESS_POLL_INTERVAL`] without a time limit while the
/// file is held by someone else. Returns `false` only when the file no longer
/// exists.
pub fn wait_until_readable(path: &Path) -> bool {
    let mut attempts: u32 = 0;
    loop {
        match probe_exclusive_access(path) {
            Ok(()) => {
                if attempts > 0 {
                    log::debug!(
                        "{} became accessible after {} retries",
                        path.format_for_log(),
                        attempts
                    );
                }
                return true;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("{} disappeared while waiting for access", path.display());
                return false;
            }
            Err(_) => {
                attempts += 1;
                thread::sleep(READINESS_POLL_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"fake image data").expect("failed to write test file");
        path
    }

    #[test]
    fn supported_image_requires_known_extension() {
        assert!(is_supported_image(Path::new("/tmp/a.png")));
        assert!(is_supported_image(Path::new("/tmp/photo.JPG")));
        assert!(is_supported_image(Path::new("/tmp/drawing.svg")));
        assert!(!is_supported_image(Path::new("/tmp/notes.txt")));
        assert!(!is_supported_image(Path::new("/tmp/png")));
        assert!(!is_supported_image(Path::new("/tmp/archive.")));
    }

    #[test]
    fn supported_image_rejects_single_character_names() {
        assert!(!is_supported_image(Path::new("/tmp/a")));
        assert!(!is_supported_image(Path::new("/tmp/.png")));
    }

    #[test]
    fn scan_directory_sorts_case_insensitively_and_skips_others() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let c = touch(temp_dir.path(), "c.png");
        let a = touch(temp_dir.path(), "a.gif");
        let b = touch(temp_dir.path(), "B.jpg");
        touch(temp_dir.path(), "readme.txt");
        fs::create_dir(temp_dir.path().join("folder.png")).unwrap();

        let files = scan_directory(temp_dir.path()).expect("failed to scan directory");

        assert_eq!(files, vec![a, b, c]);
    }

    #[test]
    fn scan_directory_fails_for_missing_directory() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        assert!(scan_directory(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn wait_returns_immediately_for_free_file() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let path = touch(temp_dir.path(), "free.png");

        let start = Instant::now();
        assert!(wait_until_readable(&path));
        assert!(start.elapsed() < READINESS_POLL_INTERVAL);
    }

    // The wait has no timeout: it keeps polling for as long as the writer
    // holds the file. This test only bounds how long the writer holds it.
    #[test]
    fn wait_blocks_until_writer_releases_lock() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let path = touch(temp_dir.path(), "busy.png");

        let writer = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .expect("failed to open test file");
        writer.lock().expect("failed to lock test file");

        let hold = Duration::from_millis(400);
        let start = Instant::now();
        let release = thread::spawn(move || {
            thread::sleep(hold);
            drop(writer);
        });

        assert!(wait_until_readable(&path));
        assert!(start.elapsed() >= hold);
        release.join().unwrap();
    }

    #[test]
    fn wait_gives_up_when_file_is_gone() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        assert!(!wait_until_readable(&temp_dir.path().join("deleted.png")));
    }

    #[test]
    fn format_for_log_uses_file_name() {
        assert_eq!(Path::new("/a/b/c.png").format_for_log(), "c.png");
    }
}
