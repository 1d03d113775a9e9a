//! Circular navigation through the supported images of a directory.

use crate::file_utils::{self, PathExt};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Direction for navigation through images.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Next,
    Previous,
}

/// Returns the supported sibling after `current`, wrapping to the first one.
pub fn next_image(current: Option<&Path>) -> Option<PathBuf> {
    navigate_from(current, Direction::Next)
}

/// Returns the supported sibling before `current`, wrapping to the last one.
pub fn prev_image(current: Option<&Path>) -> Option<PathBuf> {
    navigate_from(current, Direction::Previous)
}

/// Rescans the directory of `current` and picks its neighbour.
///
/// Returns `None` when nothing is selected, the directory holds a single
/// supported file, or `current` is not part of the listing anymore.
fn navigate_from(current: Option<&Path>, direction: Direction) -> Option<PathBuf> {
    let current = current.filter(|path| !path.as_os_str().is_empty())?;
    let directory = current
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let image_files = match file_utils::scan_directory(directory) {
        Ok(files) => files,
        Err(e) => {
            warn!("Failed to list {}: {}", directory.display(), e);
            return None;
        }
    };

    if image_files.len() <= 1 {
        debug!("No other image next to {}", current.format_for_log());
        return None;
    }

    let Some(index) = find_file_index(&image_files, current) else {
        warn!("{} is no longer in its directory", current.display());
        return None;
    };

    let len = image_files.len();
    let new_index = match direction {
        Direction::Next => (index + 1) % len,
        Direction::Previous => (index + len - 1) % len,
    };

    Some(image_files[new_index].clone())
}

/// Finds `path` by case-insensitive full-path comparison.
fn find_file_index(image_files: &[PathBuf], path: &Path) -> Option<usize> {
    let wanted = path.to_string_lossy().to_lowercase();
    image_files
        .iter()
        .position(|candidate| candidate.to_string_lossy().to_lowercase() == wanted)
}
