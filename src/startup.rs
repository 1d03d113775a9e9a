use log::{debug, info};
use slint::ComponentHandle;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::services::LoadCoordinator;
use crate::state::AppState;

fn startup_image_from_args<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    args.into_iter()
        .filter_map(|arg| {
            let arg_str = arg.to_string_lossy();
            if arg_str.starts_with('-') {
                None
            } else {
                Some(PathBuf::from(arg))
            }
        })
        .find(|path| crate::file_utils::is_supported_image(path))
}

/// Counts the files of one drag-and-drop gesture.
///
/// winit reports a hover event per file before the drop events, so a drop is
/// only accepted when the gesture carried a single file.
#[derive(Debug, Default)]
struct DropGesture {
    hovered: usize,
    remaining: usize,
    multiple: bool,
}

impl DropGesture {
    fn hovered(&mut self) {
        if self.remaining == 0 {
            self.hovered += 1;
        }
    }

    fn cancelled(&mut self) {
        *self = Self::default();
    }

    /// Registers one dropped file and returns whether it may be opened.
    fn dropped(&mut self, path: &Path) -> bool {
        if self.remaining == 0 {
            self.multiple = self.hovered > 1;
            self.remaining = self.hovered.max(1);
            self.hovered = 0;
        }
        self.remaining -= 1;

        !self.multiple && crate::file_utils::is_supported_image(path)
    }
}

fn setup_window_hooks(app: &crate::AppWindow, coordinator: LoadCoordinator) {
    use i_slint_backend_winit::WinitWindowAccessor;
    use i_slint_backend_winit::{EventResult, winit::event::WindowEvent};

    let gesture = RefCell::new(DropGesture::default());

    app.window().on_winit_window_event(move |_window, event| {
        match event {
            WindowEvent::HoveredFile(_) => gesture.borrow_mut().hovered(),
            WindowEvent::HoveredFileCancelled => gesture.borrow_mut().cancelled(),
            WindowEvent::DroppedFile(path) => {
                if gesture.borrow_mut().dropped(path) {
                    info!("Opening dropped file {}", path.display());
                    coordinator.load(path.clone());
                } else {
                    debug!("Ignoring dropped file {}", path.display());
                }
            }
            _ => {}
        }

        EventResult::Propagate
    });
}

pub fn configure_startup_opening(app: &crate::AppWindow, app_state: &AppState) {
    setup_window_hooks(app, app_state.coordinator.clone());

    if let Some(path) = startup_image_from_args(std::env::args_os().skip(1)) {
        info!("Opening {} from the command line", path.display());
        app_state.coordinator.load(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn args(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[test]
    fn picks_first_supported_non_flag_argument() {
        let picked = startup_image_from_args(args(&["--verbose", "notes.txt", "a.png", "b.jpg"]));
        assert_eq!(picked, Some(PathBuf::from("a.png")));
    }

    #[test]
    fn no_supported_argument_opens_nothing() {
        assert_eq!(startup_image_from_args(args(&["-x", "readme.md"])), None);
        assert_eq!(startup_image_from_args(args(&[])), None);
    }

    #[test]
    fn single_file_drop_is_accepted() {
        let mut gesture = DropGesture::default();
        gesture.hovered();
        assert!(gesture.dropped(Path::new("/tmp/photo.png")));
    }

    #[test]
    fn drop_without_hover_events_is_accepted() {
        let mut gesture = DropGesture::default();
        assert!(gesture.dropped(Path::new("/tmp/photo.png")));
        assert!(gesture.dropped(Path::new("/tmp/other.png")));
    }

    #[test]
    fn multi_file_drop_is_ignored() {
        let mut gesture = DropGesture::default();
        gesture.hovered();
        gesture.hovered();
        assert!(!gesture.dropped(Path::new("/tmp/a.png")));
        assert!(!gesture.dropped(Path::new("/tmp/b.png")));

        gesture.hovered();
        assert!(gesture.dropped(Path::new("/tmp/c.png")));
    }

    #[test]
    fn unsupported_drop_is_ignored() {
        let mut gesture = DropGesture::default();
        gesture.hovered();
        assert!(!gesture.dropped(Path::new("/tmp/notes.txt")));
    }

    #[test]
    fn cancelled_hover_resets_the_count() {
        let mut gesture = DropGesture::default();
        gesture.hovered();
        gesture.hovered();
        gesture.cancelled();
        gesture.hovered();
        assert!(gesture.dropped(Path::new("/tmp/a.png")));
    }
}
