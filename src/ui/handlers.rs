//! Event handlers for UI callbacks.
//!
//! Sets up all Logic callbacks. File dialogs run through `slint::spawn_local`
//! on the main thread; loading and saving are handed to the load coordinator,
//! which does its work off the UI thread.

use crate::formats::{self, FileFilter};
use crate::state::AppState;
use crate::state::viewport::Viewport;
use crate::ui::image_display::refresh_layout;
use crate::ui::state_helpers::{clear_error_message, set_error_message};
use log::{debug, info, warn};
use rfd::AsyncFileDialog;
use slint::ComponentHandle;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn dialog_with_filters(title: &str, filters: &[FileFilter]) -> AsyncFileDialog {
    debug!("{} filters: {}", title, formats::filter_string(filters));
    filters
        .iter()
        .fold(AsyncFileDialog::new().set_title(title), |dialog, filter| {
            dialog.add_filter(&filter.name, filter.extensions.as_slice())
        })
}

/// Gives an extension-less save target the source's extension, or PNG when
/// the source format cannot be written.
fn with_save_extension(target: PathBuf, source: &Path) -> PathBuf {
    if target.extension().is_some() {
        return target;
    }
    let extension = source
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned())
        .filter(|extension| formats::is_format_writable(extension))
        .unwrap_or_else(|| "png".to_string());
    target.with_extension(extension)
}

fn hide_menu(ui_handle: &slint::Weak<crate::AppWindow>) {
    if let Some(ui) = ui_handle.upgrade() {
        ui.global::<crate::ViewState>().set_menu_visible(false);
    }
}

fn close_window(ui: &crate::AppWindow) {
    if let Err(e) = ui.hide() {
        warn!("Failed to close window: {}", e);
    }
}

/// Runs `update` on the viewport and pushes the new layout to the UI.
fn update_viewport<F>(
    ui_handle: &slint::Weak<crate::AppWindow>,
    viewport: &Arc<Mutex<Viewport>>,
    update: F,
) where
    F: FnOnce(&mut Viewport) -> bool,
{
    let (changed, dragging) = match viewport.lock() {
        Ok(mut viewport) => (update(&mut viewport), viewport.is_dragging()),
        Err(_) => return,
    };

    if let Some(ui) = ui_handle.upgrade() {
        ui.global::<crate::ViewState>().set_dragging(dragging);
        if changed {
            refresh_layout(&ui, viewport);
        }
    }
}

pub fn setup_handlers(ui: &crate::AppWindow, state: &AppState) {
    let logic = ui.global::<crate::Logic>();

    // Open dialog; AsyncFileDialog must stay on the main thread, no rayon here.
    logic.on_open_image({
        let ui_handle = ui.as_weak();
        let coordinator = state.coordinator.clone();
        move || {
            hide_menu(&ui_handle);
            let coordinator = coordinator.clone();
            let mut dialog = dialog_with_filters("Open image", &formats::open_filters());
            if let Some(directory) = coordinator
                .current_file()
                .and_then(|path| path.parent().map(|parent| parent.to_path_buf()))
            {
                dialog = dialog.set_directory(directory);
            }

            let _ = slint::spawn_local(async move {
                let Some(file_handle) = dialog.pick_file().await else {
                    debug!("Open dialog cancelled");
                    return;
                };
                coordinator.load(file_handle.path().to_path_buf());
            });
        }
    });

    logic.on_save_image({
        let ui_handle = ui.as_weak();
        let coordinator = state.coordinator.clone();
        move || {
            hide_menu(&ui_handle);
            let Some(current) = coordinator.current_file() else {
                return;
            };
            if coordinator.frame_position().1 == 0 {
                debug!("Nothing to save");
                return;
            }

            let mut dialog = dialog_with_filters("Save image as", &formats::save_filters());
            if let Some(name) = current.file_name() {
                dialog = dialog.set_file_name(name.to_string_lossy());
            }
            if let Some(directory) = current.parent() {
                dialog = dialog.set_directory(directory);
            }

            let ui_handle = ui_handle.clone();
            let coordinator = coordinator.clone();
            let _ = slint::spawn_local(async move {
                let Some(file_handle) = dialog.save_file().await else {
                    debug!("Save dialog cancelled");
                    return;
                };
                let target = with_save_extension(file_handle.path().to_path_buf(), &current);
                info!("Saving to {}", target.display());

                coordinator.save(target, move |result| {
                    let Some(ui) = ui_handle.upgrade() else {
                        return;
                    };
                    match result {
                        Ok(()) => clear_error_message(&ui),
                        Err(e) => set_error_message(&ui, Some(&e)),
                    }
                });
            });
        }
    });

    logic.on_next_image({
        let coordinator = state.coordinator.clone();
        move || coordinator.next()
    });

    logic.on_prev_image({
        let coordinator = state.coordinator.clone();
        move || coordinator.previous()
    });

    logic.on_next_frame({
        let coordinator = state.coordinator.clone();
        move || coordinator.next_frame()
    });

    logic.on_prev_frame({
        let coordinator = state.coordinator.clone();
        move || coordinator.previous_frame()
    });

    logic.on_close_window({
        let ui_handle = ui.as_weak();
        move || {
            if let Some(ui) = ui_handle.upgrade() {
                close_window(&ui);
            }
        }
    });

    // Escape: leave the maximized state first, close otherwise.
    logic.on_stop({
        let ui_handle = ui.as_weak();
        move || {
            let Some(ui) = ui_handle.upgrade() else {
                return;
            };
            let window = ui.window();
            if window.is_maximized() {
                window.set_maximized(false);
            } else {
                close_window(&ui);
            }
        }
    });

    logic.on_pan_start({
        let ui_handle = ui.as_weak();
        let viewport = state.viewport.clone();
        move |x, y| {
            update_viewport(&ui_handle, &viewport, |viewport| {
                viewport.begin_pan(x, y);
                false
            })
        }
    });

    logic.on_pan_move({
        let ui_handle = ui.as_weak();
        let viewport = state.viewport.clone();
        move |x, y| update_viewport(&ui_handle, &viewport, |viewport| viewport.pan_to(x, y))
    });

    logic.on_pan_end({
        let ui_handle = ui.as_weak();
        let viewport = state.viewport.clone();
        move || {
            update_viewport(&ui_handle, &viewport, |viewport| {
                viewport.end_pan();
                false
            })
        }
    });

    logic.on_toggle_fit({
        let ui_handle = ui.as_weak();
        let viewport = state.viewport.clone();
        move || {
            update_viewport(&ui_handle, &viewport, |viewport| {
                viewport.toggle_fit();
                true
            })
        }
    });

    logic.on_viewport_resized({
        let ui_handle = ui.as_weak();
        let viewport = state.viewport.clone();
        move |width, height| {
            update_viewport(&ui_handle, &viewport, |viewport| {
                viewport.resize(width, height);
                true
            })
        }
    });
}
