//! Shows load results in the window.
//!
//! The load coordinator delivers its events through the Slint event loop, so
//! everything here runs on the UI thread.

use crate::image_loader;
use crate::services::load_coordinator::{FrameView, LoadEvent, LoadListener};
use crate::state::viewport::Viewport;
use crate::ui::state_helpers::{
    apply_layout, clear_error_message, default_title, set_error_message, set_title,
};
use log::debug;
use slint::ComponentHandle;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Builds the listener the coordinator reports to.
pub fn load_listener(
    ui: slint::Weak<crate::AppWindow>,
    viewport: Arc<Mutex<Viewport>>,
) -> LoadListener {
    Arc::new(move |event: &LoadEvent| {
        let Some(ui) = ui.upgrade() else {
            return;
        };
        match event {
            LoadEvent::Started { path } => show_loading(&ui, path),
            LoadEvent::Finished(view) => show_frame(&ui, &viewport, view),
        }
    })
}

fn show_loading(ui: &crate::AppWindow, path: &Path) {
    let view_state = ui.global::<crate::ViewState>();
    view_state.set_logo_visible(false);
    view_state.set_loading(true);
    set_title(ui, &path.display().to_string());
}

fn show_frame(ui: &crate::AppWindow, viewport: &Mutex<Viewport>, view: &FrameView) {
    let view_state = ui.global::<crate::ViewState>();
    view_state.set_loading(false);
    clear_error_message(ui);

    let Some(frame) = &view.frame else {
        set_error_message(ui, view.error.as_ref());
        view_state.set_image_loaded(false);
        view_state.set_dynamic_image(slint::Image::default());
        if let Ok(mut viewport) = viewport.lock() {
            viewport.clear_content();
        }
        set_title(ui, &default_title());
        return;
    };

    view_state.set_dynamic_image(image_loader::create_slint_image(frame));
    view_state.set_image_loaded(true);
    if let Ok(mut viewport) = viewport.lock() {
        viewport.set_content(frame.width(), frame.height());
    }
    // Re-reads the viewer size and applies the layout through viewport-resized.
    ui.invoke_report_viewport_size();

    set_title(ui, &view.file_info());
    debug!("Displayed frame {} of {}", view.index + 1, view.count);
}

/// Re-applies the current layout after a viewport change.
pub fn refresh_layout(ui: &crate::AppWindow, viewport: &Mutex<Viewport>) {
    let layout = match viewport.lock() {
        Ok(viewport) => viewport.layout(),
        Err(_) => return,
    };
    apply_layout(ui, layout);
}
