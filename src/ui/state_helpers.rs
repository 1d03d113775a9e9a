//! Helper functions to set groups of ViewState properties.

use crate::config::APP_NAME;
use crate::error::AppError;
use crate::state::viewport::ImageLayout;
use log::error;
use slint::ComponentHandle;

const UNKNOWN_ERROR: &str = "An unknown error occurred.";

/// Title shown while no image is displayed.
pub fn default_title() -> String {
    format!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"))
}

pub fn set_title(ui: &crate::AppWindow, title: &str) {
    ui.global::<crate::ViewState>().set_title(title.into());
}

/// Text shown for a failed operation: the message with its category prefix
/// (everything up to and including the first `": "`) removed.
pub fn error_text(error: Option<&AppError>) -> String {
    let message = error.map(ToString::to_string).unwrap_or_default();
    let detail = match message.split_once(": ") {
        Some((_, detail)) => detail,
        None => message.as_str(),
    };

    if detail.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        detail.to_string()
    }
}

/// Shows an error in the error bar and logs it.
pub fn set_error_message(ui: &crate::AppWindow, error: Option<&AppError>) {
    let text = error_text(error);
    error!("{}", text);
    ui.global::<crate::ViewState>().set_error_message(text.into());
}

pub fn clear_error_message(ui: &crate::AppWindow) {
    ui.global::<crate::ViewState>().set_error_message("".into());
}

/// Sets image-x, image-y, image-width and image-height at once.
pub fn apply_layout(ui: &crate::AppWindow, layout: ImageLayout) {
    let view_state = ui.global::<crate::ViewState>();
    view_state.set_image_x(layout.x);
    view_state.set_image_y(layout.y);
    view_state.set_image_width(layout.width);
    view_state.set_image_height(layout.height);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_category_prefix() {
        let error = AppError::ImageLoad("No decoder for this file".to_string());
        assert_eq!(error_text(Some(&error)), "No decoder for this file");
    }

    #[test]
    fn strips_only_first_prefix() {
        let error = AppError::ImageSave("Format error: bad header".to_string());
        assert_eq!(error_text(Some(&error)), "Format error: bad header");
    }

    #[test]
    fn missing_or_empty_error_is_unknown() {
        assert_eq!(error_text(None), UNKNOWN_ERROR);
        let empty = AppError::ImageLoad(String::new());
        assert_eq!(error_text(Some(&empty)), UNKNOWN_ERROR);
    }

    #[test]
    fn default_title_carries_version() {
        assert_eq!(
            default_title(),
            format!("Slint Image Viewer {}", env!("CARGO_PKG_VERSION"))
        );
    }
}
