//! State management for the image viewer application.

use crate::services::LoadCoordinator;
use std::sync::{Arc, Mutex};

pub mod load_gate;
pub mod navigation;
pub mod viewport;

pub use viewport::Viewport;

/// Application-wide state container.
pub struct AppState {
    /// Owns the displayed image and serializes loads.
    pub coordinator: LoadCoordinator,
    /// Pan and fit state of the image surface, only touched on the UI thread.
    pub viewport: Arc<Mutex<Viewport>>,
}

impl AppState {
    pub fn new(coordinator: LoadCoordinator, viewport: Arc<Mutex<Viewport>>) -> Self {
        Self {
            coordinator,
            viewport,
        }
    }
}
