use crate::services::dispatcher::{UiDispatcher, UiTask};
use log::warn;

/// Runs tasks on the Slint event loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlintDispatcher;

impl UiDispatcher for SlintDispatcher {
    fn post(&self, task: UiTask) {
        if let Err(e) = slint::invoke_from_event_loop(task) {
            warn!("Event loop gone, dropping UI task: {}", e);
        }
    }
}
