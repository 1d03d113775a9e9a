//! UI module for handling user interactions and UI updates.
//!
//! Threading model:
//! - `slint::spawn_local`: file dialogs, which must run on the main thread
//! - worker threads and `rayon::spawn`: decoding and encoding, owned by the load coordinator
//! - `slint::invoke_from_event_loop`: results coming back to the UI thread, via [`SlintDispatcher`]

pub mod dispatcher;
pub mod handlers;
pub mod image_display;
mod state_helpers;

pub use dispatcher::SlintDispatcher;
pub use handlers::setup_handlers;
pub use state_helpers::*;
