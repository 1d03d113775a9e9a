// Prevent console window in addition to Slint window in Windows release builds when, e.g., starting the app via file manager. Ignored on other platforms.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

slint::include_modules!();

mod config;
mod error;
mod file_utils;
mod formats;
mod image_loader;
mod services;
mod startup;
mod state;
mod ui;

use image_loader::LibraryDecoder;
use slint::ComponentHandle;
use services::LoadCoordinator;
use state::{AppState, Viewport};
use std::sync::{Arc, Mutex};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let app = AppWindow::new()?;
    let viewport = Arc::new(Mutex::new(Viewport::new()));
    let coordinator = LoadCoordinator::new(
        Arc::new(LibraryDecoder),
        Arc::new(ui::SlintDispatcher),
        ui::image_display::load_listener(app.as_weak(), viewport.clone()),
    );
    let app_state = AppState::new(coordinator, viewport);

    ui::set_title(&app, &ui::default_title());

    // Setup all UI event handlers
    ui::setup_handlers(&app, &app_state);
    startup::configure_startup_opening(&app, &app_state);

    app.run()?;

    app_state.coordinator.dispose();
    Ok(())
}
