//! Service layer for business logic.
//!
//! Nothing in here touches Slint; UI updates go through [`dispatcher::UiDispatcher`] so the
//! services can be driven from tests.

pub mod dispatcher;
pub mod file_watch_service;
pub mod load_coordinator;

pub use load_coordinator::LoadCoordinator;
