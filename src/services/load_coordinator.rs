//! Coordinates image loads between worker threads and the UI thread.
//!
//! The coordinator owns the current file, its decoded frames and the frame
//! cursor. Every mutation of that state happens while holding the
//! coordinator's [`LoadGate`] permit, and the permit is only released once
//! the matching [`LoadEvent::Finished`] has been delivered on the UI thread.
//! Loads therefore never overlap and their events arrive in request order.

use crate::error::{AppError, Result};
use crate::file_utils::{self, PathExt};
use crate::image_loader::{self, Frame, ImageDecoder, ImageSet, ReadSettings};
use crate::services::dispatcher::UiDispatcher;
use crate::services::file_watch_service::FileWatcher;
use crate::state::load_gate::{LoadGate, LoadPermit, Ticket};
use crate::state::navigation;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Instant;

/// Notifications delivered on the UI thread.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    /// A load has taken the gate and is about to decode `path`.
    Started { path: PathBuf },
    /// A load or frame change has been published.
    Finished(FrameView),
}

/// What the UI should show after a load or frame change.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub path: PathBuf,
    /// The frame at `index`, `None` when nothing could be decoded.
    pub frame: Option<Frame>,
    pub index: usize,
    pub count: usize,
    pub format: String,
    pub error: Option<AppError>,
}

impl FrameView {
    /// Title text: path, frame position for multi-frame files, format and size.
    pub fn file_info(&self) -> String {
        let mut info = self.path.display().to_string();
        if self.count > 1 {
            info.push_str(&format!(" ({} of {})", self.index + 1, self.count));
        }
        if let Some(frame) = &self.frame {
            info.push_str(&format!(
                " {} {}x{}",
                self.format.to_uppercase(),
                frame.width(),
                frame.height()
            ));
        }
        info
    }
}

/// Receives [`LoadEvent`]s on the UI thread.
pub type LoadListener = Arc<dyn Fn(&LoadEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum FrameStep {
    Forward,
    Backward,
}

#[derive(Default)]
struct ViewerState {
    current_file: Option<PathBuf>,
    /// Most recently requested file, ahead of `current_file` while loads queue.
    requested_file: Option<PathBuf>,
    images: ImageSet,
    frame_index: usize,
}

impl ViewerState {
    fn view(&self, error: Option<AppError>) -> FrameView {
        FrameView {
            path: self.current_file.clone().unwrap_or_default(),
            frame: self.images.frame(self.frame_index).cloned(),
            index: self.frame_index,
            count: self.images.len(),
            format: self.images.format().to_string(),
            error,
        }
    }
}

struct Inner {
    gate: Arc<LoadGate>,
    state: Mutex<ViewerState>,
    watcher: Mutex<Option<FileWatcher>>,
    disposed: AtomicBool,
    decoder: Arc<dyn ImageDecoder>,
    dispatcher: Arc<dyn UiDispatcher>,
    listener: LoadListener,
}

/// Owns the displayed image set and serializes loads.
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<Inner>,
}

impl LoadCoordinator {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        dispatcher: Arc<dyn UiDispatcher>,
        listener: LoadListener,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gate: LoadGate::new(),
                state: Mutex::new(ViewerState::default()),
                watcher: Mutex::new(None),
                disposed: AtomicBool::new(false),
                decoder,
                dispatcher,
                listener,
            }),
        }
    }

    /// Queues a load of `path`. Returns immediately; the load runs once all
    /// earlier requests have published.
    pub fn load(&self, path: PathBuf) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            warn!("Ignoring load of {} after shutdown", path.display());
            return;
        }

        let path = std::path::absolute(&path).unwrap_or(path);
        if self.inner.gate.is_busy() {
            debug!("Queueing {} behind the running load", path.format_for_log());
        }
        let ticket = {
            let mut state = self.inner.lock_state();
            state.requested_file = Some(path.clone());
            self.inner.gate.take_ticket()
        };
        let inner = Arc::clone(&self.inner);
        spawn_worker("image-load", move || inner.run_load(ticket, path));
    }

    /// Loads the file after the last requested one, if any.
    pub fn next(&self) {
        let requested = self.requested_file();
        if let Some(path) = navigation::next_image(requested.as_deref()) {
            self.load(path);
        }
    }

    /// Loads the file before the last requested one, if any.
    pub fn previous(&self) {
        let requested = self.requested_file();
        if let Some(path) = navigation::prev_image(requested.as_deref()) {
            self.load(path);
        }
    }

    /// Navigation starts from the newest request so that repeated steps
    /// issued while loads are queued keep advancing.
    fn requested_file(&self) -> Option<PathBuf> {
        let state = self.inner.lock_state();
        state.requested_file.clone().or_else(|| state.current_file.clone())
    }

    /// Shows the next frame, wrapping to the first.
    pub fn next_frame(&self) {
        self.step_frame(FrameStep::Forward);
    }

    /// Shows the previous frame, wrapping to the last.
    pub fn previous_frame(&self) {
        self.step_frame(FrameStep::Backward);
    }

    fn step_frame(&self, step: FrameStep) {
        let ticket = self.inner.gate.take_ticket();
        let inner = Arc::clone(&self.inner);
        spawn_worker("frame-step", move || inner.run_frame_step(ticket, step));
    }

    /// Encodes the current image set to `path` on the rayon pool and hands the
    /// result to `on_done` on the UI thread.
    pub fn save<F>(&self, path: PathBuf, on_done: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let (images, frame_index) = {
            let state = self.inner.lock_state();
            (state.images.clone(), state.frame_index)
        };
        let dispatcher = Arc::clone(&self.inner.dispatcher);
        if images.is_empty() {
            let error = AppError::ImageSave("No image loaded".to_string());
            dispatcher.post(Box::new(move || on_done(Err(error))));
            return;
        }

        rayon::spawn(move || {
            let start = Instant::now();
            let result = image_loader::encode(&images, frame_index, &path);
            match &result {
                Ok(()) => info!("Saved {} in {:?}", path.display(), start.elapsed()),
                Err(e) => warn!("Failed to save {}: {}", path.display(), e),
            }
            dispatcher.post(Box::new(move || on_done(result)));
        });
    }

    /// The file currently displayed or being loaded.
    pub fn current_file(&self) -> Option<PathBuf> {
        self.inner.lock_state().current_file.clone()
    }

    /// `(frame index, frame count)` of the current image set.
    pub fn frame_position(&self) -> (usize, usize) {
        let state = self.inner.lock_state();
        (state.frame_index, state.images.len())
    }

    /// Drops the decoded frames and stops watching. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(watcher) = self.inner.watcher.lock().ok().and_then(|mut w| w.take()) {
            watcher.disable();
        }
        let mut state = self.inner.lock_state();
        state.images = ImageSet::default();
        state.frame_index = 0;
        debug!("Load coordinator disposed");
    }
}

fn spawn_worker<F>(name: &str, work: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = thread::Builder::new().name(name.to_string()).spawn(work) {
        error!("Failed to spawn {} thread: {}", name, e);
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ViewerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Posts an event to the listener. A permit passed along is released
    /// after the listener returns, or when the task is dropped unrun.
    fn publish(&self, event: LoadEvent, permit: Option<LoadPermit>) {
        let listener = Arc::clone(&self.listener);
        self.dispatcher.post(Box::new(move || {
            listener(&event);
            drop(permit);
        }));
    }

    fn run_load(self: &Arc<Self>, ticket: Ticket, path: PathBuf) {
        let permit = ticket.wait();
        if self.disposed.load(Ordering::SeqCst) {
            debug!("Skipping load of {} after shutdown", path.format_for_log());
            return;
        }
        let start = Instant::now();

        let (previous_file, previous_index) = {
            let mut state = self.lock_state();
            let previous_file = state.current_file.replace(path.clone());
            (previous_file, state.frame_index)
        };
        self.watch(&path);

        info!("Loading {}", path.display());
        self.publish(LoadEvent::Started { path: path.clone() }, None);

        {
            let mut state = self.lock_state();
            state.images = ImageSet::default();
            state.frame_index = 0;
        }

        let settings = ReadSettings::for_path(&path);
        let (images, error) = match self.decoder.decode(&path, &settings) {
            Ok(images) => (images, None),
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                (ImageSet::default(), Some(e))
            }
        };

        if self.disposed.load(Ordering::SeqCst) {
            debug!("Discarding {} loaded after shutdown", path.format_for_log());
            return;
        }

        let view = {
            let mut state = self.lock_state();
            let same_file = previous_file.as_deref() == Some(path.as_path());
            state.frame_index = if same_file && previous_index < images.len() {
                previous_index
            } else {
                0
            };
            state.images = images;
            state.view(error)
        };

        debug!(
            "Load of {} finished in {:?}",
            path.format_for_log(),
            start.elapsed()
        );
        self.publish(LoadEvent::Finished(view), Some(permit));
    }

    fn run_frame_step(&self, ticket: Ticket, step: FrameStep) {
        let permit = ticket.wait();
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let view = {
            let mut state = self.lock_state();
            let count = state.images.len();
            if count < 2 {
                return;
            }
            state.frame_index = match step {
                FrameStep::Forward => (state.frame_index + 1) % count,
                FrameStep::Backward => (state.frame_index + count - 1) % count,
            };
            state.view(None)
        };

        debug!("Showing frame {} of {}", view.index + 1, view.count);
        self.publish(LoadEvent::Finished(view), Some(permit));
    }

    /// Arms the file watcher for `path`, creating it on first use.
    fn watch(self: &Arc<Self>, path: &Path) {
        let Ok(mut watcher) = self.watcher.lock() else {
            return;
        };
        // Checked under the lock: dispose sets the flag before taking the watcher.
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if watcher.is_none() {
            match FileWatcher::new(self.change_handler()) {
                Ok(created) => *watcher = Some(created),
                Err(e) => {
                    warn!("File watching unavailable: {}", e);
                    return;
                }
            }
        }

        if let Some(watcher) = watcher.as_mut() {
            if let Err(e) = watcher.watch(path) {
                warn!("Failed to watch {}: {}", path.display(), e);
            }
        }
    }

    /// Reaction to an external change: wait for the writer, then reload on
    /// the UI thread if the file is still the one displayed.
    fn change_handler(self: &Arc<Self>) -> impl Fn(PathBuf) + Send + Sync + 'static {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let dispatcher = Arc::clone(&self.dispatcher);

        move |path: PathBuf| {
            if !file_utils::wait_until_readable(&path) {
                return;
            }

            let weak = weak.clone();
            dispatcher.post(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let coordinator = LoadCoordinator { inner };
                if coordinator.current_file().as_deref() == Some(path.as_path()) {
                    info!("Reloading {} after external change", path.format_for_log());
                    coordinator.load(path);
                }
            }));
        }
    }
}
