//! Application configuration constants.

use std::time::Duration;

/// Window title shown while no image is displayed (version is appended).
pub const APP_NAME: &str = "Slint Image Viewer";

/// Delay between two exclusive-access probes while waiting for a writer to finish.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Debounce period for file change notifications.
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// After (re)arming the watcher, events that leave the file's stamp untouched
/// are treated as echoes of the viewer's own probe and decode for this long.
pub const WATCH_SETTLE_PERIOD: Duration = Duration::from_secs(1);

/// Extensions rasterized from vector data.
pub const VECTOR_FORMAT_EXTENSIONS: [&str; 2] = ["svg", "svgz"];

/// Rasterization density applied to vector formats so they are not blurry on screen.
pub const VECTOR_FORMAT_DENSITY: f32 = 300.0;

/// Density at which SVG user units map 1:1 to pixels.
pub const SVG_BASE_DPI: f32 = 96.0;

/// Pointer travel (logical px) after which a press turns into a drag.
pub const DRAG_CAPTURE_THRESHOLD: f32 = 5.0;
