//! Pan and fit geometry for the image surface.
//!
//! Pure math over logical pixels; the UI feeds pointer positions and sizes in
//! and copies the resulting [`ImageLayout`] back into `ViewState`.

use crate::config::DRAG_CAPTURE_THRESHOLD;

/// Where the image is drawn inside the viewer, in logical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImageLayout {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy)]
struct PanStart {
    pointer: (f32, f32),
    offset: (f32, f32),
}

#[derive(Debug, Clone)]
pub struct Viewport {
    viewport_size: (f32, f32),
    content_size: (f32, f32),
    offset: (f32, f32),
    fit_to_screen: bool,
    pan: Option<PanStart>,
    captured: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            viewport_size: (0.0, 0.0),
            content_size: (0.0, 0.0),
            offset: (0.0, 0.0),
            fit_to_screen: true,
            pan: None,
            captured: false,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport_size = (width.max(0.0), height.max(0.0));
        self.clamp_offset();
    }

    /// Sets the natural size of the shown frame. A new size resets panning.
    pub fn set_content(&mut self, width: u32, height: u32) {
        let size = (width as f32, height as f32);
        if size != self.content_size {
            self.content_size = size;
            self.offset = (0.0, 0.0);
        }
    }

    pub fn clear_content(&mut self) {
        self.set_content(0, 0);
    }

    pub fn toggle_fit(&mut self) {
        self.fit_to_screen = !self.fit_to_screen;
        self.offset = (0.0, 0.0);
        log::debug!("Fit to screen: {}", self.fit_to_screen);
    }

    pub fn begin_pan(&mut self, x: f32, y: f32) {
        self.pan = Some(PanStart {
            pointer: (x, y),
            offset: self.offset,
        });
        self.captured = false;
    }

    /// Moves the image with the pointer. Returns whether the layout changed.
    pub fn pan_to(&mut self, x: f32, y: f32) -> bool {
        let Some(start) = self.pan else {
            return false;
        };

        let delta = (x - start.pointer.0, y - start.pointer.1);
        if !self.captured
            && (delta.0.abs() > DRAG_CAPTURE_THRESHOLD || delta.1.abs() > DRAG_CAPTURE_THRESHOLD)
        {
            self.captured = true;
        }

        if self.fit_to_screen {
            return false;
        }

        let previous = self.offset;
        self.offset = (start.offset.0 - delta.0, start.offset.1 - delta.1);
        self.clamp_offset();
        self.offset != previous
    }

    pub fn end_pan(&mut self) {
        self.pan = None;
        self.captured = false;
    }

    /// Whether the pointer moved far enough to count as a drag.
    pub fn is_dragging(&self) -> bool {
        self.captured
    }

    pub fn layout(&self) -> ImageLayout {
        let (vw, vh) = self.viewport_size;
        let (cw, ch) = self.content_size;
        if cw <= 0.0 || ch <= 0.0 {
            return ImageLayout::default();
        }

        if self.fit_to_screen {
            let scale = if vw > 0.0 && vh > 0.0 {
                (vw / cw).min(vh / ch).min(1.0)
            } else {
                1.0
            };
            let (width, height) = (cw * scale, ch * scale);
            return ImageLayout {
                x: (vw - width) / 2.0,
                y: (vh - height) / 2.0,
                width,
                height,
            };
        }

        let axis = |view: f32, content: f32, offset: f32| {
            if content <= view {
                (view - content) / 2.0
            } else {
                -offset
            }
        };
        ImageLayout {
            x: axis(vw, cw, self.offset.0),
            y: axis(vh, ch, self.offset.1),
            width: cw,
            height: ch,
        }
    }

    fn clamp_offset(&mut self) {
        let max_x = (self.content_size.0 - self.viewport_size.0).max(0.0);
        let max_y = (self.content_size.1 - self.viewport_size.1).max(0.0);
        self.offset = (
            self.offset.0.clamp(0.0, max_x),
            self.offset.1.clamp(0.0, max_y),
        );
    }
}
