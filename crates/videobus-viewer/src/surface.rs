//! Render surface lifecycle
//!
//! [`SurfaceController`] sequences the host's render-loop callbacks: the
//! surface becomes ready once, then resizes and paints interleave freely.
//! It owns the current viewport rectangle, recomputing it from the stream's
//! reference size on every resize and handing it to the renderer on every
//! paint.

use crate::frame::VideoFrame;
use crate::renderer::{BlitRenderer, RenderError};
use crate::viewport::{self, Viewport};

/// Default reference size before the stream announces one
const DEFAULT_REFERENCE_SIZE: (u32, u32) = (640, 480);

/// Drives a [`BlitRenderer`] from the host's ready/resize/paint callbacks
///
/// The controller exists before the surface does; callbacks arriving before
/// [`surface_ready`] only update geometry. All methods must be called from
/// the render thread.
///
/// [`surface_ready`]: SurfaceController::surface_ready
pub struct SurfaceController {
    reference_size: (u32, u32),
    drawable_size: Option<(u32, u32)>,
    viewport: Option<Viewport>,
    renderer: Option<BlitRenderer>,
}

impl SurfaceController {
    /// Creates a controller with the default 640x480 reference size
    pub fn new() -> Self {
        Self::with_reference_size(DEFAULT_REFERENCE_SIZE)
    }

    /// Creates a controller with an explicit reference size
    pub fn with_reference_size(reference_size: (u32, u32)) -> Self {
        Self {
            reference_size,
            drawable_size: None,
            viewport: None,
            renderer: None,
        }
    }

    /// The aspect-ratio reference size
    pub fn reference_size(&self) -> (u32, u32) {
        self.reference_size
    }

    /// Changes the reference size and recomputes the viewport
    pub fn set_reference_size(&mut self, reference_size: (u32, u32)) {
        self.reference_size = reference_size;
        if let Some((w, h)) = self.drawable_size {
            self.recompute_viewport(w, h);
        }
    }

    /// The most recently computed viewport rectangle
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Installs the renderer once its surface exists
    pub fn surface_ready(&mut self, renderer: BlitRenderer) {
        tracing::debug!(state = ?renderer.state(), "render surface ready");
        self.renderer = Some(renderer);
        if let Some((w, h)) = self.drawable_size {
            self.resize(w, h);
        }
    }

    /// Handles a drawable-size change
    ///
    /// Recomputes the viewport and reconfigures the renderer. Calling this
    /// twice with the same size yields the identical viewport.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.drawable_size = Some((width, height));
        self.recompute_viewport(width, height);
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(width, height);
        }
    }

    /// Paints the current frame into the current viewport
    ///
    /// A no-op until the surface is ready and a resize has produced a
    /// viewport.
    pub fn paint(&mut self) -> Result<(), RenderError> {
        let (Some(renderer), Some(viewport)) = (&mut self.renderer, self.viewport) else {
            return Ok(());
        };
        renderer.draw(viewport)
    }

    /// Uploads a newly arrived frame and paints it
    pub fn present_frame(&mut self, frame: &VideoFrame) -> Result<(), RenderError> {
        if let Some(renderer) = &mut self.renderer {
            renderer.upload_frame(frame)?;
        }
        self.paint()
    }

    fn recompute_viewport(&mut self, width: u32, height: u32) {
        match viewport::fit(self.reference_size, (width.max(1), height.max(1))) {
            Ok(vp) => self.viewport = Some(vp),
            // Keep the previous viewport; a degenerate reference is a caller
            // error and must not black out a live stream.
            Err(e) => tracing::error!(error = %e, "viewport not updated"),
        }
    }
}

impl Default for SurfaceController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_is_idempotent_for_equal_sizes() {
        let mut controller = SurfaceController::new();

        controller.resize(1920, 1080);
        let first = controller.viewport().unwrap();
        controller.resize(1920, 1080);
        let second = controller.viewport().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn viewport_tracks_the_latest_resize() {
        let mut controller = SurfaceController::new();

        controller.resize(800, 600);
        assert_eq!(controller.viewport().unwrap(), Viewport { x: 0, y: 0, width: 800, height: 600 });

        controller.resize(1920, 1080);
        assert_eq!(controller.viewport().unwrap(), Viewport { x: 240, y: 0, width: 1440, height: 1080 });
    }

    #[test]
    fn paint_before_surface_ready_is_a_no_op() {
        let mut controller = SurfaceController::new();
        controller.resize(800, 600);
        controller.paint().unwrap();
    }

    #[test]
    fn reference_size_change_recomputes_the_viewport() {
        let mut controller = SurfaceController::new();
        controller.resize(1920, 1080);

        controller.set_reference_size((16, 9));
        assert_eq!(controller.viewport().unwrap(), Viewport { x: 0, y: 0, width: 1920, height: 1080 });
    }

    #[test]
    fn degenerate_reference_size_keeps_the_previous_viewport() {
        let mut controller = SurfaceController::new();
        controller.resize(800, 600);
        let before = controller.viewport().unwrap();

        controller.set_reference_size((0, 480));
        assert_eq!(controller.viewport().unwrap(), before);
    }
}
