use winit::window::Window;

use crate::device::{Gpu, SurfaceErrorAction};
use crate::paint::Color;
use crate::render::{Renderer, WgpuBackend};
use crate::time::FrameTime;

use super::app::AppControl;

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// `'a` is the callback; `'w` is the window borrow carried by `Gpu<'w>`.
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
}

impl FrameCtx<'_, '_> {
    /// Draws one frame through `renderer` and presents it.
    ///
    /// The renderer is resized to the surface, the frame is cleared to `clear`,
    /// `draw` records its calls, and a capture requested with
    /// [`Renderer::request_capture`] is taken from the finished image before
    /// presentation.
    pub fn render<F>(&mut self, renderer: &mut Renderer<WgpuBackend>, clear: Color, draw: F) -> AppControl
    where
        F: FnOnce(&mut Renderer<WgpuBackend>),
    {
        let frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        let size = self.gpu.size();
        renderer.sync_size(size.width, size.height);
        renderer.backend_mut().begin_frame(frame.texture());

        renderer.clear(clear);
        draw(renderer);

        if let Some(path) = renderer.take_capture_request() {
            if let Err(e) = renderer.capture_to_image(&path) {
                log::error!("capture to {} failed: {e}", path.display());
            }
        }

        renderer.backend_mut().end_frame();

        self.window.pre_present_notify();
        self.gpu.present(frame);

        AppControl::Continue
    }
}
