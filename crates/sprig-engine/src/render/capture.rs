//! Framebuffer capture.
//!
//! Reads the whole color buffer back as RGBA8 and normalizes it to top-down
//! scanline order before handing it to the PNG encoder.

use std::path::Path;

use thiserror::Error;

use super::backend::GraphicsBackend;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("framebuffer has zero size ({width}x{height})")]
    EmptyFramebuffer { width: u32, height: u32 },

    #[error("no frame is being rendered; capture must happen between frame begin and end")]
    NoTarget,

    #[error("pixel format {0} cannot be read back")]
    UnsupportedFormat(String),

    #[error("readback returned {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("failed to encode image")]
    Encode(#[from] image::ImageError),
}

/// Where row 0 of a readback sits on screen.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RowOrigin {
    /// Row 0 is the top scanline.
    Top,
    /// Row 0 is the bottom scanline (GL convention).
    Bottom,
}

/// Raw RGBA8 pixels as returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelReadback {
    pub width: u32,
    pub height: u32,
    pub origin: RowOrigin,
    pub bytes: Vec<u8>,
}

/// Top-down RGBA8 image ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CapturedImage {
    /// Returns row `y` (0 = top).
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    /// Encodes the image as PNG at `path`.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        image::save_buffer_with_format(
            path.as_ref(),
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )?;
        Ok(())
    }
}

/// Copies `pixels` with scanline order reversed.
///
/// Row 0 of the output is the last row of the input. `pixels` must hold
/// exactly `width * height` RGBA8 pixels.
pub fn flip_rows(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let stride = width as usize * BYTES_PER_PIXEL;
    debug_assert_eq!(pixels.len(), stride * height as usize);

    let mut flipped = Vec::with_capacity(pixels.len());
    for row in pixels.chunks_exact(stride).rev() {
        flipped.extend_from_slice(row);
    }
    flipped
}

/// Reads the backend's full color buffer into a top-down image.
///
/// The size is taken from the framebuffer being drawn, not from any size the
/// window was asked to have.
pub fn capture<B: GraphicsBackend>(backend: &mut B) -> Result<CapturedImage, CaptureError> {
    let (width, height) = backend.framebuffer_size();
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyFramebuffer { width, height });
    }

    let readback = backend.read_pixels(0, 0, width, height)?;

    let expected = readback.width as usize * readback.height as usize * BYTES_PER_PIXEL;
    if readback.bytes.len() != expected {
        return Err(CaptureError::SizeMismatch {
            expected,
            actual: readback.bytes.len(),
        });
    }

    let pixels = match readback.origin {
        RowOrigin::Top => readback.bytes,
        RowOrigin::Bottom => flip_rows(&readback.bytes, readback.width, readback.height),
    };

    Ok(CapturedImage {
        width: readback.width,
        height: readback.height,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::render::backend::HeadlessBackend;

    const A: [u8; 4] = [255, 0, 0, 255];
    const B: [u8; 4] = [0, 0, 255, 255];

    #[test]
    fn flip_reverses_row_order() {
        let pixels = [A, A, B, B].concat();
        assert_eq!(flip_rows(&pixels, 2, 2), [B, B, A, A].concat());
    }

    #[test]
    fn flip_keeps_pixel_order_inside_rows() {
        let pixels = [A, B].concat();
        assert_eq!(flip_rows(&pixels, 2, 1), pixels);
    }

    #[test]
    fn bottom_origin_readback_is_flipped() {
        let h = 5;
        let mut backend = HeadlessBackend::new(3, h);
        // Headless rows are bottom-up: row 0 is the bottom scanline.
        backend.fill_row(0, A);
        backend.fill_row(h - 1, B);

        let img = capture(&mut backend).unwrap();
        assert_eq!(img.row(0), [B, B, B].concat().as_slice());
        assert_eq!(img.row(h - 1), [A, A, A].concat().as_slice());
    }

    #[test]
    fn capture_uses_current_framebuffer_size() {
        let mut backend = HeadlessBackend::new(4, 4);
        backend.set_viewport(6, 2);
        backend.clear(Color::WHITE);
        let img = capture(&mut backend).unwrap();
        assert_eq!((img.width, img.height), (6, 2));
        assert_eq!(img.pixels.len(), 6 * 2 * BYTES_PER_PIXEL);
    }

    #[test]
    fn zero_sized_framebuffer_is_rejected() {
        let mut backend = HeadlessBackend::new(0, 10);
        assert!(matches!(
            capture(&mut backend),
            Err(CaptureError::EmptyFramebuffer { .. })
        ));
    }

    #[test]
    fn save_png_writes_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let img = CapturedImage {
            width: 1,
            height: 2,
            pixels: [B, A].concat(),
        };
        img.save_png(&path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (1, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, B);
        assert_eq!(decoded.get_pixel(0, 1).0, A);
    }
}
