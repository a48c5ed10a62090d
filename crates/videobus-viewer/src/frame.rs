//! Raw video frames and their pixel formats
//!
//! A [`VideoFrame`] is one image of the live stream as it arrives from the
//! bus: a contiguous pixel buffer plus the metadata needed to interpret it.
//! The buffer is a [`bytes::Bytes`], so a frame is immutable from the moment
//! it is constructed and cloning it is a reference-count bump rather than a
//! copy. Ownership moves into the downstream sink exactly once; the renderer
//! only borrows the bytes for the duration of a texture upload.

use bytes::Bytes;
use std::time::Duration;

/// Pixel layouts that appear on the video bus
///
/// This is the closed set of formats publishers are allowed to tag frames
/// with. Only a subset of it is renderable; [`PixelFormat::upload_format`]
/// tells the two apart. Formats outside the renderable subset must be
/// rejected with an error by the consumer, never crash it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGBA, byte order R, G, B, A
    Rgba8888,
    /// 8-bit RGBA with premultiplied alpha
    Rgba8888Premultiplied,
    /// 32-bit ARGB packed pixels
    Argb32,
    /// 32-bit ARGB packed pixels with premultiplied alpha
    Argb32Premultiplied,
    /// 8-bit RGB, three bytes per pixel, no alpha
    Rgb888,
    /// 8-bit BGR, three bytes per pixel
    Bgr888,
    /// 16-bit RGB, 5-6-5 bit packing
    Rgb565,
    /// 8-bit single-channel grayscale
    Gray8,
}

/// The GPU-side upload layout a renderable frame maps to
///
/// The texture's internal storage is always four channels; this only
/// describes how the source bytes are laid out for the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    /// Four bytes per pixel, uploaded as-is
    Rgba,
    /// Three bytes per pixel, expanded to four channels during upload
    Rgb,
}

impl PixelFormat {
    /// Maps this format to its GPU upload layout
    ///
    /// Returns `None` for formats the renderer does not support. Callers
    /// must treat `None` as an error path and skip the frame; there is no
    /// fallback layout.
    pub fn upload_format(&self) -> Option<UploadFormat> {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgba8888Premultiplied | PixelFormat::Argb32 | PixelFormat::Argb32Premultiplied => Some(UploadFormat::Rgba),
            PixelFormat::Rgb888 => Some(UploadFormat::Rgb),
            PixelFormat::Bgr888 | PixelFormat::Rgb565 | PixelFormat::Gray8 => None,
        }
    }

    /// Size of one pixel in bytes
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgba8888Premultiplied | PixelFormat::Argb32 | PixelFormat::Argb32Premultiplied => 4,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => 3,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Human-readable name for log messages
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Rgba8888 => "RGBA8888",
            PixelFormat::Rgba8888Premultiplied => "RGBA8888 (premultiplied)",
            PixelFormat::Argb32 => "ARGB32",
            PixelFormat::Argb32Premultiplied => "ARGB32 (premultiplied)",
            PixelFormat::Rgb888 => "RGB888",
            PixelFormat::Bgr888 => "BGR888",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Gray8 => "Gray8",
        }
    }
}

/// One raw video frame plus its metadata
///
/// Frames are produced by the middleware delivery path, handed to the
/// downstream sink exactly once, and consumed by the renderer on the render
/// thread. The pixel buffer is tightly packed: `width * bytes_per_pixel`
/// bytes per row, no padding between rows.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data, tightly packed rows, top-left origin
    pub data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Layout of the bytes in `data`
    pub format: PixelFormat,
    /// Capture timestamp, relative to the start of the stream
    pub timestamp: Duration,
}

impl VideoFrame {
    /// Creates a frame from its parts
    pub fn new(data: Bytes, width: u32, height: u32, format: PixelFormat, timestamp: Duration) -> Self {
        Self {
            data,
            width,
            height,
            format,
            timestamp,
        }
    }

    /// Number of bytes a well-formed buffer of this geometry must hold
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_variants_upload_as_rgba() {
        for format in [
            PixelFormat::Rgba8888,
            PixelFormat::Rgba8888Premultiplied,
            PixelFormat::Argb32,
            PixelFormat::Argb32Premultiplied,
        ] {
            assert_eq!(format.upload_format(), Some(UploadFormat::Rgba));
            assert_eq!(format.bytes_per_pixel(), 4);
        }
    }

    #[test]
    fn rgb888_uploads_as_rgb() {
        assert_eq!(PixelFormat::Rgb888.upload_format(), Some(UploadFormat::Rgb));
        assert_eq!(PixelFormat::Rgb888.bytes_per_pixel(), 3);
    }

    #[test]
    fn non_renderable_formats_have_no_upload_layout() {
        for format in [PixelFormat::Bgr888, PixelFormat::Rgb565, PixelFormat::Gray8] {
            assert_eq!(format.upload_format(), None);
        }
    }

    #[test]
    fn expected_len_follows_geometry_and_format() {
        let frame = VideoFrame::new(Bytes::new(), 640, 480, PixelFormat::Rgb888, Duration::ZERO);
        assert_eq!(frame.expected_len(), 640 * 480 * 3);

        let frame = VideoFrame::new(Bytes::new(), 2, 2, PixelFormat::Rgba8888, Duration::ZERO);
        assert_eq!(frame.expected_len(), 16);
    }
}
