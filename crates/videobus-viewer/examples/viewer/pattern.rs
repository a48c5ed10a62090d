//! Synthetic test-pattern publisher
//!
//! Stands in for the bus middleware: generates a moving gradient at a fixed
//! rate on its own thread and delivers it through the listener callback,
//! exactly as a real subscription would. Oversleeping past the frame
//! deadline is reported through the deadline-missed callback.

use bytes::Bytes;
use clap::ValueEnum;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use videobus_viewer::{DeadlineStatus, FrameForwarder, FrameReader, PixelFormat, StreamListener, VideoFrame};

/// Pixel formats the pattern generator can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternFormat {
    /// Four bytes per pixel with opaque alpha
    Rgba8888,
    /// Three bytes per pixel
    Rgb888,
}

impl PatternFormat {
    pub fn pixel_format(self) -> PixelFormat {
        match self {
            PatternFormat::Rgba8888 => PixelFormat::Rgba8888,
            PatternFormat::Rgb888 => PixelFormat::Rgb888,
        }
    }
}

/// Stream parameters for the publisher thread
#[derive(Debug, Clone, Copy)]
pub struct PatternConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

/// Reader handing out the frames of one delivery
struct BatchReader {
    frames: Vec<VideoFrame>,
}

impl FrameReader for BatchReader {
    fn take(&mut self) -> Vec<VideoFrame> {
        std::mem::take(&mut self.frames)
    }
}

/// Publishes pattern frames until `stop` is raised
///
/// Runs the delivery loop on the calling thread: generate, deliver through
/// the listener, sleep out the frame interval. Deadline violations (the
/// interval overrun by half) are reported through the status callback, as
/// the middleware would.
pub fn run_publisher(listener: Arc<FrameForwarder>, config: PatternConfig, stop: Arc<AtomicBool>) {
    let interval = Duration::from_secs_f64(1.0 / config.fps.max(1) as f64);
    let deadline_slack = interval + interval / 2;
    let start = Instant::now();

    let mut tick = 0u64;
    let mut missed = 0u32;
    let mut last_delivery = start;

    tracing::info!(width = config.width, height = config.height, fps = config.fps, "pattern publisher running");

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now - last_delivery > deadline_slack && tick > 0 {
            missed += 1;
            listener.deadline_missed(&DeadlineStatus { total_count: missed });
        }
        last_delivery = now;

        let frame = pattern_frame(&config, tick, now - start);
        listener.data_available(&mut BatchReader { frames: vec![frame] });

        tick += 1;
        std::thread::sleep(interval);
    }

    tracing::info!(frames = tick, "pattern publisher stopped");
}

/// Builds one frame of the moving gradient
fn pattern_frame(config: &PatternConfig, tick: u64, timestamp: Duration) -> VideoFrame {
    let (w, h) = (config.width, config.height);
    let bpp = config.format.bytes_per_pixel();
    let phase = (tick % 256) as u8;

    let mut data = Vec::with_capacity(w as usize * h as usize * bpp);
    for y in 0..h {
        for x in 0..w {
            let r = ((x * 255) / w.max(1)) as u8;
            let g = ((y * 255) / h.max(1)) as u8;
            let b = phase.wrapping_add((x ^ y) as u8);
            match config.format {
                PixelFormat::Rgb888 => data.extend_from_slice(&[r, g, b]),
                _ => data.extend_from_slice(&[r, g, b, 0xff]),
            }
        }
    }

    VideoFrame::new(Bytes::from(data), w, h, config.format, timestamp)
}
