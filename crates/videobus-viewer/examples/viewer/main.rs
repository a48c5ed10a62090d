//! Live video viewer example
//!
//! Subscribes to a synthetic test-pattern stream and displays it. The
//! pattern publisher runs on its own thread and delivers frames through the
//! production path: listener callback, bounded sink, render thread. This is
//! the same wiring a real bus subscription uses, with the middleware
//! replaced by the in-process publisher.
//!
//! # Usage
//! ```bash
//! cargo run --example viewer -- --width 640 --height 480 --fps 30
//! ```

mod app;
mod pattern;

use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

/// Command-line arguments for the viewer
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Stream width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Stream height in pixels
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Publish rate in frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Pixel format the publisher emits
    #[arg(long, value_enum, default_value_t = pattern::PatternFormat::Rgba8888)]
    format: pattern::PatternFormat,
}

fn main() -> Result<(), winit::error::EventLoopError> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    tracing::info!("starting viewer...");

    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = app::ViewerApp::new(args);
    event_loop.run_app(&mut app)
}
