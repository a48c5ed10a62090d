//! Live video display for pub/sub frame streams
//!
//! This crate takes raw video frames arriving from a publish/subscribe bus
//! and puts them on screen with the GPU: a listener drains frames on the
//! middleware's callback thread and hands them through a bounded sink to the
//! render thread, where they are uploaded as textures and blitted into an
//! aspect-preserving viewport.

mod frame;
mod listener;
mod renderer;
mod sink;
mod surface;

pub mod viewport;

pub use frame::{PixelFormat, UploadFormat, VideoFrame};
pub use listener::{DeadlineStatus, FrameForwarder, FrameReader, StreamListener};
pub use renderer::{BlitRenderer, RenderError, RenderState};
pub use sink::{ChannelSink, FRAME_QUEUE_DEPTH, FrameSink, PushError};
pub use surface::SurfaceController;
pub use viewport::{Viewport, ViewportError};
