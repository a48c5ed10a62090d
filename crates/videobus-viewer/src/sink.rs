//! Downstream frame sink
//!
//! The sink is the push-style boundary between the delivery path and the
//! element that buffers frames for the render thread. A push either succeeds
//! or is rejected; rejected frames are dropped by the caller, never retried.
//! Stale video frames have no value after the fact.

use crate::frame::VideoFrame;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use thiserror::Error;

/// Number of frames buffered between the delivery path and the renderer
///
/// A small bound smooths out timing variation between the publisher and the
/// render loop without letting a stalled consumer accumulate stale frames.
pub const FRAME_QUEUE_DEPTH: usize = 3;

/// Why a push was refused
#[derive(Debug, Error)]
pub enum PushError {
    /// The sink has no capacity left for this frame
    #[error("sink rejected the frame: queue is full")]
    Rejected,
    /// The consuming side of the sink is gone
    #[error("sink is disconnected: consumer dropped")]
    Disconnected,
}

/// Accepts one frame at a time from the delivery path
///
/// Implementations must never block the calling thread: the caller is the
/// middleware's callback thread and a slow consumer must cost a dropped
/// frame, not a stalled subscription.
pub trait FrameSink: Send + Sync {
    /// Transfers ownership of one frame into the sink
    fn push(&self, frame: VideoFrame) -> Result<(), PushError>;
}

/// A [`FrameSink`] backed by a bounded channel
///
/// The channel is the thread-safe hand-off between the middleware callback
/// context and the render thread, which holds the [`Receiver`].
pub struct ChannelSink {
    tx: SyncSender<VideoFrame>,
}

impl ChannelSink {
    /// Creates a sink with the default queue depth and returns its consuming end
    pub fn bounded() -> (Self, Receiver<VideoFrame>) {
        Self::with_depth(FRAME_QUEUE_DEPTH)
    }

    /// Creates a sink with an explicit queue depth
    pub fn with_depth(depth: usize) -> (Self, Receiver<VideoFrame>) {
        let (tx, rx) = mpsc::sync_channel(depth);
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn push(&self, frame: VideoFrame) -> Result<(), PushError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Rejected,
            TrySendError::Disconnected(_) => PushError::Disconnected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use bytes::Bytes;
    use std::time::Duration;

    fn frame() -> VideoFrame {
        VideoFrame::new(Bytes::from_static(&[0; 4]), 1, 1, PixelFormat::Rgba8888, Duration::ZERO)
    }

    #[test]
    fn push_succeeds_until_the_queue_is_full() {
        let (sink, _rx) = ChannelSink::with_depth(2);

        sink.push(frame()).unwrap();
        sink.push(frame()).unwrap();
        assert!(matches!(sink.push(frame()), Err(PushError::Rejected)));
    }

    #[test]
    fn push_reports_a_dropped_consumer() {
        let (sink, rx) = ChannelSink::bounded();
        drop(rx);

        assert!(matches!(sink.push(frame()), Err(PushError::Disconnected)));
    }

    #[test]
    fn frames_come_out_in_push_order() {
        let (sink, rx) = ChannelSink::bounded();

        for i in 0..3u64 {
            let mut f = frame();
            f.timestamp = Duration::from_millis(i);
            sink.push(f).unwrap();
        }

        for i in 0..3u64 {
            assert_eq!(rx.try_recv().unwrap().timestamp, Duration::from_millis(i));
        }
    }
}
