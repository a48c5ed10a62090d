//! Bus-side listener and frame forwarding
//!
//! The middleware delivers frames and status events through a two-method
//! callback interface, invoked from its own thread pool. [`FrameForwarder`]
//! is the concrete listener: it drains every frame the reader currently
//! holds, in arrival order, and transfers each one into the installed
//! [`FrameSink`]. Nothing here ever blocks the callback thread and nothing
//! is queued inside the forwarder itself; if the downstream cannot take a
//! frame, the frame is dropped.

use crate::sink::FrameSink;
use crate::frame::VideoFrame;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Payload of a deadline-missed notification
///
/// Status only, no frame data. `total_count` is the middleware's own running
/// total for the subscription.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineStatus {
    /// Total number of deadline violations the middleware has observed
    pub total_count: u32,
}

/// Drain interface over the middleware's delivery queue
///
/// `take` removes and returns every frame that is currently available, in
/// arrival order. The listener must drain completely on each callback; the
/// middleware does not re-notify for frames that were already available.
pub trait FrameReader {
    /// Removes and returns all currently available frames, oldest first
    fn take(&mut self) -> Vec<VideoFrame>;
}

/// The callback interface the middleware invokes
///
/// Exactly two entry points: new data, and a missed delivery deadline. Both
/// are called from the middleware's own threads, so implementations must be
/// `Send + Sync` and must return quickly.
pub trait StreamListener: Send + Sync {
    /// One or more frames are ready; drain them all before returning
    fn data_available(&self, reader: &mut dyn FrameReader);

    /// The subscription's delivery deadline was violated
    fn deadline_missed(&self, status: &DeadlineStatus);
}

/// Listener that forwards drained frames into a downstream sink
///
/// The forwarder starts without a sink. Until [`install_sink`] is called,
/// delivered frames are discarded rather than queued: buffering indefinitely
/// with nothing consuming risks unbounded memory growth, and stale frames
/// are worthless anyway. The sink can be installed exactly once.
///
/// [`install_sink`]: FrameForwarder::install_sink
pub struct FrameForwarder {
    sink: OnceLock<Box<dyn FrameSink>>,
    missed_deadlines: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl FrameForwarder {
    /// Creates a forwarder with no sink installed
    pub fn new() -> Self {
        Self {
            sink: OnceLock::new(),
            missed_deadlines: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Binds the downstream sink
    ///
    /// This is a one-way transition: the first call installs the sink, any
    /// later call is refused and logged while the original sink stays in
    /// place.
    pub fn install_sink(&self, sink: Box<dyn FrameSink>) {
        if self.sink.set(sink).is_err() {
            tracing::error!("a sink is already installed; keeping the existing one");
        }
    }

    /// Running count of deadline-missed notifications
    pub fn missed_deadlines(&self) -> u64 {
        self.missed_deadlines.load(Ordering::Relaxed)
    }

    /// Number of frames successfully pushed downstream
    pub fn frames_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Number of frames discarded (no sink installed, or push rejected)
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamListener for FrameForwarder {
    /// Drains the reader and pushes each frame downstream in arrival order
    ///
    /// Each push completes, successfully or not, before the next frame is
    /// attempted. A rejected push drops that one frame and the batch
    /// continues; there is no retry.
    fn data_available(&self, reader: &mut dyn FrameReader) {
        let frames = reader.take();
        if frames.is_empty() {
            return;
        }

        let Some(sink) = self.sink.get() else {
            self.dropped.fetch_add(frames.len() as u64, Ordering::Relaxed);
            tracing::debug!(count = frames.len(), "no sink installed, discarding frames");
            return;
        };

        for frame in frames {
            let timestamp = frame.timestamp;
            match sink.push(frame) {
                Ok(()) => {
                    self.forwarded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(?timestamp, error = %e, "frame dropped");
                }
            }
        }
    }

    fn deadline_missed(&self, status: &DeadlineStatus) {
        let seen = self.missed_deadlines.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(total_count = status.total_count, seen, "delivery deadline missed");
    }
}

impl Drop for FrameForwarder {
    fn drop(&mut self) {
        tracing::debug!(
            forwarded = self.forwarded.load(Ordering::Relaxed),
            dropped = self.dropped.load(Ordering::Relaxed),
            "frame forwarder shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use crate::sink::{ChannelSink, PushError};
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Reader that hands out a prepared batch once
    struct BatchReader {
        frames: Vec<VideoFrame>,
    }

    impl FrameReader for BatchReader {
        fn take(&mut self) -> Vec<VideoFrame> {
            std::mem::take(&mut self.frames)
        }
    }

    /// Sink that records every push in order and can refuse pushes
    struct RecordingSink {
        seen: Arc<Mutex<Vec<Duration>>>,
        reject_after: Option<usize>,
    }

    impl FrameSink for RecordingSink {
        fn push(&self, frame: VideoFrame) -> Result<(), PushError> {
            let mut seen = self.seen.lock().unwrap();
            if let Some(limit) = self.reject_after {
                if seen.len() >= limit {
                    return Err(PushError::Rejected);
                }
            }
            seen.push(frame.timestamp);
            Ok(())
        }
    }

    fn batch(n: u64) -> BatchReader {
        BatchReader {
            frames: (0..n)
                .map(|i| VideoFrame::new(Bytes::from_static(&[0; 4]), 1, 1, PixelFormat::Rgba8888, Duration::from_millis(i)))
                .collect(),
        }
    }

    #[test]
    fn batches_are_forwarded_in_arrival_order() {
        let forwarder = FrameForwarder::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        forwarder.install_sink(Box::new(RecordingSink {
            seen: seen.clone(),
            reject_after: None,
        }));

        forwarder.data_available(&mut batch(5));

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..5).map(Duration::from_millis).collect::<Vec<_>>());
        assert_eq!(forwarder.frames_forwarded(), 5);
        assert_eq!(forwarder.frames_dropped(), 0);
    }

    #[test]
    fn rejected_pushes_drop_single_frames_without_aborting_the_batch() {
        let forwarder = FrameForwarder::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        forwarder.install_sink(Box::new(RecordingSink {
            seen: seen.clone(),
            reject_after: Some(2),
        }));

        forwarder.data_available(&mut batch(5));

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(forwarder.frames_forwarded(), 2);
        assert_eq!(forwarder.frames_dropped(), 3);
    }

    #[test]
    fn frames_before_install_are_discarded_not_queued() {
        let forwarder = FrameForwarder::new();

        forwarder.data_available(&mut batch(3));
        assert_eq!(forwarder.frames_dropped(), 3);
        assert_eq!(forwarder.missed_deadlines(), 0);

        // A sink installed afterwards sees nothing from the earlier batch.
        let seen = Arc::new(Mutex::new(Vec::new()));
        forwarder.install_sink(Box::new(RecordingSink {
            seen: seen.clone(),
            reject_after: None,
        }));
        forwarder.data_available(&mut batch(0));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn deadline_counter_increments_by_exactly_one_per_callback() {
        let forwarder = FrameForwarder::new();

        for i in 1..=4 {
            forwarder.deadline_missed(&DeadlineStatus { total_count: i });
            assert_eq!(forwarder.missed_deadlines(), i as u64);
        }

        // Deadline callbacks have no frame side effects.
        assert_eq!(forwarder.frames_forwarded(), 0);
        assert_eq!(forwarder.frames_dropped(), 0);
    }

    #[test]
    fn second_install_is_refused_and_first_sink_keeps_receiving() {
        let forwarder = FrameForwarder::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        forwarder.install_sink(Box::new(RecordingSink {
            seen: seen.clone(),
            reject_after: None,
        }));

        let (other, rx) = ChannelSink::bounded();
        forwarder.install_sink(Box::new(other));

        forwarder.data_available(&mut batch(2));
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(rx.try_recv().is_err());
    }
}
