use crate::pose::KeypointFrame;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Circular buffer decoupling the pose source from the analysis loop
///
/// The source pushes every frame it produces; the analyzer polls for the
/// latest frame at its own rate and skips frames it has already seen. Old
/// frames are simply overwritten, which is the desired behavior for a
/// real-time signal.
pub struct FrameRingBuffer {
    /// Frame slots protected by RwLocks
    frames: Vec<RwLock<Option<KeypointFrame>>>,
    /// Current write position (atomic for lock-free writes)
    write_index: AtomicUsize,
    /// Total capacity of the buffer
    capacity: usize,
    /// Frame counter for generating unique IDs
    frame_counter: AtomicU64,
    /// Statistics
    stats: FrameRingBufferStats,
}

/// Statistics for ring buffer performance monitoring
#[derive(Debug)]
pub struct FrameRingBufferStats {
    /// Total frames pushed to buffer
    pub frames_pushed: AtomicU64,
    /// Total frames retrieved from buffer
    pub frames_retrieved: AtomicU64,
    /// Number of buffer overruns (old frames overwritten)
    pub buffer_overruns: AtomicU64,
}

impl FrameRingBufferStats {
    fn new() -> Self {
        Self {
            frames_pushed: AtomicU64::new(0),
            frames_retrieved: AtomicU64::new(0),
            buffer_overruns: AtomicU64::new(0),
        }
    }

    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> FrameRingBufferStatsSnapshot {
        FrameRingBufferStatsSnapshot {
            frames_pushed: self.frames_pushed.load(Ordering::Relaxed),
            frames_retrieved: self.frames_retrieved.load(Ordering::Relaxed),
            buffer_overruns: self.buffer_overruns.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of ring buffer statistics
#[derive(Debug, Clone)]
pub struct FrameRingBufferStatsSnapshot {
    pub frames_pushed: u64,
    pub frames_retrieved: u64,
    pub buffer_overruns: u64,
}

impl FrameRingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be greater than 0");

        let mut frames = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            frames.push(RwLock::new(None));
        }

        debug!("Created frame ring buffer with capacity {}", capacity);

        Self {
            frames,
            write_index: AtomicUsize::new(0),
            capacity,
            frame_counter: AtomicU64::new(0),
            stats: FrameRingBufferStats::new(),
        }
    }

    /// Push a new frame into the buffer
    pub async fn push_frame(&self, frame: KeypointFrame) {
        let index = self.write_index.fetch_add(1, Ordering::Relaxed) % self.capacity;

        trace!("Pushing frame {} to buffer slot {}", frame.id, index);

        {
            let slot = self.frames[index].read().await;
            if slot.is_some() {
                self.stats.buffer_overruns.fetch_add(1, Ordering::Relaxed);
                trace!("Buffer overrun at slot {}", index);
            }
        }

        {
            let mut slot = self.frames[index].write().await;
            *slot = Some(frame);
        }

        self.stats.frames_pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the most recently pushed frame
    pub async fn latest_frame(&self) -> Option<KeypointFrame> {
        let current_index = self.write_index.load(Ordering::Relaxed);
        if current_index == 0 {
            return None;
        }

        let index = (current_index - 1) % self.capacity;
        let slot = self.frames[index].read().await;

        if let Some(frame) = slot.as_ref() {
            self.stats.frames_retrieved.fetch_add(1, Ordering::Relaxed);
            trace!("Retrieved latest frame {} from slot {}", frame.id, index);
            Some(frame.clone())
        } else {
            None
        }
    }

    /// Get the current buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get current buffer statistics
    pub fn stats(&self) -> FrameRingBufferStatsSnapshot {
        self.stats.snapshot()
    }

    /// Clear all frames from the buffer
    pub async fn clear(&self) {
        debug!("Clearing frame ring buffer");

        for slot in &self.frames {
            let mut frame_slot = slot.write().await;
            *frame_slot = None;
        }

        self.write_index.store(0, Ordering::Relaxed);
    }

    /// Get the next frame ID for new frames
    pub fn next_frame_id(&self) -> u64 {
        self.frame_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Get approximate number of frames currently in buffer
    pub async fn approximate_frame_count(&self) -> usize {
        let mut count = 0;

        for slot in &self.frames {
            let frame_slot = slot.read().await;
            if frame_slot.is_some() {
                count += 1;
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, KEYPOINT_COUNT};
    use std::sync::Arc;
    use std::time::SystemTime;

    fn create_test_frame(id: u64) -> KeypointFrame {
        KeypointFrame::new(
            id,
            SystemTime::now(),
            vec![Keypoint::new(0.0, 0.0, 0.9); KEYPOINT_COUNT],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ring_buffer_creation() {
        let buffer = FrameRingBuffer::new(10);
        assert_eq!(buffer.capacity(), 10);
        assert!(buffer.latest_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_push_and_get_latest() {
        let buffer = FrameRingBuffer::new(5);

        buffer.push_frame(create_test_frame(1)).await;

        let latest = buffer.latest_frame().await;
        assert!(latest.is_some());
        assert_eq!(latest.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_buffer_wraparound() {
        let buffer = FrameRingBuffer::new(3);

        for i in 1..=5 {
            buffer.push_frame(create_test_frame(i)).await;
        }

        let latest = buffer.latest_frame().await;
        assert_eq!(latest.unwrap().id, 5);

        let stats = buffer.stats();
        assert!(stats.buffer_overruns > 0);
    }

    #[tokio::test]
    async fn test_clear_buffer() {
        let buffer = FrameRingBuffer::new(5);

        for i in 1..=3 {
            buffer.push_frame(create_test_frame(i)).await;
        }
        assert!(buffer.latest_frame().await.is_some());

        buffer.clear().await;

        assert!(buffer.latest_frame().await.is_none());
        assert_eq!(buffer.approximate_frame_count().await, 0);
    }

    #[tokio::test]
    async fn test_frame_id_generation() {
        let buffer = FrameRingBuffer::new(5);
        assert_eq!(buffer.next_frame_id(), 0);
        assert_eq!(buffer.next_frame_id(), 1);
        assert_eq!(buffer.next_frame_id(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let buffer = Arc::new(FrameRingBuffer::new(100));
        let mut handles = Vec::new();

        for i in 0..10u64 {
            let buffer_clone = Arc::clone(&buffer);
            handles.push(tokio::spawn(async move {
                for j in 0..10u64 {
                    buffer_clone.push_frame(create_test_frame(i * 10 + j)).await;
                }
            }));
        }

        for _ in 0..5 {
            let buffer_clone = Arc::clone(&buffer);
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let _ = buffer_clone.latest_frame().await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(buffer.latest_frame().await.is_some());
        assert_eq!(buffer.stats().frames_pushed, 100);
    }
}
