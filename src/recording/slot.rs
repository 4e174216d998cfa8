//! Per-key capture unit
//!
//! A capture slot sits on a junction branch and sees every live frame,
//! but only stores frames while its capturing flag is set. That lets the
//! slot be attached ahead of time and start accumulating on an explicit
//! signal. On release, the buffer is moved out with [`CaptureSlot::take_buffer`].

use super::buffer::FrameBuffer;
use crate::error::{Error, Result};
use crate::junction::{BranchHandle, FrameSink, SharedSink, StreamJunction};
use crate::types::Frame;

use parking_lot::Mutex;
use std::sync::Arc;

/// Recording unit for one key
#[derive(Debug)]
pub struct CaptureSlot {
    key_number: u32,
    capacity: usize,
    buffer: Option<FrameBuffer>,
    capturing: bool,
    branch: Option<BranchHandle>,
    frames_seen: u64,
}

impl CaptureSlot {
    /// Create an idle slot with an empty buffer of `capacity` frames
    pub fn new(key_number: u32, capacity: usize) -> Result<Self> {
        let buffer = FrameBuffer::new(capacity)?;
        tracing::debug!(
            "Created capture slot for key {} (max {} frames)",
            key_number,
            capacity
        );
        Ok(Self {
            key_number,
            capacity,
            buffer: Some(buffer),
            capturing: false,
            branch: None,
            frames_seen: 0,
        })
    }

    /// Attach `slot` to the junction as a new branch and remember the handle
    pub fn attach(slot: &Arc<Mutex<Self>>, junction: &StreamJunction) -> Result<BranchHandle> {
        let key = slot.lock().key_number;
        let sink: SharedSink = slot.clone();
        let handle = junction.attach_branch(format!("capture-{}", key), sink)?;
        slot.lock().branch = Some(handle);
        Ok(handle)
    }

    pub fn key_number(&self) -> u32 {
        self.key_number
    }

    pub fn start_capturing(&mut self) {
        if self.capturing {
            tracing::debug!("Capture slot for key {} is already capturing", self.key_number);
            return;
        }
        self.capturing = true;
        tracing::debug!("Started capturing for key {}", self.key_number);
    }

    pub fn stop_capturing(&mut self) {
        if !self.capturing {
            tracing::debug!("Capture slot for key {} is not capturing", self.key_number);
            return;
        }
        self.capturing = false;
        tracing::debug!(
            "Stopped capturing for key {} (captured {} frames)",
            self.key_number,
            self.frame_count()
        );
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Frame hook invoked for every frame on this slot's branch
    pub fn on_frame_arrived(&mut self, frame: &Frame) {
        self.frames_seen += 1;
        if !self.capturing {
            return;
        }
        match self.buffer.as_mut() {
            Some(buffer) => buffer.write_frame(frame.clone()),
            None => tracing::debug!(
                "Key {}: frame arrived after buffer was taken, discarding",
                self.key_number
            ),
        }
    }

    /// Move the recorded buffer out of the slot.
    ///
    /// The slot keeps no reference afterwards; a second call fails with
    /// [`Error::NoBuffer`] until the slot is reset.
    pub fn take_buffer(&mut self) -> Result<FrameBuffer> {
        let buffer = self.buffer.take().ok_or(Error::NoBuffer)?;
        tracing::debug!(
            "Key {}: buffer with {} frames handed off",
            self.key_number,
            buffer.frame_count()
        );
        Ok(buffer)
    }

    /// Replace the buffer with an empty one of the same capacity.
    /// The capturing flag is left as it is.
    pub fn reset(&mut self) -> Result<()> {
        self.buffer = Some(FrameBuffer::new(self.capacity)?);
        tracing::debug!("Reset capture slot for key {}", self.key_number);
        Ok(())
    }

    pub fn buffer(&self) -> Option<&FrameBuffer> {
        self.buffer.as_ref()
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Frames currently held (0 once the buffer was taken)
    pub fn frame_count(&self) -> usize {
        self.buffer.as_ref().map(FrameBuffer::frame_count).unwrap_or(0)
    }

    /// Frames that reached this slot, captured or not
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn branch(&self) -> Option<BranchHandle> {
        self.branch
    }

    /// Release the buffer (if still owned) and leave the junction. Idempotent.
    pub fn cleanup(&mut self, junction: &StreamJunction) {
        self.capturing = false;
        if let Some(handle) = self.branch.take() {
            if let Err(e) = junction.detach_branch(handle) {
                tracing::debug!("Key {}: {} already gone: {}", self.key_number, handle, e);
            }
        }
        if let Some(mut buffer) = self.buffer.take() {
            buffer.cleanup();
        }
    }
}

impl FrameSink for CaptureSlot {
    fn on_frame(&mut self, frame: &Frame) {
        self.on_frame_arrived(frame);
    }
}

/// Builds capture slots for the coordinator
pub trait CaptureSlotFactory {
    /// Create a fresh, idle slot for `key_number`
    fn create(&self, key_number: u32) -> Result<CaptureSlot>;
}

/// Default factory: every slot gets a buffer of the same capacity
#[derive(Debug, Clone, Copy)]
pub struct BufferedSlotFactory {
    capacity: usize,
}

impl BufferedSlotFactory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl CaptureSlotFactory for BufferedSlotFactory {
    fn create(&self, key_number: u32) -> Result<CaptureSlot> {
        CaptureSlot::new(key_number, self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameFormat;

    fn frame(n: u64) -> Frame {
        Frame::new(2, 2, FrameFormat::Bgra).with_sequence(n)
    }

    #[test]
    fn test_idle_slot_discards_frames() {
        let mut slot = CaptureSlot::new(1, 4).unwrap();
        slot.on_frame_arrived(&frame(0));
        assert_eq!(slot.frame_count(), 0);
        assert_eq!(slot.frames_seen(), 1);

        slot.start_capturing();
        slot.on_frame_arrived(&frame(1));
        slot.stop_capturing();
        slot.on_frame_arrived(&frame(2));
        assert_eq!(slot.frame_count(), 1);
        assert_eq!(slot.buffer().unwrap().read_frame(0).unwrap().sequence, 1);
    }

    #[test]
    fn test_start_stop_idempotent() {
        let mut slot = CaptureSlot::new(2, 4).unwrap();
        slot.start_capturing();
        slot.start_capturing();
        assert!(slot.is_capturing());
        slot.stop_capturing();
        slot.stop_capturing();
        assert!(!slot.is_capturing());
    }

    #[test]
    fn test_take_buffer_twice_fails() {
        let mut slot = CaptureSlot::new(3, 4).unwrap();
        slot.start_capturing();
        slot.on_frame_arrived(&frame(0));
        let buffer = slot.take_buffer().unwrap();
        assert_eq!(buffer.frame_count(), 1);
        assert!(matches!(slot.take_buffer(), Err(Error::NoBuffer)));
        assert!(!slot.has_buffer());
    }

    #[test]
    fn test_frames_after_take_are_discarded() {
        let mut slot = CaptureSlot::new(3, 4).unwrap();
        slot.start_capturing();
        let _buffer = slot.take_buffer().unwrap();
        slot.on_frame_arrived(&frame(5));
        assert_eq!(slot.frame_count(), 0);
    }

    #[test]
    fn test_reset_keeps_capturing_flag() {
        let mut slot = CaptureSlot::new(4, 4).unwrap();
        slot.start_capturing();
        slot.on_frame_arrived(&frame(0));
        slot.reset().unwrap();
        assert!(slot.is_capturing());
        assert_eq!(slot.frame_count(), 0);
        assert_eq!(slot.buffer().unwrap().capacity(), 4);
    }

    #[test]
    fn test_zero_capacity_factory_fails() {
        let factory = BufferedSlotFactory::new(0);
        assert!(matches!(factory.create(1), Err(Error::InvalidCapacity)));
    }

    #[test]
    fn test_cleanup_detaches_branch() {
        struct Nothing;
        impl FrameSink for Nothing {
            fn on_frame(&mut self, _frame: &Frame) {}
        }

        let junction = StreamJunction::new(Arc::new(Mutex::new(Nothing)), 4);
        let slot = Arc::new(Mutex::new(CaptureSlot::new(5, 4).unwrap()));
        let handle = CaptureSlot::attach(&slot, &junction).unwrap();
        assert!(junction.is_attached(handle));

        slot.lock().cleanup(&junction);
        slot.lock().cleanup(&junction);
        assert!(!junction.is_attached(handle));
        assert!(!slot.lock().has_buffer());
    }
}
