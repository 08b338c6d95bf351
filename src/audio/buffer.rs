//! Carry buffer for converted frames not yet delivered

use crate::audio::{MAX_RATE, MIN_RATE};
use crate::error::Result;
use tracing::debug;

/// Extra frames reserved on top of a request, covering the largest
/// overshoot one resampling pass can produce
pub const CARRY_MARGIN_FRAMES: usize = 2 * (MAX_RATE / MIN_RATE) as usize;

/// Destination-spec scratch holding converted frames between pulls
///
/// Frames are appended at the back by the conversion chain and taken from
/// the front by the caller; the remainder is moved back to offset 0 after
/// every take. Capacity only grows.
#[derive(Debug, Default)]
pub struct CarryBuffer {
    buf: Vec<u8>,
    frame_bytes: usize,
    frames: usize,
}

impl CarryBuffer {
    /// Create an empty buffer for frames of `frame_bytes` bytes
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            frame_bytes,
            frames: 0,
        }
    }

    /// Drop all frames and free the storage
    pub fn reset(&mut self, frame_bytes: usize) {
        self.buf = Vec::new();
        self.frame_bytes = frame_bytes;
        self.frames = 0;
    }

    /// Frames waiting to be taken
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Frames the storage can hold
    pub fn capacity_frames(&self) -> usize {
        if self.frame_bytes == 0 {
            0
        } else {
            self.buf.len() / self.frame_bytes
        }
    }

    /// Make room for a request of `out_frames` frames
    ///
    /// When the buffer is smaller than the request it is grown to at least
    /// the request plus [`CARRY_MARGIN_FRAMES`], and at least double its
    /// current size.
    pub fn reserve_for_request(&mut self, out_frames: usize) -> Result<()> {
        if self.capacity_frames() < out_frames {
            self.grow_to(out_frames + CARRY_MARGIN_FRAMES)?;
        }
        Ok(())
    }

    fn grow_to(&mut self, frames: usize) -> Result<()> {
        let frames = frames.max(self.capacity_frames() * 2);
        let bytes = frames * self.frame_bytes;
        if bytes > self.buf.len() {
            self.buf.try_reserve_exact(bytes - self.buf.len())?;
            self.buf.resize(bytes, 0);
            debug!("Carry buffer grown to {} frames", frames);
        }
        Ok(())
    }

    /// Writable space for `frames` frames behind the buffered ones
    ///
    /// Grows the storage if an engine burst does not fit in the margin.
    pub fn spare_mut(&mut self, frames: usize) -> Result<&mut [u8]> {
        let end = self.frames + frames;
        if end > self.capacity_frames() {
            self.grow_to(end)?;
        }
        let start = self.frames * self.frame_bytes;
        Ok(&mut self.buf[start..end * self.frame_bytes])
    }

    /// Mark `frames` frames written through [`CarryBuffer::spare_mut`] as buffered
    pub fn commit(&mut self, frames: usize) {
        self.frames += frames;
        debug_assert!(self.frames * self.frame_bytes <= self.buf.len());
    }

    /// Move the first `frames` frames into `dst` and shift the rest to the front
    ///
    /// Returns the number of frames moved, which is less than `frames` only
    /// when fewer are buffered.
    pub fn take_front(&mut self, frames: usize, dst: &mut [u8]) -> usize {
        let frames = frames.min(self.frames);
        let bytes = frames * self.frame_bytes;
        dst[..bytes].copy_from_slice(&self.buf[..bytes]);

        let remaining = (self.frames - frames) * self.frame_bytes;
        if remaining > 0 {
            self.buf.copy_within(bytes..bytes + remaining, 0);
        }
        self.frames -= frames;
        frames
    }
}
