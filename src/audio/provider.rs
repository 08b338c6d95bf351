//! Pull-based frame sources feeding the conversion chain

use crate::audio::SampleSpec;
use crate::error::Result;
use crossbeam_channel::Receiver;
use tracing::trace;

/// Source of raw frames at the chain's source spec
///
/// Every successful [`acquire`](FrameBufferProvider::acquire) must be matched
/// by exactly one [`release`](FrameBufferProvider::release). Use
/// [`BufferGuard`] rather than calling the pair by hand.
pub trait FrameBufferProvider {
    /// Make up to `frames` frames available, returning how many are
    ///
    /// May block until data is available. Returning 0 means the source is
    /// exhausted.
    fn acquire(&mut self, frames: usize) -> Result<usize>;

    /// Bytes of the currently acquired frames
    fn acquired(&self) -> &[u8];

    /// Hand the acquired frames back
    fn release(&mut self);
}

/// Scoped acquisition: the buffer is released when the guard drops
pub struct BufferGuard<'a, P: FrameBufferProvider + ?Sized> {
    provider: &'a mut P,
    frames: usize,
}

impl<'a, P: FrameBufferProvider + ?Sized> BufferGuard<'a, P> {
    /// Acquire up to `frames` frames from `provider`
    pub fn acquire(provider: &'a mut P, frames: usize) -> Result<Self> {
        let frames = provider.acquire(frames)?;
        Ok(Self { provider, frames })
    }

    /// Frames actually acquired
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn bytes(&self) -> &[u8] {
        self.provider.acquired()
    }
}

impl<P: FrameBufferProvider + ?Sized> Drop for BufferGuard<'_, P> {
    fn drop(&mut self) {
        self.provider.release();
    }
}

/// Serves frames from an owned byte vector
///
/// `max_chunk` caps how many frames one acquisition returns, emulating a
/// producer that hands out smaller blocks than asked for.
#[derive(Debug)]
pub struct MemoryProvider {
    data: Vec<u8>,
    frame_bytes: usize,
    position: usize,
    current: usize,
    max_chunk: Option<usize>,
    acquisitions: usize,
    releases: usize,
    frames_served: usize,
}

impl MemoryProvider {
    /// Serve `data`, which holds frames of `spec`
    pub fn new(spec: &SampleSpec, data: Vec<u8>) -> Self {
        Self {
            data,
            frame_bytes: spec.bytes_per_frame(),
            position: 0,
            current: 0,
            max_chunk: None,
            acquisitions: 0,
            releases: 0,
            frames_served: 0,
        }
    }

    /// Limit each acquisition to at most `frames` frames
    pub fn with_max_chunk(mut self, frames: usize) -> Self {
        self.max_chunk = Some(frames.max(1));
        self
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    pub fn frames_served(&self) -> usize {
        self.frames_served
    }

    /// Frames not yet served
    pub fn remaining_frames(&self) -> usize {
        (self.data.len() - self.position) / self.frame_bytes
    }
}

impl FrameBufferProvider for MemoryProvider {
    fn acquire(&mut self, frames: usize) -> Result<usize> {
        let mut frames = frames.min(self.remaining_frames());
        if let Some(max) = self.max_chunk {
            frames = frames.min(max);
        }
        self.current = frames;
        self.acquisitions += 1;
        self.frames_served += frames;
        Ok(frames)
    }

    fn acquired(&self) -> &[u8] {
        &self.data[self.position..self.position + self.current * self.frame_bytes]
    }

    fn release(&mut self) {
        self.position += self.current * self.frame_bytes;
        self.current = 0;
        self.releases += 1;
    }
}

/// Blocking source fed with byte chunks from another thread
///
/// Chunks may be any size; partial frames are held until completed.
/// `acquire` blocks until enough frames arrived or the sending side hung up.
pub struct ChannelProvider {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    frame_bytes: usize,
    current: usize,
    closed: bool,
}

impl ChannelProvider {
    pub fn new(spec: &SampleSpec, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            frame_bytes: spec.bytes_per_frame(),
            current: 0,
            closed: false,
        }
    }

    fn buffered_frames(&self) -> usize {
        self.pending.len() / self.frame_bytes
    }
}

impl FrameBufferProvider for ChannelProvider {
    fn acquire(&mut self, frames: usize) -> Result<usize> {
        while !self.closed && self.buffered_frames() < frames {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending.try_reserve(chunk.len())?;
                    self.pending.extend_from_slice(&chunk);
                }
                Err(_) => {
                    trace!("Frame channel closed with {} frames left", self.buffered_frames());
                    self.closed = true;
                }
            }
        }
        self.current = frames.min(self.buffered_frames());
        Ok(self.current)
    }

    fn acquired(&self) -> &[u8] {
        &self.pending[..self.current * self.frame_bytes]
    }

    fn release(&mut self) {
        self.pending.drain(..self.current * self.frame_bytes);
        self.current = 0;
    }
}

/// Provider that always fails, for exercising error paths
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingProvider {
    pub message: String,
}

#[cfg(test)]
impl FrameBufferProvider for FailingProvider {
    fn acquire(&mut self, _frames: usize) -> Result<usize> {
        Err(crate::error::ConvError::upstream(self.message.clone()))
    }

    fn acquired(&self) -> &[u8] {
        &[]
    }

    fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleFormat;
    use crate::error::ConvError;
    use crossbeam_channel::bounded;

    fn mono16() -> SampleSpec {
        SampleSpec::new(8_000, SampleFormat::S16, 1).unwrap()
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let mut provider = MemoryProvider::new(&mono16(), vec![1, 0, 2, 0, 3, 0]);
        {
            let guard = BufferGuard::acquire(&mut provider, 2).unwrap();
            assert_eq!(guard.frames(), 2);
            assert_eq!(guard.bytes(), &[1, 0, 2, 0]);
        }
        assert_eq!(provider.acquisitions(), 1);
        assert_eq!(provider.releases(), 1);
        assert_eq!(provider.remaining_frames(), 1);
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn consume(provider: &mut MemoryProvider) -> Result<()> {
            let _guard = BufferGuard::acquire(provider, 1)?;
            Err(ConvError::unsupported("conversion failed"))
        }

        let mut provider = MemoryProvider::new(&mono16(), vec![0; 4]);
        assert!(consume(&mut provider).is_err());
        assert_eq!(provider.releases(), 1);
    }

    #[test]
    fn test_memory_provider_chunking() {
        let mut provider = MemoryProvider::new(&mono16(), vec![0; 20]).with_max_chunk(3);
        assert_eq!(provider.acquire(8).unwrap(), 3);
        provider.release();
        assert_eq!(provider.frames_served(), 3);
        assert_eq!(provider.remaining_frames(), 7);
    }

    #[test]
    fn test_channel_provider_joins_partial_chunks() {
        let (tx, rx) = bounded(4);
        let mut provider = ChannelProvider::new(&mono16(), rx);

        tx.send(vec![1, 0, 2]).unwrap();
        tx.send(vec![0, 3, 0]).unwrap();
        drop(tx);

        assert_eq!(provider.acquire(2).unwrap(), 2);
        assert_eq!(provider.acquired(), &[1, 0, 2, 0]);
        provider.release();

        // Sender gone: what is left is handed out, then nothing
        assert_eq!(provider.acquire(5).unwrap(), 1);
        provider.release();
        assert_eq!(provider.acquire(5).unwrap(), 0);
        provider.release();
    }

    #[test]
    fn test_failing_provider_reports_upstream() {
        let mut provider = FailingProvider {
            message: "xrun".into(),
        };
        assert!(matches!(
            BufferGuard::acquire(&mut provider, 1),
            Err(ConvError::UpstreamFailure(_))
        ));
    }
}
