//! Playback path: client frames pushed through the chain into a sink

use crate::audio::{ConversionChain, SampleSpec};
use crate::error::{ConvError, Result};
use parking_lot::Mutex;
use std::io::Write;
use tracing::{debug, trace};

/// Destination of converted frames
pub trait FrameSink: Send {
    /// Frames arriving from now on are of `spec`
    fn set_spec(&mut self, spec: &SampleSpec);

    /// Write `frames` frames from `data`, returning how many were accepted
    fn write_frames(&mut self, data: &[u8], frames: usize) -> Result<usize>;
}

/// Sink writing raw frames to any [`Write`]
pub struct WriterSink<W: Write + Send> {
    writer: W,
    frame_bytes: usize,
    frames_written: u64,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, spec: &SampleSpec) -> Self {
        Self {
            writer,
            frame_bytes: spec.bytes_per_frame(),
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FrameSink for WriterSink<W> {
    fn set_spec(&mut self, spec: &SampleSpec) {
        self.frame_bytes = spec.bytes_per_frame();
    }

    fn write_frames(&mut self, data: &[u8], frames: usize) -> Result<usize> {
        let bytes = frames * self.frame_bytes;
        self.writer
            .write_all(&data[..bytes])
            .map_err(|e| ConvError::upstream(format!("sink write failed: {}", e)))?;
        self.frames_written += frames as u64;
        Ok(frames)
    }
}

struct OutputInner<S> {
    chain: ConversionChain,
    sink: S,
    /// Spec the sink currently takes, `None` while unrouted
    hardware: Option<SampleSpec>,
}

/// Output stream converting client frames to the routed hardware spec
///
/// Writes and route changes may come from different threads; both go
/// through one lock.
pub struct OutputStream<S: FrameSink> {
    client: SampleSpec,
    inner: Mutex<OutputInner<S>>,
}

impl<S: FrameSink> OutputStream<S> {
    /// Open a stream routed to `hardware`
    pub fn new(
        client: SampleSpec,
        hardware: SampleSpec,
        mut chain: ConversionChain,
        mut sink: S,
    ) -> Result<Self> {
        chain.configure(&client, &hardware)?;
        sink.set_spec(&hardware);
        debug!("Output stream {} -> {} ({})", client, hardware, chain.plan());
        Ok(Self {
            client,
            inner: Mutex::new(OutputInner {
                chain,
                sink,
                hardware: Some(hardware),
            }),
        })
    }

    pub fn client_spec(&self) -> SampleSpec {
        self.client
    }

    /// Spec of the current route
    pub fn hardware_spec(&self) -> Option<SampleSpec> {
        self.inner.lock().hardware
    }

    /// Convert and write `bytes` of client frames
    ///
    /// Returns the client bytes accounted for: the frames the sink accepted,
    /// mapped back to the client rate (rounded up). Trailing partial frames
    /// are ignored. Without a route the data is dropped and reported as
    /// written.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(hardware) = inner.hardware else {
            trace!("No route, dropping {} bytes", bytes.len());
            return Ok(bytes.len());
        };

        let frames = self.client.bytes_to_frames(bytes.len());
        let (data, out_frames) = inner.chain.convert(bytes, frames)?;
        let written = inner.sink.write_frames(data, out_frames)?;

        let accounted = hardware.convert_frames_to(written, &self.client);
        trace!(
            "Wrote {} client frames as {} hardware frames",
            frames,
            written
        );
        Ok(self.client.frames_to_bytes(accounted))
    }

    /// Switch to a new hardware spec
    ///
    /// On failure the stream stays unusable until a successful reroute.
    pub fn reroute(&self, hardware: SampleSpec) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.hardware = None;
        inner.chain.configure(&self.client, &hardware)?;
        inner.sink.set_spec(&hardware);
        debug!("Output rerouted to {} ({})", hardware, inner.chain.plan());
        inner.hardware = Some(hardware);
        Ok(())
    }

    /// Write out the frames still held inside the resampler
    ///
    /// Call once after the last `write` of a stream. Returns the client
    /// bytes accounted for, like `write`.
    pub fn flush(&self) -> Result<usize> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(hardware) = inner.hardware else {
            return Ok(0);
        };

        let (data, out_frames) = inner.chain.flush()?;
        if out_frames == 0 {
            return Ok(0);
        }
        let written = inner.sink.write_frames(data, out_frames)?;
        debug!("Flushed {} hardware frames", written);
        Ok(self
            .client
            .frames_to_bytes(hardware.convert_frames_to(written, &self.client)))
    }

    /// Detach from the hardware; writes are dropped until the next reroute
    pub fn unroute(&self) {
        self.inner.lock().hardware = None;
        debug!("Output unrouted");
    }

    /// Run `f` with the sink
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.lock().sink)
    }

    pub fn into_sink(self) -> S {
        self.inner.into_inner().sink
    }
}
