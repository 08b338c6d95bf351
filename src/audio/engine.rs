//! Resampling engines
//!
//! The resampler converter drives an engine through two traits:
//! [`ResampleEngine`] answers which rate pairs it handles and creates
//! contexts, [`ResampleContext`] holds the per-stream DSP state. Dropping a
//! context destroys it.
//!
//! Both engines take interleaved `f32` frames at integer sample scale.

use crate::audio::{MAX_RATE, MIN_RATE};
use crate::error::{ConvError, Result};
use rubato::{FftFixedIn, Resampler as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Factory for resampling contexts
pub trait ResampleEngine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether a context can be created for this rate pair
    fn supports_conversion(&self, src_rate: u32, dst_rate: u32) -> bool;

    /// Create a context converting `channels` interleaved channels
    fn create(&self, channels: usize, src_rate: u32, dst_rate: u32)
        -> Result<Box<dyn ResampleContext>>;
}

/// Stateful resampling context
pub trait ResampleContext: Send {
    /// Upper bound on frames the next `process` call can produce from `in_frames`
    fn max_output_frames(&self, in_frames: usize) -> usize;

    /// Resample `in_frames` interleaved frames from `input` into `output`
    ///
    /// Returns the number of frames written. `output` must hold at least
    /// `max_output_frames(in_frames)` frames.
    fn process(&mut self, input: &[f32], in_frames: usize, output: &mut [f32]) -> Result<usize>;

    /// Upper bound on frames the next `flush` call can produce
    fn max_flush_frames(&self) -> usize;

    /// Emit the frames still held back at the end of a stream
    ///
    /// Brings the total output to the length the input maps to at the
    /// destination rate, then resets the context.
    fn flush(&mut self, output: &mut [f32]) -> Result<usize>;

    /// Drop any buffered history
    fn reset(&mut self);
}

/// Available engine implementations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Streaming linear interpolation
    #[default]
    Linear,
    /// FFT-based synchronous resampler (rubato)
    Fft,
}

impl EngineKind {
    /// Build the engine with its tuning parameters
    pub fn build(self, fft_chunk_frames: usize, fft_sub_chunks: usize) -> Arc<dyn ResampleEngine> {
        match self {
            EngineKind::Linear => Arc::new(LinearEngine),
            EngineKind::Fft => Arc::new(FftEngine::new(fft_chunk_frames, fft_sub_chunks)),
        }
    }
}

fn rate_in_range(rate: u32) -> bool {
    (MIN_RATE..=MAX_RATE).contains(&rate)
}

/// Linear interpolation engine
///
/// Cheap and fully deterministic: the read position is tracked as an exact
/// fraction, so output does not depend on how the input is chunked.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearEngine;

impl ResampleEngine for LinearEngine {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn supports_conversion(&self, src_rate: u32, dst_rate: u32) -> bool {
        rate_in_range(src_rate) && rate_in_range(dst_rate)
    }

    fn create(
        &self,
        channels: usize,
        src_rate: u32,
        dst_rate: u32,
    ) -> Result<Box<dyn ResampleContext>> {
        Ok(Box::new(LinearContext::new(channels, src_rate, dst_rate)?))
    }
}

struct LinearContext {
    channels: usize,
    src_rate: u64,
    dst_rate: u64,
    /// Position of the next output frame in units of 1/dst_rate input frames,
    /// relative to `prev`
    phase: u64,
    /// Last input frame of the previous call
    prev: Vec<f32>,
    primed: bool,
}

impl LinearContext {
    fn new(channels: usize, src_rate: u32, dst_rate: u32) -> Result<Self> {
        let mut prev = Vec::new();
        prev.try_reserve_exact(channels)?;
        prev.resize(channels, 0.0);
        Ok(Self {
            channels,
            src_rate: src_rate as u64,
            dst_rate: dst_rate as u64,
            phase: 0,
            prev,
            primed: false,
        })
    }
}

impl ResampleContext for LinearContext {
    fn max_output_frames(&self, in_frames: usize) -> usize {
        let scaled = (in_frames as u64 + 1) * self.dst_rate;
        scaled.div_ceil(self.src_rate) as usize + 1
    }

    fn process(&mut self, input: &[f32], in_frames: usize, output: &mut [f32]) -> Result<usize> {
        let ch = self.channels;
        if in_frames == 0 {
            return Ok(0);
        }

        let mut body = &input[..in_frames * ch];
        if !self.primed {
            self.prev.copy_from_slice(&body[..ch]);
            body = &body[ch..];
            self.primed = true;
        }

        // Extended stream: index 0 is `prev`, index i is body frame i - 1
        let last = (body.len() / ch) as u64;
        let frame = |i: u64, c: usize| -> f32 {
            if i == 0 {
                self.prev[c]
            } else {
                body[(i as usize - 1) * ch + c]
            }
        };

        let mut produced = 0usize;
        let mut phase = self.phase;
        while phase / self.dst_rate + 1 <= last {
            let i = phase / self.dst_rate;
            let frac = (phase % self.dst_rate) as f32 / self.dst_rate as f32;
            let out = &mut output[produced * ch..(produced + 1) * ch];
            for (c, slot) in out.iter_mut().enumerate() {
                let a = frame(i, c);
                let b = frame(i + 1, c);
                *slot = a + (b - a) * frac;
            }
            produced += 1;
            phase += self.src_rate;
        }

        self.phase = phase - last * self.dst_rate;
        if last > 0 {
            let start = body.len() - ch;
            self.prev.copy_from_slice(&body[start..]);
        }
        Ok(produced)
    }

    fn max_flush_frames(&self) -> usize {
        if !self.primed || self.phase >= self.dst_rate {
            return 0;
        }
        (self.dst_rate - self.phase).div_ceil(self.src_rate) as usize
    }

    fn flush(&mut self, output: &mut [f32]) -> Result<usize> {
        let ch = self.channels;
        let frames = self.max_flush_frames();
        // Positions past the last frame hold its value
        for out in output[..frames * ch].chunks_exact_mut(ch) {
            out.copy_from_slice(&self.prev);
        }
        self.reset();
        Ok(frames)
    }

    fn reset(&mut self) {
        self.phase = 0;
        self.primed = false;
        self.prev.iter_mut().for_each(|s| *s = 0.0);
    }
}

/// Engine backed by rubato's synchronous FFT resampler
///
/// rubato wants fixed-size input chunks, so each context accumulates
/// incoming frames and only runs whole chunks. Output therefore arrives in
/// bursts and lags the input by up to one chunk.
#[derive(Debug, Clone, Copy)]
pub struct FftEngine {
    chunk_frames: usize,
    sub_chunks: usize,
}

impl FftEngine {
    pub fn new(chunk_frames: usize, sub_chunks: usize) -> Self {
        Self {
            chunk_frames: chunk_frames.max(1),
            sub_chunks: sub_chunks.max(1),
        }
    }
}

impl ResampleEngine for FftEngine {
    fn name(&self) -> &'static str {
        "fft"
    }

    fn supports_conversion(&self, src_rate: u32, dst_rate: u32) -> bool {
        rate_in_range(src_rate) && rate_in_range(dst_rate)
    }

    fn create(
        &self,
        channels: usize,
        src_rate: u32,
        dst_rate: u32,
    ) -> Result<Box<dyn ResampleContext>> {
        let resampler = FftFixedIn::<f32>::new(
            src_rate as usize,
            dst_rate as usize,
            self.chunk_frames,
            self.sub_chunks,
            channels,
        )
        .map_err(|e| ConvError::unsupported(format!("rubato: {}", e)))?;

        debug!(
            "FFT resampler {}Hz -> {}Hz, {} frames per chunk",
            src_rate,
            dst_rate,
            resampler.input_frames_next()
        );

        Ok(Box::new(FftContext {
            resampler,
            channels,
            src_rate: src_rate as u64,
            dst_rate: dst_rate as u64,
            pending: vec![Vec::new(); channels],
            frames_in: 0,
            frames_out: 0,
        }))
    }
}

struct FftContext {
    resampler: FftFixedIn<f32>,
    channels: usize,
    src_rate: u64,
    dst_rate: u64,
    /// De-interleaved input not yet forming a whole chunk
    pending: Vec<Vec<f32>>,
    /// Totals since the last reset, for sizing the final flush
    frames_in: u64,
    frames_out: u64,
}

impl FftContext {
    /// Resample the first whole chunk of `pending` into `output` at frame
    /// `offset`, keeping at most `limit` frames
    fn run_chunk(&mut self, output: &mut [f32], offset: usize, limit: usize) -> Result<usize> {
        let ch = self.channels;
        let need = self.resampler.input_frames_next();

        let chunk: Vec<&[f32]> = self.pending.iter().map(|lane| &lane[..need]).collect();
        let resampled = self
            .resampler
            .process(&chunk, None)
            .map_err(|e| ConvError::unsupported(format!("rubato: {}", e)))?;
        drop(chunk);

        let frames = resampled.first().map_or(0, Vec::len).min(limit);
        for (c, lane) in resampled.iter().enumerate() {
            for (f, &sample) in lane[..frames].iter().enumerate() {
                output[(offset + f) * ch + c] = sample;
            }
        }

        for lane in self.pending.iter_mut() {
            lane.drain(..need);
        }
        self.frames_out += frames as u64;
        Ok(frames)
    }
}

impl ResampleContext for FftContext {
    fn max_output_frames(&self, in_frames: usize) -> usize {
        let buffered = self.pending.first().map_or(0, Vec::len) + in_frames;
        let chunks = buffered / self.resampler.input_frames_next().max(1);
        chunks * self.resampler.output_frames_max()
    }

    fn process(&mut self, input: &[f32], in_frames: usize, output: &mut [f32]) -> Result<usize> {
        let ch = self.channels;
        for (c, lane) in self.pending.iter_mut().enumerate() {
            lane.try_reserve(in_frames)?;
            lane.extend(input[..in_frames * ch].iter().skip(c).step_by(ch));
        }
        self.frames_in += in_frames as u64;

        let mut produced = 0usize;
        while self.pending[0].len() >= self.resampler.input_frames_next() {
            produced += self.run_chunk(output, produced, usize::MAX)?;
        }
        Ok(produced)
    }

    fn max_flush_frames(&self) -> usize {
        let expected = (self.frames_in * self.dst_rate).div_ceil(self.src_rate);
        expected.saturating_sub(self.frames_out) as usize
    }

    fn flush(&mut self, output: &mut [f32]) -> Result<usize> {
        let target = self.max_flush_frames();
        let mut produced = 0usize;

        // Zero-pad the partial chunk, then keep feeding silence until the
        // resampler delay has been drained
        while produced < target {
            let need = self.resampler.input_frames_next();
            for lane in self.pending.iter_mut() {
                lane.try_reserve(need.saturating_sub(lane.len()))?;
                lane.resize(need.max(lane.len()), 0.0);
            }
            let frames = self.run_chunk(output, produced, target - produced)?;
            if frames == 0 {
                break;
            }
            produced += frames;
        }

        self.reset();
        Ok(produced)
    }

    fn reset(&mut self) {
        self.resampler.reset();
        self.pending.iter_mut().for_each(Vec::clear);
        self.frames_in = 0;
        self.frames_out = 0;
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Linear engine that counts contexts and refuses chosen rate pairs
    #[derive(Default)]
    pub struct CountingEngine {
        pub created: AtomicUsize,
        pub rejected: Vec<(u32, u32)>,
    }

    impl CountingEngine {
        pub fn rejecting(pairs: &[(u32, u32)]) -> Self {
            Self {
                created: AtomicUsize::new(0),
                rejected: pairs.to_vec(),
            }
        }

        pub fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    impl ResampleEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn supports_conversion(&self, src_rate: u32, dst_rate: u32) -> bool {
            !self.rejected.contains(&(src_rate, dst_rate))
        }

        fn create(
            &self,
            channels: usize,
            src_rate: u32,
            dst_rate: u32,
        ) -> Result<Box<dyn ResampleContext>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            LinearEngine.create(channels, src_rate, dst_rate)
        }
    }

    /// Engine whose contexts fail every `process` and `flush` call
    pub struct BrokenEngine;

    struct BrokenContext;

    impl ResampleEngine for BrokenEngine {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn supports_conversion(&self, _src_rate: u32, _dst_rate: u32) -> bool {
            true
        }

        fn create(
            &self,
            _channels: usize,
            _src_rate: u32,
            _dst_rate: u32,
        ) -> Result<Box<dyn ResampleContext>> {
            Ok(Box::new(BrokenContext))
        }
    }

    impl ResampleContext for BrokenContext {
        fn max_output_frames(&self, in_frames: usize) -> usize {
            in_frames * 2 + 2
        }

        fn process(&mut self, _input: &[f32], _in_frames: usize, _output: &mut [f32]) -> Result<usize> {
            Err(ConvError::upstream("engine failure"))
        }

        fn max_flush_frames(&self) -> usize {
            0
        }

        fn flush(&mut self, _output: &mut [f32]) -> Result<usize> {
            Err(ConvError::upstream("engine failure"))
        }

        fn reset(&mut self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ctx: &mut dyn ResampleContext, input: &[f32], channels: usize) -> Vec<f32> {
        let frames = input.len() / channels;
        let mut out = vec![0.0; ctx.max_output_frames(frames) * channels];
        let n = ctx.process(input, frames, &mut out).unwrap();
        out.truncate(n * channels);
        out
    }

    #[test]
    fn test_linear_equal_rates_is_delayed_identity() {
        let mut ctx = LinearEngine.create(1, 8_000, 8_000).unwrap();
        let out = run(ctx.as_mut(), &[1.0, 2.0, 3.0, 4.0], 1);
        // The last frame waits for its successor
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
        let out = run(ctx.as_mut(), &[5.0], 1);
        assert_eq!(out, vec![4.0]);
    }

    #[test]
    fn test_linear_upsample_interpolates() {
        let mut ctx = LinearEngine.create(1, 8_000, 16_000).unwrap();
        let out = run(ctx.as_mut(), &[0.0, 10.0, 20.0], 1);
        assert_eq!(out, vec![0.0, 5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_linear_stereo_keeps_channels_apart() {
        let mut ctx = LinearEngine.create(2, 16_000, 8_000).unwrap();
        let out = run(ctx.as_mut(), &[0.0, 100.0, 1.0, 101.0, 2.0, 102.0, 3.0, 103.0], 2);
        assert_eq!(out, vec![0.0, 100.0, 2.0, 102.0]);
    }

    #[test]
    fn test_linear_output_independent_of_chunking() {
        let input: Vec<f32> = (0..500).map(|i| ((i * 37) % 101) as f32).collect();

        let mut whole = LinearEngine.create(1, 8_000, 44_100).unwrap();
        let expected = run(whole.as_mut(), &input, 1);

        let mut chunked = LinearEngine.create(1, 8_000, 44_100).unwrap();
        let mut got = Vec::new();
        for piece in input.chunks(13) {
            got.extend(run(chunked.as_mut(), piece, 1));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_linear_output_bound_holds() {
        let mut ctx = LinearEngine.create(1, 8_000, 92_000).unwrap();
        for n in [1usize, 2, 7, 64, 333] {
            let input = vec![0.0; n];
            let bound = ctx.max_output_frames(n);
            let mut out = vec![0.0; bound];
            let produced = ctx.process(&input, n, &mut out).unwrap();
            assert!(produced <= bound);
        }
    }

    #[test]
    fn test_linear_reset_forgets_history() {
        let mut ctx = LinearEngine.create(1, 8_000, 8_000).unwrap();
        run(ctx.as_mut(), &[7.0, 7.0], 1);
        ctx.reset();
        let out = run(ctx.as_mut(), &[1.0, 2.0], 1);
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn test_fft_accumulates_until_a_chunk_is_full() {
        let engine = FftEngine::new(256, 1);
        let mut ctx = engine.create(1, 8_000, 16_000).unwrap();

        let short = vec![0.0; 100];
        assert_eq!(run(ctx.as_mut(), &short, 1).len(), 0);

        let rest = vec![0.0; 156];
        let bound = ctx.max_output_frames(156);
        let out = run(ctx.as_mut(), &rest, 1);
        assert!(!out.is_empty());
        assert!(out.len() <= bound);
    }

    fn drain(ctx: &mut dyn ResampleContext, channels: usize) -> Vec<f32> {
        let mut out = vec![0.0; ctx.max_flush_frames() * channels];
        let n = ctx.flush(&mut out).unwrap();
        out.truncate(n * channels);
        out
    }

    #[test]
    fn test_linear_flush_holds_last_frame() {
        let mut ctx = LinearEngine.create(1, 8_000, 16_000).unwrap();
        assert_eq!(run(ctx.as_mut(), &[0.0, 10.0, 20.0], 1), vec![0.0, 5.0, 10.0, 15.0]);
        assert_eq!(ctx.max_flush_frames(), 2);
        assert_eq!(drain(ctx.as_mut(), 1), vec![20.0, 20.0]);

        // Flushing resets the context
        assert_eq!(ctx.max_flush_frames(), 0);
        assert_eq!(run(ctx.as_mut(), &[7.0], 1), Vec::<f32>::new());
    }

    #[test]
    fn test_linear_flush_of_fresh_context_is_empty() {
        let mut ctx = LinearEngine.create(2, 48_000, 44_100).unwrap();
        assert!(drain(ctx.as_mut(), 2).is_empty());
    }

    #[test]
    fn test_fft_flush_emits_the_buffered_tail() {
        let engine = FftEngine::new(256, 2);
        let mut ctx = engine.create(1, 8_000, 16_000).unwrap();

        let input = vec![0.25; 100];
        assert!(run(ctx.as_mut(), &input, 1).is_empty());
        assert_eq!(ctx.max_flush_frames(), 200);

        let tail = drain(ctx.as_mut(), 1);
        assert_eq!(tail.len(), 200);
        assert_eq!(ctx.max_flush_frames(), 0);
    }

    #[test]
    fn test_engine_kind_builds_named_engines() {
        assert_eq!(EngineKind::Linear.build(256, 2).name(), "linear");
        assert_eq!(EngineKind::Fft.build(256, 2).name(), "fft");
        assert!(!LinearEngine.supports_conversion(4_000, 8_000));
    }
}
