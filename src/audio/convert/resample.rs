//! Sample rate conversion

use super::{check_single_item, SampleConverter};
use crate::audio::engine::{ResampleContext, ResampleEngine};
use crate::audio::sample::{decode_to_f32, encode_from_f32};
use crate::audio::{SampleSpec, SpecItem};
use crate::error::{ConvError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Working-set size the float scratch buffers start at (frames)
pub const DEFAULT_SCRATCH_FRAMES: usize = 512;

/// Changes the frame rate through a [`ResampleEngine`]
///
/// Integer samples are widened to `f32`, run through the engine context and
/// clamped back into the integer range. The context is rebuilt only when
/// the rate pair or channel count changes.
pub struct Resampler {
    engine: Arc<dyn ResampleEngine>,
    context: Option<Box<dyn ResampleContext>>,
    specs: Option<(SampleSpec, SampleSpec)>,
    base_frames: usize,
    /// Frames the float scratch buffers can hold
    max_frames: usize,
    float_in: Vec<f32>,
    float_out: Vec<f32>,
}

impl Resampler {
    pub fn new(engine: Arc<dyn ResampleEngine>, base_frames: usize) -> Self {
        Self {
            engine,
            context: None,
            specs: None,
            base_frames: base_frames.max(1),
            max_frames: 0,
            float_in: Vec::new(),
            float_out: Vec::new(),
        }
    }

    /// Current scratch working-set size in frames
    pub fn scratch_frames(&self) -> usize {
        self.max_frames
    }

    fn teardown(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.reset();
        }
    }

    /// Start at the baseline, then double
    fn grow_scratch(&mut self, channels: usize) -> Result<()> {
        self.max_frames = if self.max_frames == 0 {
            self.base_frames
        } else {
            self.max_frames * 2
        };

        let samples = (self.max_frames + 1) * channels;
        for buf in [&mut self.float_in, &mut self.float_out] {
            if buf.len() < samples {
                buf.try_reserve_exact(samples - buf.len()).map_err(|e| {
                    ConvError::OutOfMemory(format!("resampler scratch: {}", e))
                })?;
                buf.resize(samples, 0.0);
            }
        }
        debug!("Resampler scratch grown to {} frames", self.max_frames);
        Ok(())
    }
}

impl SampleConverter for Resampler {
    fn item(&self) -> SpecItem {
        SpecItem::Rate
    }

    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        check_single_item(SpecItem::Rate, src, dst)?;

        if let (Some((old_src, old_dst)), Some(_)) = (self.specs, self.context.as_ref()) {
            if old_src.rate() == src.rate()
                && old_dst.rate() == dst.rate()
                && old_src.channels() == src.channels()
            {
                // Same context; only the sample format may have changed
                self.specs = Some((*src, *dst));
                return Ok(());
            }
        }

        debug!(
            "Resampler ({}): {}Hz -> {}Hz, {}ch",
            self.engine.name(),
            src.rate(),
            dst.rate(),
            src.channels()
        );

        self.teardown();
        self.specs = None;

        if !self.engine.supports_conversion(src.rate(), dst.rate()) {
            warn!(
                "{} engine does not support {}Hz -> {}Hz",
                self.engine.name(),
                src.rate(),
                dst.rate()
            );
            return Err(ConvError::unsupported(format!(
                "resampling {}Hz -> {}Hz",
                src.rate(),
                dst.rate()
            )));
        }

        let context = self
            .engine
            .create(src.channels() as usize, src.rate(), dst.rate())?;
        self.context = Some(context);
        self.specs = Some((*src, *dst));

        // Channel count may have changed, so the scratch must be re-sized
        self.max_frames = 0;
        self.grow_scratch(src.channels() as usize)
    }

    fn max_output_frames(&self, in_frames: usize) -> usize {
        self.context
            .as_ref()
            .map_or(0, |ctx| ctx.max_output_frames(in_frames))
    }

    fn convert(&mut self, input: &[u8], frames: usize, output: &mut [u8]) -> Result<usize> {
        let (src, dst) = self
            .specs
            .ok_or(ConvError::InvalidState("resampler not configured"))?;
        let channels = src.channels() as usize;

        let needed = frames.max(self.max_output_frames(frames));
        while needed > self.max_frames {
            self.grow_scratch(channels)?;
        }

        let context = self
            .context
            .as_mut()
            .ok_or(ConvError::InvalidState("resampler has no context"))?;

        let in_samples = frames * channels;
        decode_to_f32(src.format(), input, &mut self.float_in[..in_samples]);

        let produced = context.process(&self.float_in[..in_samples], frames, &mut self.float_out)?;

        let out_samples = produced * channels;
        encode_from_f32(dst.format(), &self.float_out[..out_samples], output);

        Ok(produced)
    }

    fn max_flush_frames(&self) -> usize {
        self.context.as_ref().map_or(0, |ctx| ctx.max_flush_frames())
    }

    fn flush(&mut self, output: &mut [u8]) -> Result<usize> {
        let (src, dst) = self
            .specs
            .ok_or(ConvError::InvalidState("resampler not configured"))?;
        let channels = src.channels() as usize;

        let needed = self.max_flush_frames();
        while needed > self.max_frames {
            self.grow_scratch(channels)?;
        }

        let context = self
            .context
            .as_mut()
            .ok_or(ConvError::InvalidState("resampler has no context"))?;
        let produced = context.flush(&mut self.float_out)?;

        let out_samples = produced * channels;
        encode_from_f32(dst.format(), &self.float_out[..out_samples], output);
        debug!("Resampler flushed {} frames", produced);
        Ok(produced)
    }
}

impl Drop for Resampler {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::mock::CountingEngine;
    use crate::audio::SampleFormat;

    fn spec(rate: u32) -> SampleSpec {
        SampleSpec::new(rate, SampleFormat::S16, 1).unwrap()
    }

    #[test]
    fn test_reconfigure_same_pair_keeps_context() {
        let engine = Arc::new(CountingEngine::default());
        let mut resampler = Resampler::new(engine.clone(), 64);

        resampler.configure(&spec(8_000), &spec(16_000)).unwrap();
        resampler.configure(&spec(8_000), &spec(16_000)).unwrap();
        assert_eq!(engine.created(), 1);

        resampler.configure(&spec(8_000), &spec(44_100)).unwrap();
        assert_eq!(engine.created(), 2);
    }

    #[test]
    fn test_unsupported_pair_is_rejected() {
        let engine = Arc::new(CountingEngine::rejecting(&[(44_100, 11_025)]));
        let mut resampler = Resampler::new(engine.clone(), 64);

        let err = resampler.configure(&spec(44_100), &spec(11_025)).unwrap_err();
        assert!(matches!(err, ConvError::UnsupportedConversion(_)));
        assert_eq!(engine.created(), 0);
        assert_eq!(resampler.max_output_frames(10), 0);
    }

    #[test]
    fn test_scratch_doubles_on_demand() {
        let engine = Arc::new(CountingEngine::default());
        let mut resampler = Resampler::new(engine, 64);
        resampler.configure(&spec(8_000), &spec(16_000)).unwrap();
        assert_eq!(resampler.scratch_frames(), 64);

        let frames = 100;
        let input = vec![0u8; frames * 2];
        let mut out = vec![0u8; resampler.max_output_frames(frames) * 2];
        resampler.convert(&input, frames, &mut out).unwrap();
        // Needs ~203 output frames: 64 -> 128 -> 256
        assert_eq!(resampler.scratch_frames(), 256);
    }

    #[test]
    fn test_output_is_clamped_to_s16() {
        let engine = Arc::new(CountingEngine::default());
        let mut resampler = Resampler::new(engine, 64);
        resampler.configure(&spec(8_000), &spec(16_000)).unwrap();

        let input: Vec<u8> = [i16::MAX, i16::MAX, i16::MIN, i16::MIN]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut out = vec![0u8; resampler.max_output_frames(4) * 2];
        let produced = resampler.convert(&input, 4, &mut out).unwrap();

        let samples: Vec<i16> = out[..produced * 2]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples.first(), Some(&i16::MAX));
        assert!(samples.contains(&i16::MIN));
    }

    #[test]
    fn test_works_on_u8_data() {
        let src = SampleSpec::new(8_000, SampleFormat::U8, 1).unwrap();
        let dst = SampleSpec::new(16_000, SampleFormat::U8, 1).unwrap();
        let mut resampler = Resampler::new(Arc::new(CountingEngine::default()), 16);
        resampler.configure(&src, &dst).unwrap();

        let mut out = vec![0u8; resampler.max_output_frames(3)];
        let produced = resampler.convert(&[128, 138, 148], 3, &mut out).unwrap();
        assert_eq!(&out[..produced], &[128, 133, 138, 143]);
    }

    #[test]
    fn test_flush_emits_held_frames() {
        let src = SampleSpec::new(8_000, SampleFormat::U8, 1).unwrap();
        let dst = SampleSpec::new(16_000, SampleFormat::U8, 1).unwrap();
        let mut resampler = Resampler::new(Arc::new(CountingEngine::default()), 16);
        resampler.configure(&src, &dst).unwrap();

        let mut out = vec![0u8; resampler.max_output_frames(3)];
        resampler.convert(&[128, 138, 148], 3, &mut out).unwrap();

        let mut tail = vec![0u8; resampler.max_flush_frames()];
        assert_eq!(resampler.flush(&mut tail).unwrap(), 2);
        assert_eq!(tail, vec![148, 148]);
        assert_eq!(resampler.max_flush_frames(), 0);
    }
}
