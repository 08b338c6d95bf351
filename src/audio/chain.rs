//! Conversion chain - owns the converters and drives per-call conversion

use crate::audio::buffer::CarryBuffer;
use crate::audio::convert::{Converter, DEFAULT_SCRATCH_FRAMES};
use crate::audio::engine::{LinearEngine, ResampleEngine};
use crate::audio::planner::ConversionPlan;
use crate::audio::provider::{BufferGuard, FrameBufferProvider};
use crate::audio::{SampleSpec, SpecItem};
use crate::error::{ConvError, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Converts frames from one sample spec to another
///
/// Holds one converter per attribute; `configure` selects the subset and
/// order a spec pair needs. Used from a single audio thread; callers
/// serialize access.
pub struct ConversionChain {
    stages: [Converter; 3],
    /// Active converters in plan order
    active: Vec<SpecItem>,
    plan: ConversionPlan,
    specs: Option<(SampleSpec, SampleSpec)>,
    carry: CarryBuffer,
}

impl ConversionChain {
    /// Create a chain resampling with `engine`
    pub fn new(engine: Arc<dyn ResampleEngine>) -> Self {
        Self::with_scratch_frames(engine, DEFAULT_SCRATCH_FRAMES)
    }

    /// Create a chain whose resampler scratch starts at `scratch_frames`
    pub fn with_scratch_frames(engine: Arc<dyn ResampleEngine>, scratch_frames: usize) -> Self {
        Self {
            stages: Converter::full_set(engine, scratch_frames),
            active: Vec::with_capacity(SpecItem::ORDERED.len()),
            plan: ConversionPlan::default(),
            specs: None,
            carry: CarryBuffer::default(),
        }
    }

    /// Set up the converters needed to turn `src` into `dst`
    ///
    /// Any previous chain and carried frames are dropped first. On failure
    /// the chain is left with no active converters.
    pub fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.active.clear();
        self.plan = ConversionPlan::default();
        self.carry.reset(dst.bytes_per_frame());
        self.specs = Some((*src, *dst));

        if src == dst {
            debug!("No conversion required for {}", src);
            return Ok(());
        }

        debug!("Configuring conversion {} -> {}", src, dst);

        let plan = ConversionPlan::new(src, dst);
        for step in plan.steps() {
            if let Err(e) = self.stages[step.item.index()].configure(&step.src, &step.dst) {
                warn!("Failed to configure {} converter: {}", step.item, e);
                self.active.clear();
                return Err(e);
            }
            self.active.push(step.item);
        }

        debug!("Conversion plan: {}", plan);
        self.plan = plan;
        Ok(())
    }

    /// Source spec of the last `configure`
    pub fn src_spec(&self) -> Option<SampleSpec> {
        self.specs.map(|(src, _)| src)
    }

    /// Destination spec of the last `configure`
    pub fn dst_spec(&self) -> Option<SampleSpec> {
        self.specs.map(|(_, dst)| dst)
    }

    pub fn plan(&self) -> &ConversionPlan {
        &self.plan
    }

    /// Converters in use, in execution order
    pub fn active_items(&self) -> &[SpecItem] {
        &self.active
    }

    /// Whether the chain copies frames unchanged
    pub fn is_passthrough(&self) -> bool {
        self.active.is_empty() && matches!(self.specs, Some((src, dst)) if src == dst)
    }

    /// Converted frames held back for the next pull
    pub fn carried_frames(&self) -> usize {
        self.carry.frames()
    }

    /// Upper bound on output frames for `in_frames` input frames
    pub fn max_output_frames(&self, in_frames: usize) -> usize {
        chain_max_output(&self.stages, &self.active, in_frames)
    }

    fn ready(&self) -> Result<(SampleSpec, SampleSpec)> {
        let (src, dst) = self
            .specs
            .ok_or(ConvError::InvalidState("conversion chain not configured"))?;
        if self.active.is_empty() && src != dst {
            return Err(ConvError::InvalidState("conversion chain has no converters"));
        }
        Ok((src, dst))
    }

    /// Convert `frames` frames of `src`
    ///
    /// Returns the converted bytes and frame count. A passthrough chain
    /// returns `src` itself; otherwise the bytes live in the last
    /// converter's buffer until the next call.
    pub fn convert<'a>(&'a mut self, src: &'a [u8], frames: usize) -> Result<(&'a [u8], usize)> {
        let (src_spec, _) = self.ready()?;

        let Some(&last) = self.active.last() else {
            let bytes = src_spec.frames_to_bytes(frames);
            check_len(src, bytes)?;
            return Ok((&src[..bytes], frames));
        };

        let produced = run_stages(&mut self.stages, &self.active, src, frames, None)?;
        Ok((self.stages[last.index()].output(produced), produced))
    }

    /// Convert `frames` frames of `src` into `dst`, returning frames written
    ///
    /// `dst` must hold `max_output_frames(frames)` destination frames.
    pub fn convert_into(&mut self, src: &[u8], frames: usize, dst: &mut [u8]) -> Result<usize> {
        let (src_spec, _) = self.ready()?;

        if self.active.is_empty() {
            let bytes = src_spec.frames_to_bytes(frames);
            check_len(src, bytes)?;
            check_len(dst, bytes)?;
            dst[..bytes].copy_from_slice(&src[..bytes]);
            return Ok(frames);
        }

        run_stages(&mut self.stages, &self.active, src, frames, Some(dst))
    }

    /// Fill `dst` with exactly `out_frames` converted frames pulled from `provider`
    ///
    /// Frames converted beyond the request are carried over to the next call.
    /// On error the carry state is unspecified and the chain should be
    /// reconfigured; `dst` may have been partially written.
    pub fn pull_converted<P>(
        &mut self,
        dst: &mut [u8],
        out_frames: usize,
        provider: &mut P,
    ) -> Result<()>
    where
        P: FrameBufferProvider + ?Sized,
    {
        let (src_spec, dst_spec) = self.ready()?;
        let out_bytes = dst_spec.frames_to_bytes(out_frames);
        check_len(dst, out_bytes)?;

        self.carry.reserve_for_request(out_frames)?;

        let mut requested = out_frames.saturating_sub(self.carry.frames());
        while requested > 0 {
            let wanted = dst_spec.convert_frames_to(requested, &src_spec);
            let buffer = BufferGuard::acquire(provider, wanted)?;
            let frames = buffer.frames();
            if frames == 0 {
                return Err(ConvError::EndOfStream);
            }

            let produced = if self.active.is_empty() {
                let bytes = src_spec.frames_to_bytes(frames);
                self.carry
                    .spare_mut(frames)?
                    .copy_from_slice(&buffer.bytes()[..bytes]);
                frames
            } else {
                let bound = chain_max_output(&self.stages, &self.active, frames);
                let spare = self.carry.spare_mut(bound)?;
                run_stages(&mut self.stages, &self.active, buffer.bytes(), frames, Some(spare))?
            };
            drop(buffer);

            self.carry.commit(produced);
            trace!(
                "Pulled {} frames (wanted {}), produced {}, {} still needed",
                frames,
                wanted,
                produced,
                requested.saturating_sub(produced)
            );
            requested = requested.saturating_sub(produced);
        }

        self.carry.take_front(out_frames, &mut dst[..out_bytes]);
        Ok(())
    }

    /// Convert the frames the resampler still holds at the end of a stream
    ///
    /// Only the resampler holds frames back, so chains without one return
    /// nothing. The bytes live in the last converter's buffer until the next
    /// call, as with [`ConversionChain::convert`].
    pub fn flush(&mut self) -> Result<(&[u8], usize)> {
        self.ready()?;
        let Some(pos) = self.active.iter().position(|&item| item == SpecItem::Rate) else {
            return Ok((&[], 0));
        };

        let rate = SpecItem::Rate.index();
        let frames = self.stages[rate].flush_to_scratch()?;
        let rest = &self.active[pos + 1..];
        let Some(&last) = rest.last() else {
            return Ok((self.stages[rate].output(frames), frames));
        };
        if frames == 0 {
            return Ok((&[], 0));
        }

        let scratch = self.stages[rate].take_scratch();
        let result = run_stages(&mut self.stages, rest, &scratch, frames, None);
        self.stages[rate].restore_scratch(scratch);
        let produced = result?;

        debug!("Flushed {} frames through the chain", produced);
        Ok((self.stages[last.index()].output(produced), produced))
    }
}

impl Default for ConversionChain {
    fn default() -> Self {
        Self::new(Arc::new(LinearEngine))
    }
}

fn check_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(ConvError::BufferTooSmall {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

fn chain_max_output(stages: &[Converter; 3], active: &[SpecItem], in_frames: usize) -> usize {
    active
        .iter()
        .fold(in_frames, |frames, item| stages[item.index()].max_output_frames(frames))
}

/// Push `frames` frames through the active stages
///
/// Intermediate stages write into their own scratch; the last stage writes
/// into `dst` when one is given. A stage's scratch is moved out while the
/// next stage reads it and put back afterwards, on error too.
fn run_stages(
    stages: &mut [Converter; 3],
    active: &[SpecItem],
    input: &[u8],
    frames: usize,
    mut dst: Option<&mut [u8]>,
) -> Result<usize> {
    let mut frames = frames;
    let mut held: Option<(SpecItem, Vec<u8>)> = None;
    let last = active.len().saturating_sub(1);

    for (pos, &item) in active.iter().enumerate() {
        let stage_input: &[u8] = match &held {
            Some((_, buf)) => buf,
            None => input,
        };

        let stage = &mut stages[item.index()];
        let result = match dst.as_deref_mut() {
            Some(out) if pos == last => stage.convert_into(stage_input, frames, out),
            _ => stage.convert_to_scratch(stage_input, frames),
        };

        if let Some((prev, buf)) = held.take() {
            stages[prev.index()].restore_scratch(buf);
        }
        frames = result?;

        if pos != last {
            held = Some((item, stages[item.index()].take_scratch()));
        }
    }

    Ok(frames)
}
