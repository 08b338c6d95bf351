//! Single-attribute converters
//!
//! Each converter changes exactly one [`SpecItem`] of a stream. The set is
//! closed, so they are held in the [`ConverterKind`] sum type and driven
//! through the [`SampleConverter`] capability.

mod remap;
mod reformat;
mod resample;

pub use remap::Remapper;
pub use reformat::Reformatter;
pub use resample::{Resampler, DEFAULT_SCRATCH_FRAMES};

use crate::audio::engine::ResampleEngine;
use crate::audio::{SampleSpec, SpecItem};
use crate::error::{ConvError, Result};
use std::sync::Arc;

/// Configure/convert capability shared by all converters
pub trait SampleConverter {
    /// Attribute this converter changes
    fn item(&self) -> SpecItem;

    /// Prepare for converting `src` into `dst`
    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()>;

    /// Upper bound on output frames for `in_frames` input frames
    fn max_output_frames(&self, in_frames: usize) -> usize;

    /// Convert `frames` frames from `input` into `output`, returning frames written
    ///
    /// `output` must hold `max_output_frames(frames)` destination frames.
    fn convert(&mut self, input: &[u8], frames: usize, output: &mut [u8]) -> Result<usize>;

    /// Frames still held back, emitted by [`SampleConverter::flush`]
    fn max_flush_frames(&self) -> usize {
        0
    }

    /// Write held-back frames into `output` at the end of a stream
    fn flush(&mut self, _output: &mut [u8]) -> Result<usize> {
        Ok(0)
    }
}

/// Check that `src` and `dst` differ in `item` only
pub(crate) fn check_single_item(item: SpecItem, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
    let differing = src.differing_items(dst);
    if differing.iter().any(|&other| other != item) {
        return Err(ConvError::unsupported(format!(
            "{} converter cannot turn {} into {}",
            item, src, dst
        )));
    }
    Ok(())
}

/// The three converter kinds
pub enum ConverterKind {
    Remap(Remapper),
    Reformat(Reformatter),
    Resample(Resampler),
}

impl ConverterKind {
    fn as_converter(&mut self) -> &mut dyn SampleConverter {
        match self {
            ConverterKind::Remap(c) => c,
            ConverterKind::Reformat(c) => c,
            ConverterKind::Resample(c) => c,
        }
    }

    fn as_converter_ref(&self) -> &dyn SampleConverter {
        match self {
            ConverterKind::Remap(c) => c,
            ConverterKind::Reformat(c) => c,
            ConverterKind::Resample(c) => c,
        }
    }
}

/// A converter plus the scratch buffer it writes into when it is not the
/// last stage of a chain
pub struct Converter {
    kind: ConverterKind,
    specs: Option<(SampleSpec, SampleSpec)>,
    scratch: Vec<u8>,
}

impl Converter {
    pub fn new(kind: ConverterKind) -> Self {
        Self {
            kind,
            specs: None,
            scratch: Vec::new(),
        }
    }

    /// One converter per attribute, indexed by [`SpecItem::index`]
    pub fn full_set(engine: Arc<dyn ResampleEngine>, scratch_frames: usize) -> [Converter; 3] {
        [
            Converter::new(ConverterKind::Remap(Remapper::new())),
            Converter::new(ConverterKind::Reformat(Reformatter::new())),
            Converter::new(ConverterKind::Resample(Resampler::new(engine, scratch_frames))),
        ]
    }

    pub fn item(&self) -> SpecItem {
        self.kind.as_converter_ref().item()
    }

    pub fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.specs = None;
        self.kind.as_converter().configure(src, dst)?;
        self.specs = Some((*src, *dst));
        Ok(())
    }

    /// Destination spec after validating `input` holds `frames` source frames
    fn checked_dst(&self, input: &[u8], frames: usize) -> Result<SampleSpec> {
        let (src, dst) = self
            .specs
            .ok_or(ConvError::InvalidState("converter not configured"))?;
        let needed = src.frames_to_bytes(frames);
        if input.len() < needed {
            return Err(ConvError::BufferTooSmall {
                needed,
                available: input.len(),
            });
        }
        Ok(dst)
    }

    pub fn max_output_frames(&self, in_frames: usize) -> usize {
        self.kind.as_converter_ref().max_output_frames(in_frames)
    }

    /// Convert into a caller-supplied buffer
    pub fn convert_into(&mut self, input: &[u8], frames: usize, output: &mut [u8]) -> Result<usize> {
        let dst = self.checked_dst(input, frames)?;
        let needed = dst.frames_to_bytes(self.max_output_frames(frames));
        if output.len() < needed {
            return Err(ConvError::BufferTooSmall {
                needed,
                available: output.len(),
            });
        }
        self.kind.as_converter().convert(input, frames, output)
    }

    /// Convert into the internal scratch buffer, see [`Converter::output`]
    pub fn convert_to_scratch(&mut self, input: &[u8], frames: usize) -> Result<usize> {
        let dst = self.checked_dst(input, frames)?;
        self.grow_scratch(dst.frames_to_bytes(self.max_output_frames(frames)))?;
        self.kind.as_converter().convert(input, frames, &mut self.scratch)
    }

    /// Write held-back frames into the internal scratch buffer
    pub fn flush_to_scratch(&mut self) -> Result<usize> {
        let (_, dst) = self
            .specs
            .ok_or(ConvError::InvalidState("converter not configured"))?;
        let frames = self.kind.as_converter_ref().max_flush_frames();
        self.grow_scratch(dst.frames_to_bytes(frames))?;
        self.kind.as_converter().flush(&mut self.scratch)
    }

    fn grow_scratch(&mut self, needed: usize) -> Result<()> {
        if self.scratch.len() < needed {
            self.scratch.try_reserve(needed - self.scratch.len())?;
            self.scratch.resize(needed, 0);
        }
        Ok(())
    }

    /// Bytes of the last `frames` frames written by [`Converter::convert_to_scratch`]
    pub fn output(&self, frames: usize) -> &[u8] {
        let bytes = self.specs.map_or(0, |(_, dst)| dst.frames_to_bytes(frames));
        &self.scratch[..bytes]
    }

    pub(crate) fn take_scratch(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.scratch)
    }

    pub(crate) fn restore_scratch(&mut self, scratch: Vec<u8>) {
        self.scratch = scratch;
    }
}
