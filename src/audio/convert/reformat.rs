//! Sample format conversion

use super::{check_single_item, SampleConverter};
use crate::audio::sample::{read_sample, write_sample};
use crate::audio::{SampleFormat, SampleSpec, SpecItem};
use crate::error::{ConvError, Result};
use tracing::debug;

/// Widens or narrows samples between 8 and 16 bits
///
/// Widening shifts the centred value up by the bit-width difference,
/// narrowing shifts it down (arithmetic shift, so negative values round
/// towards minus infinity).
#[derive(Debug, Default)]
pub struct Reformatter {
    formats: Option<(SampleFormat, SampleFormat)>,
    channels: usize,
}

impl Reformatter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleConverter for Reformatter {
    fn item(&self) -> SpecItem {
        SpecItem::Format
    }

    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        check_single_item(SpecItem::Format, src, dst)?;
        debug!("Reformatter: {} -> {}", src.format(), dst.format());
        self.formats = Some((src.format(), dst.format()));
        self.channels = src.channels() as usize;
        Ok(())
    }

    fn max_output_frames(&self, in_frames: usize) -> usize {
        in_frames
    }

    fn convert(&mut self, input: &[u8], frames: usize, output: &mut [u8]) -> Result<usize> {
        let (from, to) = self
            .formats
            .ok_or(ConvError::InvalidState("reformatter not configured"))?;

        let samples = frames * self.channels;
        if from == to {
            let bytes = samples * from.bytes_per_sample();
            output[..bytes].copy_from_slice(&input[..bytes]);
            return Ok(frames);
        }

        for i in 0..samples {
            let value = read_sample(from, input, i);
            let value = if to.bits() > from.bits() {
                value << (to.bits() - from.bits())
            } else {
                value >> (from.bits() - to.bits())
            };
            write_sample(to, output, i, value);
        }

        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reformat(from: SampleFormat, to: SampleFormat, input: &[u8]) -> Vec<u8> {
        let src = SampleSpec::new(8_000, from, 1).unwrap();
        let dst = SampleSpec::new(8_000, to, 1).unwrap();
        let mut reformatter = Reformatter::new();
        reformatter.configure(&src, &dst).unwrap();
        let frames = src.bytes_to_frames(input.len());
        let mut out = vec![0u8; dst.frames_to_bytes(frames)];
        reformatter.convert(input, frames, &mut out).unwrap();
        out
    }

    #[test]
    fn test_widen_u8_to_s16() {
        let out = reformat(SampleFormat::U8, SampleFormat::S16, &[0, 128, 255]);
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![i16::MIN, 0, 127 << 8]);
    }

    #[test]
    fn test_narrow_s16_to_u8() {
        let input: Vec<u8> = [i16::MIN, -1, 0, 255, 256, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let out = reformat(SampleFormat::S16, SampleFormat::U8, &input);
        assert_eq!(out, vec![0, 127, 128, 128, 129, 255]);
    }

    #[test]
    fn test_widen_then_narrow_is_lossless() {
        let input: Vec<u8> = (0..=255).collect();
        let wide = reformat(SampleFormat::U8, SampleFormat::S16, &input);
        let back = reformat(SampleFormat::S16, SampleFormat::U8, &wide);
        assert_eq!(back, input);
    }
}
