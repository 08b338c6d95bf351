//! Channel count conversion

use super::{check_single_item, SampleConverter};
use crate::audio::sample::{read_sample, write_sample};
use crate::audio::{SampleFormat, SampleSpec, SpecItem};
use crate::error::{ConvError, Result};
use tracing::debug;

/// Changes the number of interleaved channels
///
/// - N -> 1 averages all channels
/// - 1 -> N duplicates the mono channel
/// - M -> N copies the shared channels and fills the rest with silence
#[derive(Debug, Default)]
pub struct Remapper {
    format: Option<SampleFormat>,
    src_channels: usize,
    dst_channels: usize,
}

impl Remapper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleConverter for Remapper {
    fn item(&self) -> SpecItem {
        SpecItem::ChannelCount
    }

    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        check_single_item(SpecItem::ChannelCount, src, dst)?;
        debug!("Remapper: {}ch -> {}ch", src.channels(), dst.channels());
        self.format = Some(src.format());
        self.src_channels = src.channels() as usize;
        self.dst_channels = dst.channels() as usize;
        Ok(())
    }

    fn max_output_frames(&self, in_frames: usize) -> usize {
        in_frames
    }

    fn convert(&mut self, input: &[u8], frames: usize, output: &mut [u8]) -> Result<usize> {
        let format = self
            .format
            .ok_or(ConvError::InvalidState("remapper not configured"))?;
        let (src_ch, dst_ch) = (self.src_channels, self.dst_channels);

        for frame in 0..frames {
            let src_base = frame * src_ch;
            let dst_base = frame * dst_ch;

            if dst_ch == 1 {
                let sum: i32 = (0..src_ch)
                    .map(|c| read_sample(format, input, src_base + c))
                    .sum();
                write_sample(format, output, dst_base, sum / src_ch as i32);
            } else if src_ch == 1 {
                let value = read_sample(format, input, src_base);
                for c in 0..dst_ch {
                    write_sample(format, output, dst_base + c, value);
                }
            } else {
                for c in 0..dst_ch {
                    let value = if c < src_ch {
                        read_sample(format, input, src_base + c)
                    } else {
                        0
                    };
                    write_sample(format, output, dst_base + c, value);
                }
            }
        }

        Ok(frames)
    }
}
