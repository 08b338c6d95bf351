//! Sample spec: rate, sample format and channel count

use crate::error::{ConvError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Lowest sample rate a stream may run at (Hz)
pub const MIN_RATE: u32 = 8_000;

/// Highest sample rate a stream may run at (Hz)
pub const MAX_RATE: u32 = 92_000;

/// Highest channel count the remapper handles
pub const MAX_CHANNELS: u32 = 8;

/// PCM sample encoding
///
/// Variants are ordered by sample width so the planner can tell a
/// narrowing conversion from a widening one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 128
    U8,
    /// Signed 16-bit little-endian
    S16,
}

impl SampleFormat {
    /// Bytes used by one sample
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
        }
    }

    /// Significant bits per sample
    pub fn bits(self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }

    /// Smallest centred sample value
    pub fn min_value(self) -> i32 {
        match self {
            SampleFormat::U8 => i8::MIN as i32,
            SampleFormat::S16 => i16::MIN as i32,
        }
    }

    /// Largest centred sample value
    pub fn max_value(self) -> i32 {
        match self {
            SampleFormat::U8 => i8::MAX as i32,
            SampleFormat::S16 => i16::MAX as i32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = ConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "u8" | "8" => Ok(SampleFormat::U8),
            "s16" | "s16le" | "16" => Ok(SampleFormat::S16),
            other => Err(ConvError::unsupported(format!("unknown sample format '{}'", other))),
        }
    }
}

/// One convertible attribute of a [`SampleSpec`]
///
/// The declaration order is the fixed planning priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecItem {
    ChannelCount,
    Format,
    Rate,
}

impl SpecItem {
    /// All items in planning priority order
    pub const ORDERED: [SpecItem; 3] = [SpecItem::ChannelCount, SpecItem::Format, SpecItem::Rate];

    /// Slot of this item in per-item arrays
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SpecItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecItem::ChannelCount => "channels",
            SpecItem::Format => "format",
            SpecItem::Rate => "rate",
        };
        f.write_str(name)
    }
}

/// Shape of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleSpec {
    rate: u32,
    format: SampleFormat,
    channels: u32,
}

impl SampleSpec {
    /// Create a validated sample spec
    ///
    /// Rates outside `[MIN_RATE, MAX_RATE]` and channel counts outside
    /// `1..=MAX_CHANNELS` are rejected.
    pub fn new(rate: u32, format: SampleFormat, channels: u32) -> Result<Self> {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(ConvError::unsupported(format!(
                "sample rate {}Hz outside [{}, {}]",
                rate, MIN_RATE, MAX_RATE
            )));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(ConvError::unsupported(format!(
                "channel count {} outside [1, {}]",
                channels, MAX_CHANNELS
            )));
        }
        Ok(Self {
            rate,
            format,
            channels,
        })
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Copy of `self` with `item` taken from `other`
    pub fn with_item_from(&self, item: SpecItem, other: &SampleSpec) -> Self {
        let mut spec = *self;
        match item {
            SpecItem::ChannelCount => spec.channels = other.channels,
            SpecItem::Format => spec.format = other.format,
            SpecItem::Rate => spec.rate = other.rate,
        }
        spec
    }

    /// Compare a single attribute against `other`
    pub fn compare_item(&self, other: &SampleSpec, item: SpecItem) -> Ordering {
        match item {
            SpecItem::ChannelCount => self.channels.cmp(&other.channels),
            SpecItem::Format => self.format.cmp(&other.format),
            SpecItem::Rate => self.rate.cmp(&other.rate),
        }
    }

    /// Whether `self` and `other` disagree on `item`
    pub fn differs_in(&self, other: &SampleSpec, item: SpecItem) -> bool {
        self.compare_item(other, item) != Ordering::Equal
    }

    /// Items on which `self` and `other` disagree, in priority order
    pub fn differing_items(&self, other: &SampleSpec) -> Vec<SpecItem> {
        SpecItem::ORDERED
            .into_iter()
            .filter(|&item| self.differs_in(other, item))
            .collect()
    }

    /// Bytes used by one sample
    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample()
    }

    /// Bytes used by one frame (one sample per channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bytes_per_sample()
    }

    /// Calculate bytes for given number of frames
    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame()
    }

    /// Calculate number of frames for given bytes, rounding down
    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_frame()
    }

    /// Frames at `dst`'s rate covering the same time as `frames` at ours
    ///
    /// Rounded up so a caller sizing a pull never asks for too little.
    pub fn convert_frames_to(&self, frames: usize, dst: &SampleSpec) -> usize {
        let scaled = frames as u64 * dst.rate as u64;
        scaled.div_ceil(self.rate as u64) as usize
    }
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz {}ch {}", self.rate, self.channels, self.format)
    }
}

impl FromStr for SampleSpec {
    type Err = ConvError;

    /// Parse `RATE/FORMAT/CHANNELS`, e.g. `44100/s16/2`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [rate, format, channels] = parts.as_slice() else {
            return Err(ConvError::unsupported(format!(
                "expected RATE/FORMAT/CHANNELS, got '{}'",
                s
            )));
        };
        let rate = rate
            .parse::<u32>()
            .map_err(|_| ConvError::unsupported(format!("bad sample rate '{}'", rate)))?;
        let channels = channels
            .parse::<u32>()
            .map_err(|_| ConvError::unsupported(format!("bad channel count '{}'", channels)))?;
        SampleSpec::new(rate, format.parse()?, channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(rate: u32, format: SampleFormat, channels: u32) -> SampleSpec {
        SampleSpec::new(rate, format, channels).unwrap()
    }

    #[test]
    fn test_frame_byte_conversions() {
        let stereo16 = spec(44_100, SampleFormat::S16, 2);
        assert_eq!(stereo16.bytes_per_frame(), 4);
        assert_eq!(stereo16.frames_to_bytes(100), 400);
        assert_eq!(stereo16.bytes_to_frames(400), 100);
        // Partial frames round down
        assert_eq!(stereo16.bytes_to_frames(403), 100);

        let mono8 = spec(8_000, SampleFormat::U8, 1);
        assert_eq!(mono8.bytes_per_frame(), 1);
        assert_eq!(mono8.frames_to_bytes(37), 37);
    }

    #[test]
    fn test_rate_range_is_enforced() {
        assert!(SampleSpec::new(MIN_RATE, SampleFormat::S16, 1).is_ok());
        assert!(SampleSpec::new(MAX_RATE, SampleFormat::S16, 1).is_ok());
        assert!(matches!(
            SampleSpec::new(7_999, SampleFormat::S16, 1),
            Err(ConvError::UnsupportedConversion(_))
        ));
        assert!(matches!(
            SampleSpec::new(96_000, SampleFormat::S16, 1),
            Err(ConvError::UnsupportedConversion(_))
        ));
        assert!(SampleSpec::new(48_000, SampleFormat::S16, 0).is_err());
    }

    #[test]
    fn test_convert_frames_rounds_up() {
        let src = spec(8_000, SampleFormat::S16, 1);
        let dst = spec(44_100, SampleFormat::S16, 1);
        // 100 * 8000 / 44100 = 18.14
        assert_eq!(dst.convert_frames_to(100, &src), 19);
        assert_eq!(src.convert_frames_to(80, &dst), 441);
        assert_eq!(src.convert_frames_to(0, &dst), 0);
    }

    #[test]
    fn test_item_comparison() {
        let a = spec(44_100, SampleFormat::S16, 2);
        let b = spec(8_000, SampleFormat::U8, 2);
        assert_eq!(a.compare_item(&b, SpecItem::Rate), Ordering::Greater);
        assert_eq!(a.compare_item(&b, SpecItem::Format), Ordering::Greater);
        assert!(!a.differs_in(&b, SpecItem::ChannelCount));
        assert_eq!(a.differing_items(&b), vec![SpecItem::Format, SpecItem::Rate]);

        let c = a.with_item_from(SpecItem::Rate, &b);
        assert_eq!(c.rate(), 8_000);
        assert_eq!(c.format(), SampleFormat::S16);
    }

    #[test]
    fn test_parse_and_display() {
        let s: SampleSpec = "44100/s16/2".parse().unwrap();
        assert_eq!(s, spec(44_100, SampleFormat::S16, 2));
        assert_eq!(s.to_string(), "44100Hz 2ch s16");
        assert!("44100/s24/2".parse::<SampleSpec>().is_err());
        assert!("44100-s16-2".parse::<SampleSpec>().is_err());
    }
}
