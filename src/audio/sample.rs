//! Per-sample decode/encode helpers
//!
//! Samples are handled as *centred* `i32` values: unsigned 8-bit data is
//! shifted so silence is 0, signed 16-bit data is used as-is.

use crate::audio::SampleFormat;

/// Read sample `index` of `data` as a centred value
#[inline]
pub fn read_sample(format: SampleFormat, data: &[u8], index: usize) -> i32 {
    match format {
        SampleFormat::U8 => data[index] as i32 - 128,
        SampleFormat::S16 => {
            let at = index * 2;
            i16::from_le_bytes([data[at], data[at + 1]]) as i32
        }
    }
}

/// Write a centred value into sample `index` of `data`, clamping to range
#[inline]
pub fn write_sample(format: SampleFormat, data: &mut [u8], index: usize, value: i32) {
    let value = value.clamp(format.min_value(), format.max_value());
    match format {
        SampleFormat::U8 => data[index] = (value + 128) as u8,
        SampleFormat::S16 => {
            let at = index * 2;
            data[at..at + 2].copy_from_slice(&(value as i16).to_le_bytes());
        }
    }
}

/// Round a float sample to the nearest centred value of `format`
///
/// Values beyond the representable range are clamped, never wrapped.
#[inline]
pub fn float_to_sample(format: SampleFormat, value: f32) -> i32 {
    let min = format.min_value() as f32;
    let max = format.max_value() as f32;
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(min, max) as i32
}

/// Clamp a float sample to the signed 16-bit range
#[inline]
pub fn clamp_to_i16(value: f32) -> i16 {
    float_to_sample(SampleFormat::S16, value) as i16
}

/// Decode `samples` interleaved samples into floats at integer scale
pub fn decode_to_f32(format: SampleFormat, data: &[u8], out: &mut [f32]) {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = read_sample(format, data, i) as f32;
    }
}

/// Encode floats back into `format`, clamping each sample
pub fn encode_from_f32(format: SampleFormat, samples: &[f32], out: &mut [u8]) {
    for (i, &value) in samples.iter().enumerate() {
        write_sample(format, out, i, float_to_sample(format, value));
    }
}
