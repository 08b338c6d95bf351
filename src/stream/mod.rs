//! Stream adapters around the conversion chain

mod input;
mod negotiate;
mod output;

pub use input::InputStream;
pub use negotiate::{negotiate, Negotiation, SpecRequest};
pub use output::{FrameSink, OutputStream, WriterSink};

use crate::audio::SampleSpec;

/// Buffer size in bytes for `frames` frames of `spec`, rounded down to a
/// power of two
pub fn buffer_size(spec: &SampleSpec, frames: usize) -> usize {
    let bytes = spec.frames_to_bytes(frames);
    if bytes == 0 {
        0
    } else {
        1 << bytes.ilog2()
    }
}
