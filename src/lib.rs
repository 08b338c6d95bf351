//! pcmconv - PCM sample spec conversion
//!
//! Converts interleaved PCM frames between sample rates, sample formats
//! and channel counts, either pushed a block at a time or pulled from a
//! frame provider in exact-size blocks.

pub mod audio;
pub mod config;
pub mod error;
pub mod stream;

pub use audio::{ConversionChain, SampleFormat, SampleSpec};
pub use error::{ConvError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
