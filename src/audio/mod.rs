//! PCM sample spec conversion
//!
//! A [`ConversionChain`] turns frames of one [`SampleSpec`] into another by
//! running up to three single-attribute converters in the order chosen by
//! the [`ConversionPlan`].

mod buffer;
mod chain;
pub mod convert;
pub mod engine;
mod planner;
pub mod provider;
pub mod sample;
mod spec;

pub use buffer::{CarryBuffer, CARRY_MARGIN_FRAMES};
pub use chain::ConversionChain;
pub use convert::{Converter, ConverterKind, Reformatter, Remapper, Resampler, SampleConverter};
pub use engine::{EngineKind, FftEngine, LinearEngine, ResampleContext, ResampleEngine};
pub use planner::{ConversionPlan, PlanStep};
pub use provider::{BufferGuard, ChannelProvider, FrameBufferProvider, MemoryProvider};
pub use spec::{SampleFormat, SampleSpec, SpecItem, MAX_CHANNELS, MAX_RATE, MIN_RATE};
