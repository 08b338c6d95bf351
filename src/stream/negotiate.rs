//! Client/hardware spec negotiation

use crate::audio::{SampleFormat, SampleSpec, SpecItem};
use tracing::{debug, warn};

/// Spec a client asks for; unset attributes accept the hardware value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecRequest {
    pub rate: Option<u32>,
    pub format: Option<SampleFormat>,
    pub channels: Option<u32>,
}

impl SpecRequest {
    /// Request every attribute of `spec`
    pub fn exact(spec: &SampleSpec) -> Self {
        Self {
            rate: Some(spec.rate()),
            format: Some(spec.format()),
            channels: Some(spec.channels()),
        }
    }

    fn requested(&self, item: SpecItem) -> Option<u32> {
        match item {
            SpecItem::ChannelCount => self.channels,
            SpecItem::Format => self.format.map(|f| f.bits()),
            SpecItem::Rate => self.rate,
        }
    }
}

/// Outcome of [`negotiate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// Spec the stream runs at (always the hardware spec)
    pub spec: SampleSpec,
    /// Requested attributes that the hardware could not honour
    pub mismatched: Vec<SpecItem>,
}

impl Negotiation {
    /// Whether every requested attribute was honoured
    pub fn is_exact(&self) -> bool {
        self.mismatched.is_empty()
    }
}

/// Settle a client request against the hardware spec
///
/// Unset attributes take the hardware value silently. Set attributes that
/// differ are reported and replaced with the hardware value.
pub fn negotiate(request: &SpecRequest, hardware: &SampleSpec) -> Negotiation {
    let mut mismatched = Vec::new();

    for item in SpecItem::ORDERED {
        let actual = match item {
            SpecItem::ChannelCount => hardware.channels(),
            SpecItem::Format => hardware.format().bits(),
            SpecItem::Rate => hardware.rate(),
        };
        match request.requested(item) {
            Some(wanted) if wanted != actual => {
                warn!("Requested {} {} not available, using {}", item, wanted, actual);
                mismatched.push(item);
            }
            Some(_) => {}
            None => debug!("No {} requested, using {}", item, actual),
        }
    }

    Negotiation {
        spec: *hardware,
        mismatched,
    }
}
