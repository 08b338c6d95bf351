//! Capture path: hardware frames pulled through the chain for the client

use crate::audio::{ConversionChain, FrameBufferProvider, SampleSpec};
use crate::error::Result;
use tracing::{debug, trace};

/// Input stream delivering client-spec frames from a hardware-spec provider
pub struct InputStream<P: FrameBufferProvider> {
    client: SampleSpec,
    hardware: SampleSpec,
    chain: ConversionChain,
    provider: P,
}

impl<P: FrameBufferProvider> InputStream<P> {
    /// Open a stream reading `hardware` frames from `provider`
    pub fn new(
        hardware: SampleSpec,
        client: SampleSpec,
        mut chain: ConversionChain,
        provider: P,
    ) -> Result<Self> {
        chain.configure(&hardware, &client)?;
        debug!("Input stream {} -> {} ({})", hardware, client, chain.plan());
        Ok(Self {
            client,
            hardware,
            chain,
            provider,
        })
    }

    pub fn client_spec(&self) -> SampleSpec {
        self.client
    }

    pub fn hardware_spec(&self) -> SampleSpec {
        self.hardware
    }

    /// Fill `buf` with whole client frames, returning the bytes written
    ///
    /// Always delivers exactly `buf.len() / frame_size` frames or fails.
    /// A failure that leaves the carry state unusable reconfigures the chain,
    /// dropping the frames it carried.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frames = self.client.bytes_to_frames(buf.len());
        if frames == 0 {
            return Ok(0);
        }
        if let Err(e) = self.chain.pull_converted(buf, frames, &mut self.provider) {
            if e.requires_reconfigure() {
                debug!(
                    "Read failed ({}), reconfiguring and dropping {} carried frames",
                    e,
                    self.chain.carried_frames()
                );
                self.chain.configure(&self.hardware, &self.client)?;
            }
            return Err(e);
        }
        trace!("Read {} frames, {} carried", frames, self.chain.carried_frames());
        Ok(self.client.frames_to_bytes(frames))
    }

    /// Reconfigure for a provider now delivering `hardware` frames
    ///
    /// Carried frames from the old route are dropped.
    pub fn reroute(&mut self, hardware: SampleSpec, provider: P) -> Result<()> {
        self.chain.configure(&hardware, &self.client)?;
        self.hardware = hardware;
        self.provider = provider;
        debug!("Input rerouted to {} ({})", hardware, self.chain.plan());
        Ok(())
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }
}
