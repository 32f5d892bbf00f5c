use super::AV1Encoder;

use crate::encoder::bitstream::BitstreamCore;
use crate::encoder::frame::{ingest, RawFrame};
use crate::encoder::metadata::metadata_obus;
use crate::encoder::queue::PacketPoll;
use crate::encoder::rate_control::RateControlStats;
use crate::encoder::scheduler::SchedulerState;
use crate::encoder::{EncodedPacket, ResolvedConfig};
use crate::error::{FrameForgeError, Result};
use tracing::{debug, warn};

impl<C: BitstreamCore> AV1Encoder<C> {
    /// Submit one raw frame in display order.
    ///
    /// The planes are copied before returning. A rejected frame leaves the
    /// encoder exactly as it was and does not consume an input number.
    pub fn submit(&mut self, raw: &RawFrame<'_>) -> Result<()> {
        if self.closed || !self.scheduler.accepts_input() {
            return Err(FrameForgeError::EncoderClosed);
        }

        let input_index = self.scheduler.next_input_index();
        let frame = match ingest(raw, &self.config, input_index) {
            Ok(frame) => frame,
            Err(e) => {
                self.frames_rejected += 1;
                warn!("Rejected input frame {}: {}", input_index, e);
                return Err(e);
            }
        };

        self.scheduler.push(frame)?;
        self.frames_submitted += 1;
        Ok(())
    }

    /// Poll for the next packet in output order.
    ///
    /// Compresses at most one scheduled unit. Core failures are reported here
    /// and close the encoder.
    pub fn receive_packet(&mut self) -> Result<PacketPoll> {
        if self.queue.is_empty() && !self.closed {
            self.encode_next_unit()?;
            if self.scheduler.state() == SchedulerState::Closed && self.queue.is_empty() {
                self.queue.mark_end_of_stream();
            }
        }
        Ok(self.queue.dequeue())
    }

    /// Take the next packet if one is available.
    pub fn try_receive_packet(&mut self) -> Result<Option<EncodedPacket>> {
        Ok(self.receive_packet()?.into_packet())
    }

    /// Iterate over every packet available right now.
    pub fn packets(&mut self) -> Packets<'_, C> {
        Packets { encoder: self }
    }

    /// Signal end of input. Buffered frames are finalized and drained by
    /// subsequent receive calls. Calling it again has no further effect.
    pub fn flush(&mut self) {
        if self.closed || !self.scheduler.accepts_input() {
            return;
        }
        debug!(
            "Flushing encoder: {} frames buffered",
            self.scheduler.buffered()
        );
        self.scheduler.flush();
    }

    /// Stop the encoder, dropping buffered frames and undelivered packets.
    pub fn close(&mut self) {
        if !self.closed {
            self.shutdown();
        }
    }

    /// Force the next submitted frame to be a keyframe.
    pub fn request_keyframe(&mut self) {
        self.scheduler.request_keyframe();
    }

    /// Sequence header followed by any HDR metadata OBUs.
    pub fn headers(&self) -> Vec<u8> {
        let mut out = self.core.sequence_header();
        out.extend_from_slice(&metadata_obus(&self.config));
        out
    }

    /// Rate-control statistics. A fresh encoder reports zero frames encoded.
    pub fn rate_control_stats(&self) -> Result<RateControlStats> {
        Ok(self.rate_control.stats())
    }

    /// Scheduler lifecycle state.
    pub fn state(&self) -> SchedulerState {
        if self.closed {
            SchedulerState::Closed
        } else {
            self.scheduler.state()
        }
    }

    /// The validated configuration.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Frames accepted by `submit`.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Frames refused by `submit` with `InvalidFrame`.
    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }
}

/// Packets available from an encoder without further input.
///
/// Yields an error at most once, when the core fails; the encoder is closed
/// afterwards and the iterator ends.
pub struct Packets<'a, C: BitstreamCore> {
    encoder: &'a mut AV1Encoder<C>,
}

impl<C: BitstreamCore> Iterator for Packets<'_, C> {
    type Item = Result<EncodedPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.encoder.receive_packet() {
            Ok(PacketPoll::Ready(packet)) => Some(Ok(packet)),
            Ok(PacketPoll::Pending | PacketPoll::Drained) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
