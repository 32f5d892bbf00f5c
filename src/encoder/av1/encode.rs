use super::AV1Encoder;

use crate::encoder::bitstream::BitstreamCore;
use crate::encoder::{EncodedPacket, FrameType};
use crate::error::{FrameForgeError, Result};
use tracing::{debug, warn};

impl<C: BitstreamCore> AV1Encoder<C> {
    /// Compress the next scheduled unit into the packet queue.
    ///
    /// Returns `Ok(false)` when the scheduler has nothing final yet.
    pub(super) fn encode_next_unit(&mut self) -> Result<bool> {
        let Some(unit) = self.scheduler.next_unit() else {
            return Ok(false);
        };

        let q_idx = self.rate_control.decide(&unit);

        let data = match self.core.encode(&unit, q_idx) {
            Ok(data) if data.is_empty() => {
                return Err(self.fail(unit.encode_order, "bitstream core returned no data".into()));
            }
            Ok(data) => data,
            Err(FrameForgeError::EncodeFailed(msg)) => {
                return Err(self.fail(unit.encode_order, msg));
            }
            Err(e) => return Err(self.fail(unit.encode_order, e.to_string())),
        };

        self.rate_control.update(data.len(), q_idx);

        let is_key_frame = unit.is_key();
        let packet = EncodedPacket {
            data,
            frame_number: unit.encode_order,
            input_index: unit.input_index(),
            frame_type: if is_key_frame {
                FrameType::Key
            } else {
                FrameType::Inter
            },
            is_key_frame,
            pts: unit.frame.pts(),
            q_idx,
        };

        debug!(
            "Encoded frame {}: input={}, type={:?}, q_idx={}, {} bytes, refs=({:?}, {:?})",
            packet.frame_number,
            packet.input_index,
            unit.frame_type,
            q_idx,
            packet.size(),
            unit.forward_ref,
            unit.backward_ref
        );

        self.queue.enqueue(packet)?;
        Ok(true)
    }

    /// Shut the pipeline down after a core failure and build the error to report.
    fn fail(&mut self, encode_order: u64, msg: String) -> FrameForgeError {
        warn!("Bitstream core failed on frame {}: {}", encode_order, msg);
        self.shutdown();
        FrameForgeError::EncodeFailed(msg)
    }

    /// Drop every buffered frame and undelivered packet.
    pub(super) fn shutdown(&mut self) {
        self.closed = true;
        let frames = self.scheduler.close();
        let packets = self.queue.close();
        if frames > 0 || packets > 0 {
            debug!(
                "Encoder shut down: dropped {} buffered frames, {} undelivered packets",
                frames, packets
            );
        }
    }
}
