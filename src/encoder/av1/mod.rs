//! AV1 encoder pipeline.
//!
//! Frames flow through ingestion, the lookahead scheduler, rate control and
//! the bitstream core into an ordered packet queue. Encoding is pull driven:
//! submitting a frame never produces output by itself, and each call to
//! [`AV1Encoder::receive_packet`] compresses at most one scheduled unit, so
//! rate-control statistics always describe exactly the packets handed out.

mod api;
mod encode;
mod init;

use crate::encoder::bitstream::{BitstreamCore, ReferenceCore};
use crate::encoder::queue::PacketQueue;
use crate::encoder::rate_control::RateController;
use crate::encoder::scheduler::GopScheduler;
use crate::encoder::ResolvedConfig;

pub use api::Packets;

/// AV1 encoder.
pub struct AV1Encoder<C: BitstreamCore = ReferenceCore> {
    config: ResolvedConfig,
    core: C,
    scheduler: GopScheduler,
    rate_control: RateController,
    queue: PacketQueue,

    // Frame counters.
    frames_submitted: u64,
    frames_rejected: u64,

    /// Set by `close` or a fatal core failure.
    closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::frame::RawFrame;
    use crate::encoder::queue::PacketPoll;
    use crate::encoder::reorder::ScheduledUnit;
    use crate::encoder::scheduler::SchedulerState;
    use crate::encoder::{EncodeConfig, FrameType};
    use crate::error::{FrameForgeError, Result};

    const W: u32 = 16;
    const H: u32 = 16;

    fn submit_solid<C: BitstreamCore>(encoder: &mut AV1Encoder<C>, value: u8) -> Result<()> {
        let y = vec![value; (W * H) as usize];
        let uv = vec![128u8; (W * H / 4) as usize];
        encoder.submit(&RawFrame::from_u8(&y, &uv, &uv, W as usize, W as usize / 2))
    }

    /// Core that fails on a chosen unit.
    struct FailingCore {
        fail_at: u64,
    }

    impl BitstreamCore for FailingCore {
        fn sequence_header(&self) -> Vec<u8> {
            vec![0x0A, 0x00]
        }

        fn encode(&mut self, unit: &ScheduledUnit, _q_idx: u8) -> Result<Vec<u8>> {
            if unit.encode_order == self.fail_at {
                return Err(FrameForgeError::EncodeFailed("synthetic failure".into()));
            }
            Ok(vec![0x12, 0x00])
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_submit_does_not_emit() {
            let config = EncodeConfig::default();
            let mut encoder = AV1Encoder::new(W, H, &config).unwrap();
            submit_solid(&mut encoder, 16).unwrap();
            assert_eq!(encoder.state(), SchedulerState::Ready);
            assert_eq!(encoder.frames_submitted(), 1);

            let packet = encoder.try_receive_packet().unwrap().unwrap();
            assert!(packet.is_key_frame);
            assert_eq!(packet.frame_type, FrameType::Key);
            assert_eq!(encoder.receive_packet().unwrap(), PacketPoll::Pending);
        }

        #[test]
        fn test_flush_then_drained() {
            let mut encoder = AV1Encoder::new(W, H, &EncodeConfig::default()).unwrap();
            submit_solid(&mut encoder, 1).unwrap();
            encoder.flush();
            encoder.flush();
            assert!(encoder.try_receive_packet().unwrap().is_some());
            assert!(encoder.receive_packet().unwrap().is_drained());
            assert_eq!(encoder.state(), SchedulerState::Closed);
            assert!(matches!(
                submit_solid(&mut encoder, 1),
                Err(FrameForgeError::EncoderClosed)
            ));
        }

        #[test]
        fn test_close_discards_buffered_frames() {
            let config = EncodeConfig::default().with_b_frames(3);
            let mut encoder = AV1Encoder::new(W, H, &config).unwrap();
            for v in 0..3 {
                submit_solid(&mut encoder, v).unwrap();
            }
            encoder.close();
            assert!(encoder.receive_packet().unwrap().is_drained());
            assert!(matches!(
                submit_solid(&mut encoder, 1),
                Err(FrameForgeError::EncoderClosed)
            ));
        }

        #[test]
        fn test_rejected_frame_leaves_state() {
            let mut encoder = AV1Encoder::new(W, H, &EncodeConfig::default()).unwrap();
            let y = vec![0u8; 10];
            let uv = vec![0u8; 64];
            let err = encoder
                .submit(&RawFrame::from_u8(&y, &uv, &uv, W as usize, 8))
                .unwrap_err();
            assert!(err.is_recoverable());
            assert_eq!(encoder.frames_submitted(), 0);
            assert_eq!(encoder.state(), SchedulerState::Empty);
        }
    }

    mod failure_tests {
        use super::*;

        #[test]
        fn test_core_failure_closes_encoder() {
            let config = EncodeConfig::default().normalize(W, H).unwrap();
            let mut encoder = AV1Encoder::with_core(config, FailingCore { fail_at: 1 });
            for v in 0..3 {
                submit_solid(&mut encoder, v).unwrap();
            }

            assert!(encoder.try_receive_packet().unwrap().is_some());
            assert!(matches!(
                encoder.try_receive_packet(),
                Err(FrameForgeError::EncodeFailed(_))
            ));
            // No partial packet, nothing further drained.
            assert!(encoder.receive_packet().unwrap().is_drained());
            assert_eq!(encoder.rate_control_stats().unwrap().frames_encoded, 1);
            assert!(matches!(
                submit_solid(&mut encoder, 0),
                Err(FrameForgeError::EncoderClosed)
            ));
        }
    }

    #[test]
    fn test_encoder_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AV1Encoder>();
    }

    #[test]
    fn test_stats_available_after_construction() {
        let mut encoder = AV1Encoder::new(W, H, &EncodeConfig::default()).unwrap();
        let stats = encoder.rate_control_stats().unwrap();
        assert_eq!(stats.frames_encoded, 0);
        assert_eq!(stats.buffer_fullness_pct, 0.0);

        let config = EncodeConfig::default().with_target_bitrate(200_000);
        let fresh = AV1Encoder::new(W, H, &config).unwrap();
        let stats = fresh.rate_control_stats().unwrap();
        assert_eq!(stats.frames_encoded, 0);
        assert_eq!(stats.target_bitrate, 200_000);
        assert_eq!(stats.buffer_fullness_pct, 50.0);

        submit_solid(&mut encoder, 0).unwrap();
        encoder.try_receive_packet().unwrap();
        assert_eq!(encoder.rate_control_stats().unwrap().frames_encoded, 1);
    }
}
