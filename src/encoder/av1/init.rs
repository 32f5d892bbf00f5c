use super::AV1Encoder;

use crate::encoder::bitstream::{BitstreamCore, ReferenceCore};
use crate::encoder::queue::PacketQueue;
use crate::encoder::rate_control::RateController;
use crate::encoder::scheduler::GopScheduler;
use crate::encoder::{EncodeConfig, ResolvedConfig};
use crate::error::Result;
use tracing::info;

impl AV1Encoder<ReferenceCore> {
    /// Create a new AV1 encoder backed by the built-in reference core.
    ///
    /// Fails with `InvalidConfig` without allocating anything when the
    /// configuration or dimensions are rejected.
    pub fn new(width: u32, height: u32, config: &EncodeConfig) -> Result<Self> {
        let resolved = config.normalize(width, height)?;
        let core = ReferenceCore::new(&resolved);
        Ok(Self::with_core(resolved, core))
    }
}

impl<C: BitstreamCore> AV1Encoder<C> {
    /// Create an encoder driving a caller-provided bitstream core.
    pub fn with_core(config: ResolvedConfig, core: C) -> Self {
        info!(
            "Creating AV1 encoder: {}x{}, {}-bit, mode={:?}, base_q_idx={}, keyint={}, gop={}, b_frames={}, lookahead={}",
            config.dimensions.width,
            config.dimensions.height,
            config.bit_depth.bits(),
            config.rate_control_mode,
            config.base_q_idx,
            config.keyframe_interval,
            config.gop_size,
            config.b_frame_count,
            config.lookahead_depth
        );

        Self {
            scheduler: GopScheduler::new(&config),
            rate_control: RateController::new(&config),
            queue: PacketQueue::new(),
            core,
            config,
            frames_submitted: 0,
            frames_rejected: 0,
            closed: false,
        }
    }
}
