//! Rate control.
//!
//! Constant-quantizer mode hands every frame the base quantizer. Target-bitrate
//! mode runs a leaky bucket one second deep: every encoded frame pours its
//! size in, and the channel drains `target_bitrate / frame_rate` bits per
//! frame. A bucket above the high-water mark means the encoder overspent and
//! the working quantizer is raised; below the low-water mark it is lowered.

use tracing::debug;

use super::gop::GopFrameType;
use super::reorder::ScheduledUnit;
use super::{Fps, RateControlMode, ResolvedConfig, MAX_Q_IDX};

/// Bucket fullness above which the quantizer is raised.
pub const HIGH_WATER_PCT: f64 = 70.0;

/// Bucket fullness below which the quantizer is lowered.
pub const LOW_WATER_PCT: f64 = 30.0;

/// Largest change of the working quantizer per frame.
const MAX_QP_STEP: f64 = 10.0;

/// Quantizer offset applied to keyframes in target-bitrate mode.
pub const KEYFRAME_QP_OFFSET: i32 = -15;

/// Quantizer offset applied to B-frames in target-bitrate mode.
pub const B_FRAME_QP_OFFSET: i32 = 16;

/// Weight of the newest sample in the running averages.
const EWMA_ALPHA: f64 = 0.2;

/// Snapshot of the rate controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateControlStats {
    /// Target bitrate in bits per second (0 in constant-quantizer mode).
    pub target_bitrate: u64,
    /// Frames whose packets have been produced.
    pub frames_encoded: u64,
    /// Virtual buffer fullness, 0 to 100. Always 0 in constant-quantizer mode.
    pub buffer_fullness_pct: f64,
    /// Exponentially weighted mean of the quantizers used.
    pub avg_qp: f64,
}

/// Initial quantizer for a bitrate, from the bits available per pixel.
pub fn initial_qp_from_bitrate(target_bitrate: u64, fps: Fps, width: u32, height: u32) -> u8 {
    let bpp = target_bitrate as f64 / (fps.as_f64() * width as f64 * height as f64);
    match bpp {
        b if b > 1.0 => 40,
        b if b > 0.5 => 80,
        b if b > 0.2 => 120,
        b if b > 0.1 => 160,
        b if b > 0.05 => 200,
        _ => 230,
    }
}

pub struct RateController {
    mode: RateControlMode,
    base_q_idx: u8,
    target_bitrate: u64,
    buffer_size: f64,
    buffer_fullness: f64,
    bits_per_frame: f64,
    working_qp: f64,
    avg_qp: f64,
    frames_encoded: u64,
}

impl RateController {
    pub fn new(config: &ResolvedConfig) -> Self {
        let mode = config.rate_control_mode;
        let target_bitrate = config.target_bitrate;
        let bits_per_frame = target_bitrate as f64 / config.frame_rate.as_f64();
        let buffer_size = target_bitrate as f64;

        let seed_qp = match mode {
            RateControlMode::ConstantQuantizer => config.base_q_idx,
            RateControlMode::TargetBitrate => initial_qp_from_bitrate(
                target_bitrate,
                config.frame_rate,
                config.dimensions.width,
                config.dimensions.height,
            ),
        };

        Self {
            mode,
            base_q_idx: config.base_q_idx,
            target_bitrate,
            buffer_size,
            buffer_fullness: buffer_size / 2.0,
            bits_per_frame,
            working_qp: seed_qp as f64,
            avg_qp: seed_qp as f64,
            frames_encoded: 0,
        }
    }

    /// Quantizer for the next unit to encode.
    pub fn decide(&mut self, unit: &ScheduledUnit) -> u8 {
        if self.mode == RateControlMode::ConstantQuantizer {
            return self.base_q_idx;
        }

        if self.frames_encoded > 0 {
            let fullness = self.fullness_pct();
            let step = if fullness > HIGH_WATER_PCT {
                (fullness - HIGH_WATER_PCT) / (100.0 - HIGH_WATER_PCT) * MAX_QP_STEP
            } else if fullness < LOW_WATER_PCT {
                -(LOW_WATER_PCT - fullness) / LOW_WATER_PCT * MAX_QP_STEP
            } else {
                0.0
            };
            self.working_qp = (self.working_qp + step.clamp(-MAX_QP_STEP, MAX_QP_STEP).round())
                .clamp(0.0, MAX_Q_IDX as f64);
        }

        let offset = match unit.frame_type {
            GopFrameType::Key => KEYFRAME_QP_OFFSET,
            GopFrameType::P => 0,
            GopFrameType::B => B_FRAME_QP_OFFSET,
        };
        let qp = (self.working_qp as i32 + offset).clamp(0, MAX_Q_IDX as i32) as u8;

        debug!(
            "Rate control: frame {} ({:?}) fullness={:.1}% qp={}",
            unit.encode_order,
            unit.frame_type,
            self.fullness_pct(),
            qp
        );
        qp
    }

    /// Feed back the size of a finished frame and the quantizer it used.
    pub fn update(&mut self, encoded_bytes: usize, qp_used: u8) {
        let bits = encoded_bytes as f64 * 8.0;
        if self.mode == RateControlMode::TargetBitrate {
            self.buffer_fullness =
                (self.buffer_fullness + bits - self.bits_per_frame).clamp(0.0, self.buffer_size);
        }
        self.avg_qp = EWMA_ALPHA * qp_used as f64 + (1.0 - EWMA_ALPHA) * self.avg_qp;
        self.frames_encoded += 1;
    }

    fn fullness_pct(&self) -> f64 {
        match self.mode {
            RateControlMode::ConstantQuantizer => 0.0,
            RateControlMode::TargetBitrate => self.buffer_fullness / self.buffer_size * 100.0,
        }
    }

    pub fn stats(&self) -> RateControlStats {
        RateControlStats {
            target_bitrate: self.target_bitrate,
            frames_encoded: self.frames_encoded,
            buffer_fullness_pct: self.fullness_pct(),
            avg_qp: self.avg_qp,
        }
    }
}
