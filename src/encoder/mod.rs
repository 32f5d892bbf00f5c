//! Encoder types, configuration, and the frame pipeline.
//!
//! This module provides:
//! - Core encoder types and configuration (`EncodeConfig`, `EncodedPacket`, etc.)
//! - GOP structure management (`gop` module) and B-frame reordering (`reorder` module),
//!   combined into the lookahead state machine in `scheduler`.
//! - Rate control (`rate_control`) and the packet queue (`queue`).
//! - The `BitstreamCore` seam (`bitstream`) and the AV1 pipeline driving it (`av1`).

pub mod av1;
pub mod bitstream;
pub mod bitwriter;
pub mod color;
pub mod frame;
pub mod gop;
pub mod metadata;
pub mod obu;
pub mod queue;
pub mod rate_control;
pub mod reorder;
pub mod scheduler;

use crate::error::{FrameForgeError, Result};
use color::{
    ColorDescription, ColorPrimaries, ColorRange, ContentLightLevel, MasteringDisplay,
    MatrixCoefficients, TransferCharacteristics,
};

// Default encoder configuration constants.

/// Default base quantizer index.
pub const DEFAULT_BASE_Q_IDX: u32 = 128;

/// Default distance between keyframes, in frames.
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 25;

/// Default frame rate (frames per second).
pub const DEFAULT_FRAME_RATE: u32 = 25;

/// Largest quantizer index.
pub const MAX_Q_IDX: u32 = 255;

/// Largest number of consecutive B-frames (AV1 keeps 7 reference slots).
pub const MAX_B_FRAMES: u32 = 7;

/// Largest frame dimension representable in the IVF header.
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

/// Bit depth for video encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 8-bit per component (standard).
    #[default]
    Eight,
    /// 10-bit per component (HDR, Main10 profile).
    Ten,
}

impl BitDepth {
    /// Parse a bit count, accepting only 8 and 10.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::Eight),
            10 => Some(Self::Ten),
            _ => None,
        }
    }

    /// Number of bits per sample.
    pub fn bits(self) -> u8 {
        match self {
            Self::Eight => 8,
            Self::Ten => 10,
        }
    }

    /// Largest legal sample value.
    pub fn max_value(self) -> u16 {
        (1u16 << self.bits()) - 1
    }
}

/// Rate control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateControlMode {
    /// Constant quantizer: every frame uses the base quantizer.
    #[default]
    ConstantQuantizer,
    /// Leaky-bucket rate control toward a target bitrate.
    TargetBitrate,
}

/// Rational frame rate, stored reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fps {
    pub num: u32,
    pub den: u32,
}

impl Fps {
    /// Create a frame rate, rejecting zero terms.
    pub fn new(num: u32, den: u32) -> Result<Self> {
        if num == 0 || den == 0 {
            return Err(FrameForgeError::InvalidConfig(format!(
                "frame rate must be > 0, got {num}/{den}"
            )));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Frame rate as frames per second.
    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self {
            num: DEFAULT_FRAME_RATE,
            den: 1,
        }
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    if a == 0 {
        1
    } else {
        a
    }
}

/// Frame types in the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Independently decodable frame.
    Key,
    /// Frame predicted from earlier output.
    Inter,
}

/// Video dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Chroma plane size for 4:2:0 subsampling (rounded up).
    pub fn chroma(&self) -> Dimensions {
        Dimensions {
            width: self.width.div_ceil(2),
            height: self.height.div_ceil(2),
        }
    }

    /// Luma sample count.
    pub fn luma_samples(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Encode configuration as supplied by the caller.
///
/// Fields that take arbitrary integers (`base_q_idx`, `bit_depth`, the color
/// code points) are checked by [`EncodeConfig::normalize`], not by the setters.
/// `None` means "unset".
#[derive(Debug, Clone)]
#[must_use]
pub struct EncodeConfig {
    /// Base quantizer index (0..=255).
    pub base_q_idx: u32,
    /// Distance between periodic keyframes, in frames (>= 1).
    pub keyframe_interval: u32,
    /// GOP length; defaults to the keyframe interval when unset.
    pub gop_size: Option<u32>,
    /// Target bitrate in bits per second; 0 selects constant-quantizer mode.
    pub target_bitrate: u64,
    /// Frame rate numerator.
    pub frame_rate_numerator: u32,
    /// Frame rate denominator.
    pub frame_rate_denominator: u32,
    /// Number of consecutive B-frames between anchors.
    pub b_frame_count: u32,
    /// Bits per sample (8 or 10).
    pub bit_depth: u8,
    /// Color range code (0 limited, 1 full).
    pub color_range: Option<u8>,
    /// `color_primaries` code point.
    pub color_primaries: Option<u8>,
    /// `transfer_characteristics` code point.
    pub transfer_characteristics: Option<u8>,
    /// `matrix_coefficients` code point.
    pub matrix_coefficients: Option<u8>,
    /// Content light level metadata.
    pub content_light: Option<ContentLightLevel>,
    /// Mastering display metadata.
    pub mastering_display: Option<MasteringDisplay>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            base_q_idx: DEFAULT_BASE_Q_IDX,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            gop_size: None,
            target_bitrate: 0,
            frame_rate_numerator: DEFAULT_FRAME_RATE,
            frame_rate_denominator: 1,
            b_frame_count: 0,
            bit_depth: 8,
            color_range: None,
            color_primaries: None,
            transfer_characteristics: None,
            matrix_coefficients: None,
            content_light: None,
            mastering_display: None,
        }
    }
}

impl EncodeConfig {
    /// Set the base quantizer index.
    pub fn with_base_q_idx(mut self, q: u32) -> Self {
        self.base_q_idx = q;
        self
    }

    /// Set the keyframe interval.
    pub fn with_keyframe_interval(mut self, interval: u32) -> Self {
        self.keyframe_interval = interval;
        self
    }

    /// Set the GOP size.
    pub fn with_gop_size(mut self, size: u32) -> Self {
        self.gop_size = Some(size);
        self
    }

    /// Set the target bitrate (0 for constant quantizer).
    pub fn with_target_bitrate(mut self, bitrate: u64) -> Self {
        self.target_bitrate = bitrate;
        self
    }

    /// Set the frame rate.
    pub fn with_frame_rate(mut self, numerator: u32, denominator: u32) -> Self {
        self.frame_rate_numerator = numerator;
        self.frame_rate_denominator = denominator;
        self
    }

    /// Set the number of B-frames.
    pub fn with_b_frames(mut self, count: u32) -> Self {
        self.b_frame_count = count;
        self
    }

    /// Set the bit depth (8 or 10).
    pub fn with_bit_depth(mut self, bits: u8) -> Self {
        self.bit_depth = bits;
        self
    }

    /// Set the color range code.
    pub fn with_color_range(mut self, range: u8) -> Self {
        self.color_range = Some(range);
        self
    }

    /// Set the primaries, transfer and matrix code points together.
    pub fn with_color_description(mut self, primaries: u8, transfer: u8, matrix: u8) -> Self {
        self.color_primaries = Some(primaries);
        self.transfer_characteristics = Some(transfer);
        self.matrix_coefficients = Some(matrix);
        self
    }

    /// Attach content light level metadata.
    pub fn with_content_light(mut self, cll: ContentLightLevel) -> Self {
        self.content_light = Some(cll);
        self
    }

    /// Attach mastering display metadata.
    pub fn with_mastering_display(mut self, mdcv: MasteringDisplay) -> Self {
        self.mastering_display = Some(mdcv);
        self
    }

    /// Validate every field and fill the derived ones.
    pub fn normalize(&self, width: u32, height: u32) -> Result<ResolvedConfig> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(FrameForgeError::InvalidConfig(format!(
                "dimensions {width}x{height} out of range: each must be 1..={MAX_DIMENSION}"
            )));
        }

        let base_q_idx = u8::try_from(self.base_q_idx).map_err(|_| {
            FrameForgeError::InvalidConfig(format!(
                "base_q_idx must be 0..={MAX_Q_IDX}, got {}",
                self.base_q_idx
            ))
        })?;

        if self.keyframe_interval == 0 {
            return Err(FrameForgeError::InvalidConfig(
                "keyframe_interval must be >= 1".to_string(),
            ));
        }

        let gop_size = self.gop_size.unwrap_or(self.keyframe_interval);
        if gop_size < self.keyframe_interval {
            return Err(FrameForgeError::InvalidConfig(format!(
                "gop_size ({gop_size}) must be >= keyframe_interval ({})",
                self.keyframe_interval
            )));
        }

        if self.b_frame_count > MAX_B_FRAMES {
            return Err(FrameForgeError::InvalidConfig(format!(
                "b_frame_count must be 0..={MAX_B_FRAMES}, got {}",
                self.b_frame_count
            )));
        }

        let frame_rate = Fps::new(self.frame_rate_numerator, self.frame_rate_denominator)?;

        let bit_depth = BitDepth::from_bits(self.bit_depth).ok_or_else(|| {
            FrameForgeError::InvalidConfig(format!(
                "bit_depth must be 8 or 10, got {}",
                self.bit_depth
            ))
        })?;

        let color = ColorDescription {
            range: self.color_range.map(ColorRange::try_from).transpose()?,
            primaries: self.color_primaries.map(ColorPrimaries::try_from).transpose()?,
            transfer: self
                .transfer_characteristics
                .map(TransferCharacteristics::try_from)
                .transpose()?,
            matrix: self
                .matrix_coefficients
                .map(MatrixCoefficients::try_from)
                .transpose()?,
        };

        if (self.content_light.is_some() || self.mastering_display.is_some())
            && bit_depth != BitDepth::Ten
        {
            return Err(FrameForgeError::InvalidConfig(
                "HDR metadata requires a 10-bit signal".to_string(),
            ));
        }
        if (self.content_light.is_some() || self.mastering_display.is_some())
            && color.signalled_codes().is_none()
        {
            return Err(FrameForgeError::InvalidConfig(
                "HDR metadata requires primaries, transfer and matrix to be set".to_string(),
            ));
        }
        if let Some(mdcv) = &self.mastering_display {
            mdcv.validate()?;
        }

        let rate_control_mode = if self.target_bitrate == 0 {
            RateControlMode::ConstantQuantizer
        } else {
            RateControlMode::TargetBitrate
        };

        Ok(ResolvedConfig {
            dimensions: Dimensions { width, height },
            base_q_idx,
            keyframe_interval: self.keyframe_interval,
            gop_size,
            rate_control_mode,
            target_bitrate: self.target_bitrate,
            frame_rate,
            b_frame_count: self.b_frame_count,
            lookahead_depth: lookahead_depth(self.b_frame_count),
            bit_depth,
            color,
            content_light: self.content_light,
            mastering_display: self.mastering_display,
        })
    }
}

/// Frames that must be buffered before a mini-GOP's encode order is stable:
/// the B-frames plus the anchor that follows them.
pub fn lookahead_depth(b_frame_count: u32) -> u32 {
    b_frame_count + 1
}

/// Fully validated configuration. Immutable for the encoder's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub dimensions: Dimensions,
    pub base_q_idx: u8,
    pub keyframe_interval: u32,
    pub gop_size: u32,
    pub rate_control_mode: RateControlMode,
    pub target_bitrate: u64,
    pub frame_rate: Fps,
    pub b_frame_count: u32,
    pub lookahead_depth: u32,
    pub bit_depth: BitDepth,
    pub color: ColorDescription,
    pub content_light: Option<ContentLightLevel>,
    pub mastering_display: Option<MasteringDisplay>,
}

/// Encoded video packet, owned by the caller once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Encoded bitstream data.
    pub data: Vec<u8>,
    /// Position in output order, starting at 0 and strictly increasing.
    pub frame_number: u64,
    /// Input sequence number of the source frame.
    pub input_index: u64,
    /// Frame type.
    pub frame_type: FrameType,
    /// Whether this is a keyframe.
    pub is_key_frame: bool,
    /// Presentation timestamp supplied with the source frame, if any.
    pub pts: Option<u64>,
    /// Quantizer index used for this frame.
    pub q_idx: u8,
}

impl EncodedPacket {
    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Timestamp to write into a container: the caller's pts when present,
    /// otherwise the output frame number.
    pub fn container_timestamp(&self) -> u64 {
        self.pts.unwrap_or(self.frame_number)
    }
}
