//! The bitstream core seam.
//!
//! The pipeline hands each scheduled unit and its quantizer to a
//! [`BitstreamCore`] and treats the returned bytes as opaque. [`ReferenceCore`]
//! is a deterministic stand-in that produces well-formed OBU framing (a real
//! sequence header plus a padding OBU summarizing the unit) so the scheduler,
//! rate control and container run end to end without a transform/entropy coder.

use tracing::debug;

use super::bitwriter::BitWriter;
use super::color::{ColorDescription, ColorRange};
use super::frame::{PLANE_U, PLANE_V, PLANE_Y};
use super::gop::GopFrameType;
use super::obu::{self, ObuType};
use super::reorder::ScheduledUnit;
use super::{BitDepth, ResolvedConfig, MAX_Q_IDX};
use crate::error::Result;

/// Compresses one scheduled unit into a temporal unit.
///
/// An error from [`BitstreamCore::encode`] is fatal for the encoder that
/// called it; no partial output is ever delivered.
pub trait BitstreamCore {
    /// Sequence header OBU describing the stream.
    fn sequence_header(&self) -> Vec<u8>;

    /// Compress `unit` at quantizer `q_idx`.
    fn encode(&mut self, unit: &ScheduledUnit, q_idx: u8) -> Result<Vec<u8>>;
}

/// `seq_level_idx` 5.1.
const SEQ_LEVEL_IDX: u64 = 13;

/// Bits of `order_hint` signalled when B-frames need display ordering.
const ORDER_HINT_BITS: u64 = 7;

/// Luma samples represented by one filler byte at quantizer 0.
const SAMPLES_PER_BYTE: usize = 8;

fn bits_needed(v: u32) -> u8 {
    if v == 0 {
        1
    } else {
        (32 - v.leading_zeros()) as u8
    }
}

/// Serialize a `sequence_header_obu` payload for the resolved configuration.
pub fn encode_sequence_header(config: &ResolvedConfig) -> Vec<u8> {
    let width = config.dimensions.width;
    let height = config.dimensions.height;
    let enable_order_hint = config.b_frame_count > 0;

    let mut w = BitWriter::new();
    w.write_bits(0, 3); // seq_profile (Main)
    w.write_bit(false); // still_picture
    w.write_bit(false); // reduced_still_picture_header
    w.write_bit(false); // timing_info_present_flag
    w.write_bit(false); // initial_display_delay_present_flag
    w.write_bits(0, 5); // operating_points_cnt_minus_1
    w.write_bits(0, 12); // operating_point_idc[0]
    w.write_bits(SEQ_LEVEL_IDX, 5);
    w.write_bit(false); // seq_tier[0]

    let width_bits = bits_needed(width - 1);
    let height_bits = bits_needed(height - 1);
    w.write_bits(u64::from(width_bits - 1), 4);
    w.write_bits(u64::from(height_bits - 1), 4);
    w.write_bits(u64::from(width - 1), width_bits);
    w.write_bits(u64::from(height - 1), height_bits);

    w.write_bit(false); // frame_id_numbers_present_flag
    w.write_bit(false); // use_128x128_superblock
    w.write_bit(false); // enable_filter_intra
    w.write_bit(false); // enable_intra_edge_filter
    w.write_bit(false); // enable_interintra_compound
    w.write_bit(false); // enable_masked_compound
    w.write_bit(false); // enable_warped_motion
    w.write_bit(false); // enable_dual_filter
    w.write_bit(enable_order_hint);
    if enable_order_hint {
        w.write_bit(false); // enable_jnt_comp
        w.write_bit(false); // enable_ref_frame_mvs
    }
    w.write_bit(false); // seq_choose_screen_content_tools
    w.write_bit(false); // seq_force_screen_content_tools
    if enable_order_hint {
        w.write_bits(ORDER_HINT_BITS - 1, 3);
    }
    w.write_bit(false); // enable_superres
    w.write_bit(false); // enable_cdef
    w.write_bit(false); // enable_restoration

    write_color_config(&mut w, config.bit_depth, &config.color);

    w.write_bit(false); // film_grain_params_present
    w.trailing_bits();
    w.finish()
}

fn write_color_config(w: &mut BitWriter, bit_depth: BitDepth, color: &ColorDescription) {
    w.write_bit(bit_depth == BitDepth::Ten); // high_bitdepth
    w.write_bit(false); // mono_chrome

    let description = color.signalled_codes();
    w.write_bit(description.is_some());
    if let Some((primaries, transfer, matrix)) = description {
        w.write_bits(u64::from(primaries), 8);
        w.write_bits(u64::from(transfer), 8);
        w.write_bits(u64::from(matrix), 8);
    }

    // BT.709 primaries with sRGB transfer and identity matrix imply full range.
    if description != Some((1, 13, 0)) {
        let full_range = color.range == Some(ColorRange::Full);
        w.write_bit(full_range);
        w.write_bits(0, 2); // chroma_sample_position (unknown)
    }
    w.write_bit(false); // separate_uv_delta_q
}

/// FNV-1a over every sample of every plane.
fn plane_digest(unit: &ScheduledUnit) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for plane in [PLANE_Y, PLANE_U, PLANE_V] {
        for &sample in unit.frame.plane(plane) {
            for byte in sample.to_le_bytes() {
                hash ^= u32::from(byte);
                hash = hash.wrapping_mul(0x0100_0193);
            }
        }
    }
    hash
}

/// Deterministic stand-in for a real AV1 encoder.
///
/// Every temporal unit starts with a temporal delimiter; keyframes repeat the
/// sequence header. The frame itself is represented by a padding OBU carrying
/// the picture type, quantizer, encode order, input index and a plane digest,
/// followed by filler whose length falls linearly as the quantizer rises.
pub struct ReferenceCore {
    sequence_header: Vec<u8>,
    luma_samples: usize,
}

impl ReferenceCore {
    pub fn new(config: &ResolvedConfig) -> Self {
        let payload = encode_sequence_header(config);
        Self {
            sequence_header: obu::obu_wrap(ObuType::SequenceHeader, &payload),
            luma_samples: config.dimensions.luma_samples(),
        }
    }

    /// Filler bytes for a unit of `frame_type` at quantizer `q_idx`.
    pub fn filler_len(&self, frame_type: GopFrameType, q_idx: u8) -> usize {
        let scale = (MAX_Q_IDX + 1 - u32::from(q_idx)) as usize;
        let base = self.luma_samples * scale / (SAMPLES_PER_BYTE * (MAX_Q_IDX as usize + 1));
        match frame_type {
            GopFrameType::Key => base * 3,
            GopFrameType::P => base,
            GopFrameType::B => base / 2,
        }
    }
}

impl BitstreamCore for ReferenceCore {
    fn sequence_header(&self) -> Vec<u8> {
        self.sequence_header.clone()
    }

    fn encode(&mut self, unit: &ScheduledUnit, q_idx: u8) -> Result<Vec<u8>> {
        let digest = plane_digest(unit);

        let mut summary = vec![
            match unit.frame_type {
                GopFrameType::Key => 0,
                GopFrameType::P => 1,
                GopFrameType::B => 2,
            },
            q_idx,
        ];
        summary.extend_from_slice(&obu::leb128_encode(unit.encode_order));
        summary.extend_from_slice(&obu::leb128_encode(unit.input_index()));
        summary.extend_from_slice(&digest.to_le_bytes());
        let digest_bytes = digest.to_le_bytes();
        let filler = self.filler_len(unit.frame_type, q_idx);
        summary.extend((0..filler).map(|i| digest_bytes[i % 4]));

        let mut data = obu::temporal_delimiter();
        if unit.is_key() {
            data.extend_from_slice(&self.sequence_header);
        }
        data.extend_from_slice(&obu::obu_wrap(ObuType::Padding, &summary));

        debug!(
            "Reference core: unit {} -> {} bytes (q_idx={}, digest={:08x})",
            unit.encode_order,
            data.len(),
            q_idx,
            digest
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::reorder::tests::test_frame;
    use crate::encoder::EncodeConfig;

    fn unit(frame_type: GopFrameType, encode_order: u64) -> ScheduledUnit {
        ScheduledUnit {
            frame: test_frame(encode_order),
            frame_type,
            encode_order,
            forward_ref: None,
            backward_ref: None,
        }
    }

    mod sequence_header_tests {
        use super::*;

        #[test]
        fn test_bits_needed() {
            assert_eq!(bits_needed(0), 1);
            assert_eq!(bits_needed(63), 6);
            assert_eq!(bits_needed(1919), 11);
        }

        #[test]
        fn test_64x64_layout() {
            let config = EncodeConfig::default().normalize(64, 64).unwrap();
            let bytes = encode_sequence_header(&config);

            let mut expected = BitWriter::new();
            expected.write_bits(0, 3 + 4 + 5 + 12);
            expected.write_bits(SEQ_LEVEL_IDX, 5);
            expected.write_bit(false);
            expected.write_bits(5, 4);
            expected.write_bits(5, 4);
            expected.write_bits(63, 6);
            expected.write_bits(63, 6);
            expected.write_bits(0, 9); // tool flags, order hint off
            expected.write_bits(0, 2); // screen content
            expected.write_bits(0, 3); // superres, cdef, restoration
            expected.write_bits(0, 3); // high_bitdepth, mono_chrome, no description
            expected.write_bits(0, 3); // color_range, chroma_sample_position
            expected.write_bits(0, 2); // separate_uv_delta_q, film grain
            expected.trailing_bits();
            assert_eq!(bytes, expected.finish());
        }

        #[test]
        fn test_dimensions_and_depth_change_header() {
            let small = EncodeConfig::default().normalize(64, 64).unwrap();
            let large = EncodeConfig::default().normalize(1920, 1080).unwrap();
            let deep = EncodeConfig::default()
                .with_bit_depth(10)
                .normalize(64, 64)
                .unwrap();
            assert_ne!(encode_sequence_header(&small), encode_sequence_header(&large));
            assert_ne!(encode_sequence_header(&small), encode_sequence_header(&deep));
        }

        #[test]
        fn test_color_description_lengthens_header() {
            let plain = EncodeConfig::default().normalize(64, 64).unwrap();
            let described = EncodeConfig::default()
                .with_color_description(9, 16, 9)
                .normalize(64, 64)
                .unwrap();
            let plain_len = encode_sequence_header(&plain).len();
            let described_len = encode_sequence_header(&described).len();
            // Three 8-bit code points.
            assert_eq!(described_len, plain_len + 3);
        }
    }

    mod reference_core_tests {
        use super::*;

        #[test]
        fn test_keyframe_carries_sequence_header() {
            let config = EncodeConfig::default().normalize(2, 2).unwrap();
            let mut core = ReferenceCore::new(&config);

            let key = core.encode(&unit(GopFrameType::Key, 0), 128).unwrap();
            assert_eq!(&key[..2], &[0x12, 0x00]);
            assert_eq!(key[2], 0x0A);

            let inter = core.encode(&unit(GopFrameType::P, 1), 128).unwrap();
            assert_eq!(inter[2], 0x7A);
        }

        #[test]
        fn test_size_shrinks_with_quantizer() {
            let config = EncodeConfig::default().normalize(64, 64).unwrap();
            let mut core = ReferenceCore::new(&config);
            let fine = core.encode(&unit(GopFrameType::P, 0), 10).unwrap();
            let coarse = core.encode(&unit(GopFrameType::P, 0), 250).unwrap();
            assert!(fine.len() > coarse.len());
            let key = core.filler_len(GopFrameType::Key, 128);
            assert!(key > core.filler_len(GopFrameType::B, 128));
        }

        #[test]
        fn test_deterministic() {
            let config = EncodeConfig::default().normalize(16, 16).unwrap();
            let mut a = ReferenceCore::new(&config);
            let mut b = ReferenceCore::new(&config);
            let u = unit(GopFrameType::P, 3);
            assert_eq!(a.encode(&u, 77).unwrap(), b.encode(&u, 77).unwrap());
        }
    }
}
