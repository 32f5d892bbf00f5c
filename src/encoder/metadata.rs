//! HDR metadata OBU payloads (content light level and mastering display).

use super::bitwriter::BitWriter;
use super::color::{ContentLightLevel, MasteringDisplay};
use super::obu::{self, ObuType};
use super::ResolvedConfig;

const METADATA_TYPE_HDR_CLL: u64 = 1;
const METADATA_TYPE_HDR_MDCV: u64 = 2;

/// `metadata_hdr_cll` payload including the metadata type prefix.
pub fn encode_hdr_cll(cll: &ContentLightLevel) -> Vec<u8> {
    let mut payload = obu::leb128_encode(METADATA_TYPE_HDR_CLL);
    let mut w = BitWriter::new();
    w.write_bits(cll.max_content_light_level as u64, 16);
    w.write_bits(cll.max_frame_average_light_level as u64, 16);
    w.trailing_bits();
    payload.extend_from_slice(&w.finish());
    payload
}

/// `metadata_hdr_mdcv` payload including the metadata type prefix.
pub fn encode_hdr_mdcv(mdcv: &MasteringDisplay) -> Vec<u8> {
    let mut payload = obu::leb128_encode(METADATA_TYPE_HDR_MDCV);
    let mut w = BitWriter::new();
    for [x, y] in mdcv.primaries {
        w.write_bits(x as u64, 16);
        w.write_bits(y as u64, 16);
    }
    w.write_bits(mdcv.white_point[0] as u64, 16);
    w.write_bits(mdcv.white_point[1] as u64, 16);
    w.write_bits(mdcv.max_luminance as u64, 32);
    w.write_bits(mdcv.min_luminance as u64, 32);
    w.trailing_bits();
    payload.extend_from_slice(&w.finish());
    payload
}

/// Metadata OBUs for whatever HDR metadata the configuration carries, CLL first.
pub fn metadata_obus(config: &ResolvedConfig) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(cll) = &config.content_light {
        out.extend_from_slice(&obu::obu_wrap(ObuType::Metadata, &encode_hdr_cll(cll)));
    }
    if let Some(mdcv) = &config.mastering_display {
        out.extend_from_slice(&obu::obu_wrap(ObuType::Metadata, &encode_hdr_mdcv(mdcv)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodeConfig;

    const CLL: ContentLightLevel = ContentLightLevel {
        max_content_light_level: 1000,
        max_frame_average_light_level: 400,
    };

    const MDCV: MasteringDisplay = MasteringDisplay {
        primaries: [[34000, 16000], [13250, 34500], [7500, 3000]],
        white_point: [15635, 16450],
        max_luminance: 10_000_000,
        min_luminance: 1,
    };

    #[test]
    fn test_cll_payload_shape() {
        let payload = encode_hdr_cll(&CLL);
        assert_eq!(payload[0], 1);
        assert_eq!(&payload[1..5], &[0x03, 0xE8, 0x01, 0x90]);
        assert_eq!(payload.len(), 1 + 4 + 1);
    }

    #[test]
    fn test_mdcv_payload_shape() {
        let payload = encode_hdr_mdcv(&MDCV);
        assert_eq!(payload[0], 2);
        assert_eq!(payload.len(), 1 + 24 + 1);
    }

    #[test]
    fn test_no_metadata_by_default() {
        let config = EncodeConfig::default().normalize(64, 64).unwrap();
        assert!(metadata_obus(&config).is_empty());
    }

    #[test]
    fn test_both_obus_emitted() {
        let config = EncodeConfig::default()
            .with_bit_depth(10)
            .with_color_description(9, 16, 9)
            .with_content_light(CLL)
            .with_mastering_display(MDCV)
            .normalize(64, 64)
            .unwrap();
        let out = metadata_obus(&config);
        // CLL OBU: header + size + 6 payload bytes, then the MDCV OBU.
        assert_eq!(out[0], 0x2A);
        assert_eq!(out[1], 6);
        assert_eq!(out[8], 0x2A);
        assert_eq!(out[9], 26);
        assert_eq!(out.len(), 8 + 28);
    }
}
