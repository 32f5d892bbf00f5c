//! OBU framing: the one-byte OBU header and LEB128 size field.

use super::bitwriter::BitWriter;

/// OBU types used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObuType {
    SequenceHeader = 1,
    TemporalDelimiter = 2,
    Metadata = 5,
    Padding = 15,
}

/// Encode `value` as unsigned LEB128.
pub fn leb128_encode(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Prefix `payload` with an OBU header (no extension, `obu_has_size_field` set)
/// and its LEB128 size.
pub fn obu_wrap(obu_type: ObuType, payload: &[u8]) -> Vec<u8> {
    let mut header = BitWriter::new();
    header.write_bit(false); // obu_forbidden_bit
    header.write_bits(obu_type as u64, 4);
    header.write_bit(false); // obu_extension_flag
    header.write_bit(true); // obu_has_size_field
    header.write_bit(false); // obu_reserved_1bit

    let mut out = header.finish();
    out.extend_from_slice(&leb128_encode(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

/// The empty temporal delimiter that opens every temporal unit.
pub fn temporal_delimiter() -> Vec<u8> {
    obu_wrap(ObuType::TemporalDelimiter, &[])
}
