//! MSB-first bit writer for OBU headers and metadata payloads.

/// Accumulates bits most-significant first into a byte vector.
#[derive(Default)]
pub struct BitWriter {
    data: Vec<u8>,
    current_byte: u8,
    bit_position: u8, // bits already placed in current_byte (0-7)
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the low `num_bits` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, num_bits: u8) {
        debug_assert!(num_bits <= 64);
        for i in (0..num_bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Write a single flag bit.
    pub fn write_bit(&mut self, bit: bool) {
        self.current_byte = (self.current_byte << 1) | u8::from(bit);
        self.bit_position += 1;
        if self.bit_position == 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_position = 0;
        }
    }

    /// AV1 `trailing_bits()`: a one bit, then zeros up to the next byte boundary.
    pub fn trailing_bits(&mut self) {
        self.write_bit(true);
        while self.bit_position != 0 {
            self.write_bit(false);
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8 + self.bit_position as usize
    }

    /// Consume the writer, zero-padding a partial final byte.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_position != 0 {
            self.current_byte <<= 8 - self.bit_position;
            self.data.push(self.current_byte);
        }
        self.data
    }
}
