//! Bit-level reading and writing
//!
//! MSB-first bit I/O used by the Golomb-Rice coding mode. Reads past the end
//! of the input surface [`Ffv1Error::BitstreamExhausted`], which is how a
//! truncated slice buffer is detected.

use crate::error::{Ffv1Error, Result};

/// Bitstream reader
pub struct BitReader<'a> {
    /// Input data
    data: &'a [u8],
    /// Current byte position
    pos: usize,
    /// Current bit position within byte (0-7)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// Create new bitstream reader
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_pos: 0,
        }
    }

    /// Read a single bit
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.data.len() {
            return Err(Ffv1Error::BitstreamExhausted);
        }

        let byte = self.data[self.pos];
        let bit = (byte >> (7 - self.bit_pos)) & 1;

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.pos += 1;
        }

        Ok(bit != 0)
    }

    /// Read up to 32 bits as u32
    #[inline]
    pub fn read_bits(&mut self, num_bits: u32) -> Result<u32> {
        debug_assert!(num_bits <= 32);

        let mut value = 0u32;
        for _ in 0..num_bits {
            value = (value << 1) | (self.read_bit()? as u32);
        }
        Ok(value)
    }

    /// Get current byte position
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Check if more data is available
    pub fn has_more(&self) -> bool {
        self.pos < self.data.len()
    }
}

/// Bitstream writer
pub struct BitWriter {
    /// Output buffer
    data: Vec<u8>,
    /// Current byte being written
    current_byte: u8,
    /// Current bit position within byte (0-7)
    bit_pos: u8,
}

impl BitWriter {
    /// Create new bitstream writer
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            current_byte: 0,
            bit_pos: 0,
        }
    }

    /// Write a single bit
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.current_byte |= 1 << (7 - self.bit_pos);
        }

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_pos = 0;
        }
    }

    /// Write the low `num_bits` of `value`, MSB first
    #[inline]
    pub fn write_bits(&mut self, value: u32, num_bits: u32) {
        debug_assert!(num_bits <= 32);
        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1;
            self.write_bit(bit != 0);
        }
    }

    /// Flush the partial byte (zero-padded) and return the written data
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_pos != 0 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_pos = 0;
        }
        self.data
    }

    /// Current size in bytes, counting the partial byte
    pub fn len(&self) -> usize {
        self.data.len() + if self.bit_pos > 0 { 1 } else { 0 }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.bit_pos == 0
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}
