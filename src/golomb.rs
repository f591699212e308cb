//! Golomb-Rice coding mode
//!
//! The variable-length alternative to the range coder for 8-bit content.
//! Residuals are coded as signed Golomb-Rice codes with a per-context
//! adaptive Rice parameter, and flat regions collapse into run-length
//! codes whose length granularity walks the `LOG2_RUN` ladder.

use crate::bitio::{BitReader, BitWriter};
use crate::error::Result;

/// Run length granularity ladder, indexed by the run index.
pub const LOG2_RUN: [u32; 41] = [
    0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8,
    9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
];

/// Escape threshold for the unary prefix of an unsigned Golomb-Rice code.
const PREFIX_LIMIT: u32 = 12;

/// Mask the low `bits` of `n` and sign-extend the result.
#[inline]
pub fn sign_extend(n: i32, bits: u32) -> i32 {
    if bits == 8 {
        n as i8 as i32
    } else {
        (n << (32 - bits)) >> (32 - bits)
    }
}

/// Fold a residual into the signed `bits`-wide window.
#[inline]
pub fn fold(diff: i32, bits: u32) -> i32 {
    sign_extend(diff, bits)
}

// ============================================================================
// Per-context Rice state
// ============================================================================

/// Adaptive state for one VLC context.
///
/// `count` controls the adaptation speed and the Rice parameter estimate,
/// `error_sum` tracks residual magnitude, `drift`/`bias` center the
/// residual distribution. All four halve together when `count` reaches 16,
/// so `count` stays in `1..=16` and the estimator keeps a short memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiceState {
    pub drift: i32,
    pub error_sum: i32,
    pub bias: i32,
    pub count: i32,
}

impl Default for RiceState {
    fn default() -> Self {
        Self {
            drift: 0,
            error_sum: 4,
            bias: 0,
            count: 1,
        }
    }
}

impl RiceState {
    /// Rice parameter k for the next symbol.
    #[inline]
    fn estimate_k(&self) -> u32 {
        let mut k = 0;
        let mut i = self.count;
        while i < self.error_sum {
            k += 1;
            i += i;
        }
        k
    }

    /// Fold `v` into the context statistics. Identical on the encode and
    /// decode path, which is what keeps the two k estimates in lockstep.
    fn update(&mut self, v: i32) {
        self.error_sum += v.abs();
        self.drift += v;

        self.count += 1;
        if self.count == 16 {
            self.count >>= 1;
            self.drift >>= 1;
            self.error_sum >>= 1;
        }

        if self.drift <= -self.count {
            self.bias = (self.bias - 1).max(-128);
            self.drift = (self.drift + self.count).max(-self.count + 1);
        } else if self.drift > 0 {
            self.bias = (self.bias + 1).min(127);
            self.drift = (self.drift - self.count).min(0);
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Golomb-Rice decoder for one slice.
pub struct GolombRiceCoder<'a> {
    reader: BitReader<'a>,
    run_mode: u8,
    run_count: i32,
    run_index: usize,
    x: u32,
    width: u32,
}

impl<'a> GolombRiceCoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
            run_mode: 0,
            run_count: 0,
            run_index: 0,
            x: 0,
            width: 0,
        }
    }

    /// Reset for a new plane. The run index survives across lines but not
    /// across planes.
    pub fn new_plane(&mut self, width: u32) {
        self.width = width;
        self.run_index = 0;
    }

    fn new_run(&mut self) {
        self.run_mode = 0;
        self.run_count = 0;
    }

    /// Runs never cross line boundaries.
    pub fn new_line(&mut self) {
        self.new_run();
        self.x = 0;
    }

    /// Decode the next signed residual for `context`.
    pub fn sg(&mut self, context: i32, state: &mut RiceState, bits: u32) -> Result<i32> {
        if context == 0 && self.run_mode == 0 {
            self.run_mode = 1;
        }

        if self.run_mode != 0 {
            if self.run_count == 0 && self.run_mode == 1 {
                if self.reader.read_bit()? {
                    self.run_count = 1 << LOG2_RUN[self.run_index];
                    if self.x + self.run_count as u32 <= self.width {
                        self.run_index += 1;
                    }
                } else {
                    self.run_count = if LOG2_RUN[self.run_index] != 0 {
                        self.reader.read_bits(LOG2_RUN[self.run_index])? as i32
                    } else {
                        0
                    };
                    if self.run_index != 0 {
                        self.run_index -= 1;
                    }
                    self.run_mode = 2;
                }
            }

            self.run_count -= 1;
            if self.run_count < 0 {
                self.new_run();
                let mut diff = self.get_vlc_symbol(state, bits)?;
                if diff >= 0 {
                    diff += 1;
                }
                self.x += 1;
                Ok(diff)
            } else {
                self.x += 1;
                Ok(0)
            }
        } else {
            self.x += 1;
            self.get_vlc_symbol(state, bits)
        }
    }

    fn get_vlc_symbol(&mut self, state: &mut RiceState, bits: u32) -> Result<i32> {
        let k = state.estimate_k();
        let mut v = self.get_sr_golomb(k, bits)?;

        if 2 * state.drift < -state.count {
            v = -1 - v;
        }

        let ret = sign_extend(v + state.bias, bits);
        state.update(v);
        Ok(ret)
    }

    fn get_sr_golomb(&mut self, k: u32, bits: u32) -> Result<i32> {
        let v = self.get_ur_golomb(k, bits)?;
        if v & 1 == 1 {
            Ok(-(v >> 1) - 1)
        } else {
            Ok(v >> 1)
        }
    }

    fn get_ur_golomb(&mut self, k: u32, bits: u32) -> Result<i32> {
        for prefix in 0..PREFIX_LIMIT {
            if self.reader.read_bit()? {
                return Ok(self.reader.read_bits(k)? as i32 + ((prefix << k) as i32));
            }
        }
        Ok(self.reader.read_bits(bits)? as i32 + 11)
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Golomb-Rice encoder for one slice. Mirrors the decoder's run state
/// machine so both walk the `LOG2_RUN` ladder at the same positions.
pub struct GolombRiceEncoder {
    writer: BitWriter,
    run_mode: u8,
    run_count: i32,
    run_index: usize,
}

impl GolombRiceEncoder {
    pub fn new() -> Self {
        Self {
            writer: BitWriter::new(),
            run_mode: 0,
            run_count: 0,
            run_index: 0,
        }
    }

    pub fn new_plane(&mut self, _width: u32) {
        self.run_index = 0;
    }

    /// Encode the residual for `context`. The caller must call
    /// [`Self::end_line`] before moving to the next line.
    pub fn sg(&mut self, context: i32, state: &mut RiceState, diff: i32, bits: u32) {
        if context == 0 && self.run_mode == 0 {
            self.run_mode = 1;
        }

        let mut diff = diff;
        if self.run_mode != 0 {
            if diff == 0 {
                self.run_count += 1;
                return;
            }
            self.flush_full_runs();
            self.writer
                .write_bits(self.run_count as u32, 1 + LOG2_RUN[self.run_index]);
            if self.run_index > 0 {
                self.run_index -= 1;
            }
            self.run_count = 0;
            self.run_mode = 0;
            if diff > 0 {
                diff -= 1;
            }
        }

        self.put_vlc_symbol(state, diff, bits);
    }

    /// Flush a pending run at the end of a line and reset per-line state.
    pub fn end_line(&mut self) {
        if self.run_mode != 0 {
            self.flush_full_runs();
            if self.run_count != 0 {
                self.writer.write_bit(true);
            }
        }
        self.run_mode = 0;
        self.run_count = 0;
    }

    fn flush_full_runs(&mut self) {
        while self.run_count >= 1 << LOG2_RUN[self.run_index] {
            self.run_count -= 1 << LOG2_RUN[self.run_index];
            self.run_index += 1;
            self.writer.write_bit(true);
        }
    }

    fn put_vlc_symbol(&mut self, state: &mut RiceState, v: i32, bits: u32) {
        let v = fold(v - state.bias, bits);
        let k = state.estimate_k();
        let code = v ^ ((2 * state.drift + state.count) >> 31);
        state.update(v);
        self.set_sr_golomb(code, k, bits);
    }

    fn set_sr_golomb(&mut self, v: i32, k: u32, bits: u32) {
        let v = if v < 0 { -2 * v - 1 } else { 2 * v };
        self.set_ur_golomb(v as u32, k, bits);
    }

    fn set_ur_golomb(&mut self, v: u32, k: u32, bits: u32) {
        let prefix = v >> k;
        if prefix < PREFIX_LIMIT {
            // prefix zeros, a one, then the k low bits.
            self.writer
                .write_bits((1 << k) | (v & ((1 << k) - 1)), prefix + k + 1);
        } else {
            self.writer.write_bits(v - 11, PREFIX_LIMIT + bits);
        }
    }

    /// Flush the trailing partial byte and return the bitstream.
    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

impl Default for GolombRiceEncoder {
    fn default() -> Self {
        Self::new()
    }
}
