//! Adaptive binary range coder
//!
//! Carry-less range coding with an 8-bit probability state per context cell.
//! Each non-trivial symbol is coded through a 32-cell context (zero flag,
//! unary exponent, sign, mantissa), with the per-cell probabilities adapted
//! through a shared transition table.
//!
//! The decoder keeps a 16-bit window and refills one byte per renorm step.
//! The encoder mirrors it with a 32-bit low accumulator and deferred carry
//! propagation through an outstanding byte.

use crate::error::{Ffv1Error, Result};

/// Cells per symbol context: zero flag, exponent unary, sign, mantissa.
pub const CONTEXT_SIZE: usize = 32;

// ============================================================================
// State transition table
// ============================================================================

/// Probability adaptation table shared by encoder and decoder.
///
/// `one_state[s]` is the next state after coding a one in state `s`,
/// `zero_state[s]` after coding a zero. The two halves mirror each other.
#[derive(Clone, Debug)]
pub struct StateTransition {
    zero_state: [u8; 256],
    one_state: [u8; 256],
}

impl StateTransition {
    /// Build the default table: adaptation factor 0.05 in 0.32 fixed
    /// point, probabilities clamped to `[8, 248]`. States outside that
    /// band are unreachable from the neutral start and stay unpopulated.
    pub fn new() -> Self {
        const FACTOR: i64 = 214_748_364;
        const MAX_P: i64 = 248;
        const ONE: i64 = 1 << 32;

        let mut one_state = [0u8; 256];

        let mut last_p8: i64 = 0;
        let mut p: i64 = ONE / 2;
        for _ in 0..128 {
            let mut p8 = (256 * p + ONE / 2) >> 32;
            if p8 <= last_p8 {
                p8 = last_p8 + 1;
            }
            if last_p8 != 0 && last_p8 < 256 && p8 <= MAX_P {
                one_state[last_p8 as usize] = p8 as u8;
            }
            p += ((ONE - p) * FACTOR + ONE / 2) >> 32;
            last_p8 = p8;
        }

        for i in (256 - MAX_P)..=MAX_P {
            if one_state[i as usize] != 0 {
                continue;
            }
            let mut p = (i * ONE + 128) >> 8;
            p += ((ONE - p) * FACTOR + ONE / 2) >> 32;
            let mut p8 = (256 * p + ONE / 2) >> 32;
            if p8 <= i {
                p8 = i + 1;
            }
            if p8 > MAX_P {
                p8 = MAX_P;
            }
            one_state[i as usize] = p8 as u8;
        }

        Self::from_one_state(&one_state)
    }

    /// Build a table from an explicit `one_state` half, mirroring the
    /// `zero_state` half from it. Used for custom per-stream tables.
    pub fn from_one_state(one_state: &[u8; 256]) -> Self {
        let mut zero_state = [0u8; 256];
        for i in 1..256usize {
            zero_state[i] = (256 - one_state[256 - i] as usize) as u8;
        }
        Self {
            zero_state,
            one_state: *one_state,
        }
    }

    #[inline]
    pub fn zero(&self, state: u8) -> u8 {
        self.zero_state[state as usize]
    }

    #[inline]
    pub fn one(&self, state: u8) -> u8 {
        self.one_state[state as usize]
    }
}

impl Default for StateTransition {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Range decoder over a byte slice.
///
/// Reads past the end of the buffer yield zero bytes, so a truncated
/// stream degrades into garbage samples rather than an error. Slice CRC
/// or size checks at a higher layer are responsible for rejection.
pub struct RangeDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    low: u16,
    rng: u16,
}

impl<'a> RangeDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let b0 = data.first().copied().unwrap_or(0) as u16;
        let b1 = data.get(1).copied().unwrap_or(0) as u16;
        let mut dec = Self {
            data,
            pos: 2,
            low: (b0 << 8) | b1,
            rng: 0xFF00,
        };
        // The code value always starts below the initial range, so this
        // branch is only reachable on foreign or corrupt input. Pin the
        // coder so every following bit decodes deterministically.
        if dec.low >= dec.rng {
            dec.low = dec.rng;
            dec.pos = data.len().saturating_sub(1).max(2);
        }
        dec
    }

    #[inline]
    fn refill(&mut self) {
        if self.rng < 0x100 {
            self.rng <<= 8;
            self.low <<= 8;
            self.low |= self.data.get(self.pos).copied().unwrap_or(0) as u16;
            self.pos += 1;
        }
    }

    /// Decode one bit through the adaptive state cell.
    #[inline]
    pub fn get(&mut self, state: &mut u8, transition: &StateTransition) -> bool {
        let r = ((self.rng as u32 * *state as u32) >> 8) as u16;
        if self.low < self.rng - r {
            self.rng -= r;
            *state = transition.zero(*state);
            self.refill();
            false
        } else {
            self.low -= self.rng - r;
            self.rng = r;
            *state = transition.one(*state);
            self.refill();
            true
        }
    }

    /// Decode a signed symbol through a 32-cell context.
    pub fn get_symbol(
        &mut self,
        state: &mut [u8; CONTEXT_SIZE],
        transition: &StateTransition,
        signed: bool,
    ) -> Result<i32> {
        if self.get(&mut state[0], transition) {
            return Ok(0);
        }

        let mut e: u32 = 0;
        while self.get(&mut state[1 + e.min(9) as usize], transition) {
            e += 1;
            if e > 31 {
                return Err(Ffv1Error::bitstream("symbol exponent out of range"));
            }
        }

        let mut a: u32 = 1;
        for i in (0..e).rev() {
            a = (a << 1)
                | (self.get(&mut state[22 + i.min(9) as usize], transition) as u32);
        }

        if signed && self.get(&mut state[11 + e.min(10) as usize], transition) {
            Ok(-(a as i32))
        } else {
            Ok(a as i32)
        }
    }

    /// Bytes consumed so far, rounded to the renorm boundary.
    pub fn bytes_read(&self) -> usize {
        self.pos.min(self.data.len())
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Range encoder producing a byte vector.
pub struct RangeEncoder {
    data: Vec<u8>,
    low: u32,
    rng: u32,
    outstanding_byte: i32,
    outstanding_count: u32,
}

impl RangeEncoder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            low: 0,
            rng: 0xFF00,
            outstanding_byte: -1,
            outstanding_count: 0,
        }
    }

    #[inline]
    fn renorm(&mut self) {
        while self.rng < 0x100 {
            if self.outstanding_byte < 0 {
                self.outstanding_byte = (self.low >> 8) as i32;
            } else if self.low <= 0xFF00 {
                self.data.push(self.outstanding_byte as u8);
                for _ in 0..self.outstanding_count {
                    self.data.push(0xFF);
                }
                self.outstanding_count = 0;
                self.outstanding_byte = (self.low >> 8) as i32;
            } else if self.low >= 0x10000 {
                self.data.push((self.outstanding_byte + 1) as u8);
                for _ in 0..self.outstanding_count {
                    self.data.push(0x00);
                }
                self.outstanding_count = 0;
                self.outstanding_byte = ((self.low >> 8) & 0xFF) as i32;
            } else {
                self.outstanding_count += 1;
            }
            self.low = (self.low & 0xFF) << 8;
            self.rng <<= 8;
        }
    }

    /// Encode one bit through the adaptive state cell.
    #[inline]
    pub fn put(&mut self, bit: bool, state: &mut u8, transition: &StateTransition) {
        let r = (self.rng * *state as u32) >> 8;
        if bit {
            self.low += self.rng - r;
            self.rng = r;
            *state = transition.one(*state);
        } else {
            self.rng -= r;
            *state = transition.zero(*state);
        }
        self.renorm();
    }

    /// Encode a signed symbol through a 32-cell context.
    pub fn put_symbol(
        &mut self,
        state: &mut [u8; CONTEXT_SIZE],
        transition: &StateTransition,
        v: i32,
        signed: bool,
    ) {
        if v == 0 {
            self.put(true, &mut state[0], transition);
            return;
        }
        self.put(false, &mut state[0], transition);

        let a = v.unsigned_abs();
        let e = 31 - a.leading_zeros();

        for i in 0..e {
            self.put(true, &mut state[1 + i.min(9) as usize], transition);
        }
        self.put(false, &mut state[1 + e.min(9) as usize], transition);

        for i in (0..e).rev() {
            let bit = (a >> i) & 1 != 0;
            self.put(bit, &mut state[22 + i.min(9) as usize], transition);
        }

        if signed {
            self.put(v < 0, &mut state[11 + e.min(10) as usize], transition);
        }
    }

    /// Flush the coder state and return the bitstream.
    ///
    /// Forces two renorm steps so both decoder prefetch bytes exist, then
    /// drains the held outstanding byte.
    pub fn finish(mut self) -> Vec<u8> {
        self.rng = 0xFF;
        self.low += 0xFF;
        self.renorm();
        self.rng = 0xFF;
        self.renorm();

        if self.outstanding_byte >= 0 {
            self.data.push(self.outstanding_byte as u8);
            for _ in 0..self.outstanding_count {
                self.data.push(0xFF);
            }
        }
        while self.data.len() < 2 {
            self.data.push(0);
        }
        self.data
    }

    /// Bytes emitted so far, not counting held carry bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}
