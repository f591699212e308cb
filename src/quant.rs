//! Sample difference quantization
//!
//! Each context model input is a quantized neighbor difference. A quant
//! table maps a wrapped 8-bit difference to a signed level premultiplied
//! by the stride of that dimension, so a context number is just the sum of
//! the per-dimension lookups. Negative context numbers are folded onto
//! their positive mirror with a sign flip on the coded residual.

use crate::error::{Ffv1Error, Result};

/// Context model inputs supported per quant table.
pub const MAX_CONTEXT_INPUTS: usize = 5;

/// Quant table sets a stream may carry.
pub const MAX_QUANT_TABLES: usize = 8;

/// One set of per-dimension lookup tables.
#[derive(Clone, Debug)]
pub struct QuantTable {
    /// `lut[d][diff & 0xFF]` is the level of dimension `d` times the
    /// product of the sizes of dimensions below it.
    lut: [[i16; 256]; MAX_CONTEXT_INPUTS],
    /// Number of active dimensions, 3 or 5.
    inputs: usize,
    /// Distinct non-negative context numbers.
    context_count: usize,
}

/// Symmetric quantizer with levels at powers of two.
///
/// `max_level` of 5 yields the standard 11-level quantizer, 2 yields the
/// 5-level one used for the fourth and fifth dimensions.
fn quantize(d: i32, max_level: i32) -> i32 {
    if d == 0 {
        return 0;
    }
    let mag = d.unsigned_abs();
    let level = ((32 - mag.leading_zeros()) as i32).min(max_level);
    if d < 0 {
        -level
    } else {
        level
    }
}

impl QuantTable {
    /// Build a table from per-dimension quantizer level bounds.
    ///
    /// `max_levels[d]` of 0 disables dimension `d` and all above it; the
    /// first two dimensions are always required.
    pub fn from_levels(max_levels: [i32; MAX_CONTEXT_INPUTS]) -> Result<Self> {
        let mut inputs = MAX_CONTEXT_INPUTS;
        for (d, &m) in max_levels.iter().enumerate() {
            if m == 0 {
                inputs = d;
                break;
            }
        }
        if inputs < 3 {
            return Err(Ffv1Error::config("quant table needs at least 3 inputs"));
        }
        for d in inputs..MAX_CONTEXT_INPUTS {
            if max_levels[d] != 0 {
                return Err(Ffv1Error::config("quant table dimensions must be contiguous"));
            }
        }

        let mut lut = [[0i16; 256]; MAX_CONTEXT_INPUTS];
        let mut stride: i32 = 1;
        for d in 0..inputs {
            let size = 2 * max_levels[d] + 1;
            for raw in 0..256i32 {
                let diff = raw as i8 as i32;
                lut[d][raw as usize] = (quantize(diff, max_levels[d]) * stride) as i16;
            }
            stride *= size;
        }

        Ok(Self {
            lut,
            inputs,
            context_count: (stride as usize + 1) / 2,
        })
    }

    /// The default 3-input table: 11 levels in each dimension.
    pub fn default_3input() -> Self {
        Self::from_levels([5, 5, 5, 0, 0]).unwrap_or_else(|_| unreachable!())
    }

    /// The default 5-input table: 11 levels for the first three dimensions,
    /// 5 levels for the last two.
    pub fn default_5input() -> Self {
        Self::from_levels([5, 5, 5, 2, 2]).unwrap_or_else(|_| unreachable!())
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Distinct context numbers after sign folding.
    pub fn context_count(&self) -> usize {
        self.context_count
    }

    #[inline]
    fn dim(&self, d: usize, diff: i32) -> i32 {
        self.lut[d][(diff & 0xFF) as usize] as i32
    }

    /// Context number from the three nearest neighbor differences.
    /// Negative results are the caller's cue to negate and flip the sign
    /// of the residual.
    #[inline]
    pub fn context3(&self, l: i32, t: i32, tl: i32, tr: i32) -> i32 {
        self.dim(0, l - tl) + self.dim(1, tl - t) + self.dim(2, t - tr)
    }

    /// Context number extended with the two second-order differences.
    #[inline]
    pub fn context5(&self, ll: i32, l: i32, tl: i32, t: i32, tr: i32, tt: i32) -> i32 {
        self.context3(l, t, tl, tr) + self.dim(3, ll - l) + self.dim(4, tt - t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_levels() {
        assert_eq!(quantize(0, 5), 0);
        assert_eq!(quantize(1, 5), 1);
        assert_eq!(quantize(-1, 5), -1);
        assert_eq!(quantize(2, 5), 2);
        assert_eq!(quantize(3, 5), 2);
        assert_eq!(quantize(4, 5), 3);
        assert_eq!(quantize(8, 5), 4);
        assert_eq!(quantize(16, 5), 5);
        assert_eq!(quantize(127, 5), 5);
        assert_eq!(quantize(-127, 5), -5);
        assert_eq!(quantize(3, 2), 2);
        assert_eq!(quantize(100, 2), 2);
    }

    #[test]
    fn test_default_context_counts() {
        let t3 = QuantTable::default_3input();
        assert_eq!(t3.inputs(), 3);
        assert_eq!(t3.context_count(), 666);

        let t5 = QuantTable::default_5input();
        assert_eq!(t5.inputs(), 5);
        assert_eq!(t5.context_count(), 16638);
    }

    #[test]
    fn test_context_zero_for_flat_neighborhood() {
        let t = QuantTable::default_3input();
        assert_eq!(t.context3(7, 7, 7, 7), 0);

        let t5 = QuantTable::default_5input();
        assert_eq!(t5.context5(7, 7, 7, 7, 7, 7), 0);
    }

    #[test]
    fn test_context_symmetry() {
        let t = QuantTable::default_3input();
        // Negating every difference negates the context number.
        let c = t.context3(10, 3, 6, 1);
        let n = t.context3(-10, -3, -6, -1);
        assert_eq!(c, -n);
    }

    #[test]
    fn test_context_stays_in_range() {
        let t = QuantTable::default_3input();
        let count = t.context_count() as i32;
        for l in [-200i32, -17, 0, 5, 255] {
            for tval in [-128i32, 0, 99, 255] {
                for tl in [-1i32, 0, 200] {
                    for tr in [0i32, 64, 255] {
                        let c = t.context3(l, tval, tl, tr);
                        assert!(c.abs() < count, "context {} out of range", c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_rejects_sparse_dimensions() {
        assert!(QuantTable::from_levels([5, 5, 0, 2, 0]).is_err());
        assert!(QuantTable::from_levels([5, 0, 0, 0, 0]).is_err());
    }
}
