//! Stream configuration
//!
//! Everything the per-slice coders need that is decided once per stream:
//! geometry parameters, plane layout, entropy backend, quant tables, and
//! the version-keyed compatibility switches. Parsed from stream headers
//! by the caller; validated here before any slice state is built.

use crate::context::MAX_PLANES;
use crate::error::{Ffv1Error, Result};
use crate::quant::{QuantTable, MAX_QUANT_TABLES};
use crate::rangecoder::CONTEXT_SIZE;
use crate::slice::need_new_slice_split;

/// Entropy backend selector.
#[derive(Clone, Debug)]
pub enum CoderType {
    /// Bit-oriented Golomb-Rice coding. 8-bit content only.
    GolombRice,
    /// Range coder with the built-in state transition table.
    Range,
    /// Range coder with a per-stream transition table from the header.
    RangeCustomTable(Box<[u8; 256]>),
}

impl CoderType {
    pub fn is_golomb_rice(&self) -> bool {
        matches!(self, CoderType::GolombRice)
    }
}

/// Per-plane bit widths and masks for one slice, plus the offset applied
/// to the chroma-like planes under the reversible color transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitsPerPlane {
    pub bits: [u32; MAX_PLANES],
    pub offset: i32,
    pub mask: [u32; MAX_PLANES],
}

/// Stream-level configuration.
#[derive(Clone, Debug)]
pub struct CodecParams {
    pub width: u32,
    pub height: u32,
    /// 0 means 8.
    pub bits_per_raw_sample: u32,
    /// 1 (gray) or 3 (YCbCr or RGB-like).
    pub plane_count: usize,
    pub transparency: bool,
    pub chroma_h_shift: u32,
    pub chroma_v_shift: u32,
    pub num_h_slices: u32,
    pub num_v_slices: u32,
    pub version: u16,
    pub micro_version: u16,
    pub coder: CoderType,
    /// True for RGB-like content coded through the reversible color
    /// transform, which widens the chroma-like planes.
    pub rct: bool,
    pub quant_tables: Vec<QuantTable>,
    /// Quant table selection per plane.
    pub quant_table_index: [usize; MAX_PLANES],
    /// Optional per-quant-table context state templates for range mode.
    pub initial_states: Vec<Option<Vec<[u8; CONTEXT_SIZE]>>>,
    /// Optional effective symbol counts per plane from a lossless remap.
    pub remap_count: Option<[u32; MAX_PLANES]>,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            bits_per_raw_sample: 8,
            plane_count: 3,
            transparency: false,
            chroma_h_shift: 0,
            chroma_v_shift: 0,
            num_h_slices: 1,
            num_v_slices: 1,
            version: 4,
            micro_version: 8,
            coder: CoderType::Range,
            rct: false,
            quant_tables: vec![QuantTable::default_3input()],
            quant_table_index: [0; MAX_PLANES],
            initial_states: vec![None],
            remap_count: None,
        }
    }
}

impl CodecParams {
    /// Version and micro version packed for ordered comparison.
    pub fn combined_version(&self) -> u32 {
        ((self.version as u32) << 16) | self.micro_version as u32
    }

    /// Effective sample bit depth.
    pub fn sample_bits(&self) -> u32 {
        if self.bits_per_raw_sample == 0 {
            8
        } else {
            self.bits_per_raw_sample
        }
    }

    /// Total coded planes including the alpha plane.
    pub fn total_planes(&self) -> usize {
        self.plane_count + self.transparency as usize
    }

    pub fn is_chroma_plane(&self, p: usize) -> bool {
        self.plane_count == 3 && (p == 1 || p == 2)
    }

    /// Validate the configuration before building slice state.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Ffv1Error::config("zero frame dimension"));
        }
        if self.bits_per_raw_sample > 16 {
            return Err(Ffv1Error::config("bit depth above 16 is not supported"));
        }
        if self.plane_count != 1 && self.plane_count != 3 {
            return Err(Ffv1Error::config("plane count must be 1 or 3"));
        }
        if self.chroma_h_shift > 2 || self.chroma_v_shift > 2 {
            return Err(Ffv1Error::config("chroma shift above 2"));
        }
        if self.num_h_slices == 0
            || self.num_v_slices == 0
            || self.num_h_slices > self.width
            || self.num_v_slices > self.height
        {
            return Err(Ffv1Error::config("invalid slice grid"));
        }
        if self.quant_tables.is_empty() || self.quant_tables.len() > MAX_QUANT_TABLES {
            return Err(Ffv1Error::config("quant table count out of range"));
        }
        if self.initial_states.len() != self.quant_tables.len() {
            return Err(Ffv1Error::config(
                "initial state templates must match quant table count",
            ));
        }
        for (ti, states) in self.initial_states.iter().enumerate() {
            if let Some(s) = states {
                if s.len() != self.quant_tables[ti].context_count() {
                    return Err(Ffv1Error::config("initial state template size mismatch"));
                }
            }
        }
        for p in 0..self.total_planes() {
            if self.quant_table_index[p] >= self.quant_tables.len() {
                return Err(Ffv1Error::config("quant table index out of range"));
            }
        }
        if self.coder.is_golomb_rice() && self.sample_bits() > 8 {
            return Err(Ffv1Error::config(
                "golomb rice mode requires 8-bit samples",
            ));
        }
        if self.remap_count.is_some() && self.sample_bits() <= 8 {
            return Err(Ffv1Error::config("remap requires more than 8 bits"));
        }
        if need_new_slice_split(self.width, self.num_h_slices, self.chroma_h_shift)
            || need_new_slice_split(self.height, self.num_v_slices, self.chroma_v_shift)
        {
            return Err(Ffv1Error::BadSliceSplit {
                num_h: self.num_h_slices,
                num_v: self.num_v_slices,
                width: self.width,
                height: self.height,
                chroma_h_shift: self.chroma_h_shift,
            });
        }
        Ok(())
    }

    /// Per-plane coded bit widths, masks, and the color transform offset.
    ///
    /// The transform widens plane 1 and 2 to hold sums of two sample
    /// ranges. Streams older than 4.8 over-allocate one extra bit on
    /// plane 0 (and the alpha plane); that off-by-one must be reproduced
    /// exactly or the coders desync.
    pub fn compute_bits_per_plane(&self, slice_coding_mode: u8) -> BitsPerPlane {
        let default_count = 1u32 << self.sample_bits();
        let mut remap = [default_count; MAX_PLANES];
        if let Some(counts) = self.remap_count {
            remap = counts;
        }

        let mut bits = [0u32; MAX_PLANES];
        for p in 0..MAX_PLANES {
            bits[p] = ceil_log2(remap[p]);
        }

        let mut offset = 0i32;
        if slice_coding_mode == 0 && self.rct && self.plane_count >= 3 {
            bits[0] = ceil_log2(remap[0].max(remap[1]).max(remap[2]));
            bits[1] = ceil_log2(remap[0] + remap[1]);
            bits[2] = ceil_log2(remap[0] + remap[2]);
            offset = remap[0] as i32;

            if self.combined_version() < 0x40008 {
                bits[0] += 1;
                if self.transparency {
                    bits[3] += 1;
                }
            }
        }

        let mut mask = [0u32; MAX_PLANES];
        for p in 0..MAX_PLANES {
            mask[p] = (1u32 << bits[p]) - 1;
        }

        BitsPerPlane { bits, offset, mask }
    }
}

/// Smallest `b` with `2^b >= n`, 0 for `n <= 1`.
#[inline]
pub fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        32 - (n - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> CodecParams {
        CodecParams {
            width: 64,
            height: 48,
            ..Default::default()
        }
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(256), 8);
        assert_eq!(ceil_log2(257), 9);
        assert_eq!(ceil_log2(1 << 16), 16);
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let mut p = base_params();
        p.width = 0;
        assert!(p.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_validate_rejects_rice_above_8_bits() {
        let mut p = base_params();
        p.coder = CoderType::GolombRice;
        p.bits_per_raw_sample = 10;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_bits_plain_8bit() {
        let p = base_params();
        let b = p.compute_bits_per_plane(0);
        assert_eq!(b.bits, [8, 8, 8, 8]);
        assert_eq!(b.offset, 0);
        assert_eq!(b.mask, [255, 255, 255, 255]);
    }

    #[test]
    fn test_bits_zero_depth_means_8() {
        let mut p = base_params();
        p.bits_per_raw_sample = 0;
        let b = p.compute_bits_per_plane(0);
        assert_eq!(b.bits, [8, 8, 8, 8]);
    }

    #[test]
    fn test_bits_rct_widens_chroma() {
        let mut p = base_params();
        p.rct = true;
        let b = p.compute_bits_per_plane(0);
        assert_eq!(b.bits[0], 8);
        assert_eq!(b.bits[1], 9);
        assert_eq!(b.bits[2], 9);
        assert_eq!(b.offset, 256);
        assert_eq!(b.mask[1], 511);
    }

    #[test]
    fn test_bits_legacy_quirk() {
        let mut old = base_params();
        old.rct = true;
        old.version = 4;
        old.micro_version = 7;

        let mut new = old.clone();
        new.micro_version = 8;

        let ob = old.compute_bits_per_plane(0);
        let nb = new.compute_bits_per_plane(0);
        assert_eq!(ob.bits[0], nb.bits[0] + 1);
        assert_eq!(ob.bits[1], nb.bits[1]);
    }

    #[test]
    fn test_bits_legacy_quirk_transparency() {
        let mut p = base_params();
        p.rct = true;
        p.transparency = true;
        p.micro_version = 7;
        let b = p.compute_bits_per_plane(0);
        assert_eq!(b.bits[3], 9);
    }

    #[test]
    fn test_bits_raw_mode_skips_rct() {
        let mut p = base_params();
        p.rct = true;
        let b = p.compute_bits_per_plane(1);
        assert_eq!(b.bits, [8, 8, 8, 8]);
        assert_eq!(b.offset, 0);
    }

    #[test]
    fn test_combined_version() {
        let mut p = base_params();
        p.version = 4;
        p.micro_version = 3;
        assert_eq!(p.combined_version(), 0x40003);
        assert!(p.combined_version() < 0x40008);
    }
}
