//! Slice geometry and per-slice state
//!
//! A frame is tiled into an N by M grid of slices. Slice edges land on
//! chroma block boundaries so every plane tiles exactly, using a rounding
//! rule keyed by the stream version. Each slice owns its context tables
//! and prediction scratch rows; nothing is shared between slices, which
//! is what makes slice-parallel coding safe.

use crate::config::CodecParams;
use crate::context::{PlaneContext, MAX_PLANES};
use crate::error::{Ffv1Error, Result};

/// Streams older than 4.3 use the unaligned split rule.
const ALIGNED_SPLIT_VERSION: u32 = 0x40003;

/// Left or top edge of slice `index` out of `num` across `size` pixels.
///
/// The current rule rounds edges to multiples of the chroma block
/// (`1 << shift`) against the block-aligned size, then maps the aligned
/// end back to the true size. The legacy rule is plain proportional
/// division with no alignment guarantee and is kept for old streams.
pub fn slice_coord(combined_version: u32, size: u32, index: u32, num: u32, shift: u32) -> u32 {
    if combined_version < ALIGNED_SPLIT_VERSION {
        return size * index / num;
    }

    let mpw = 1u64 << shift;
    let awidth = (size as u64 + mpw - 1) & !(mpw - 1);
    let s = (2 * awidth * index as u64 + num as u64 * mpw) / (2 * num as u64 * mpw) * mpw;

    if s == awidth {
        size
    } else {
        s as u32
    }
}

/// True when `num` slices cannot fit across `size` with every edge on a
/// chroma block boundary, however the edges are rounded. The caller must
/// then pick a different slice count.
pub fn need_new_slice_split(size: u32, num: u32, shift: u32) -> bool {
    if num == 0 {
        return true;
    }
    let mpw = 1u32 << shift;
    let awidth = (size + mpw - 1) & !(mpw - 1);
    awidth / mpw < num
}

/// Pixel-space rectangle of one slice plus its grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceGeometry {
    pub sx: u32,
    pub sy: u32,
    pub slice_x: u32,
    pub slice_y: u32,
    pub slice_width: u32,
    pub slice_height: u32,
}

/// Rectangle of one plane inside a slice, after chroma subsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[inline]
fn ceil_rshift(v: u32, shift: u32) -> u32 {
    (v + (1 << shift) - 1) >> shift
}

impl SliceGeometry {
    /// Compute the rectangle for grid cell `(sx, sy)`.
    pub fn compute(params: &CodecParams, sx: u32, sy: u32) -> Result<Self> {
        let cv = params.combined_version();
        let x0 = slice_coord(cv, params.width, sx, params.num_h_slices, params.chroma_h_shift);
        let x1 = slice_coord(cv, params.width, sx + 1, params.num_h_slices, params.chroma_h_shift);
        let y0 = slice_coord(cv, params.height, sy, params.num_v_slices, params.chroma_v_shift);
        let y1 = slice_coord(cv, params.height, sy + 1, params.num_v_slices, params.chroma_v_shift);

        if x1 <= x0 || y1 <= y0 {
            return Err(Ffv1Error::BadSliceSplit {
                num_h: params.num_h_slices,
                num_v: params.num_v_slices,
                width: params.width,
                height: params.height,
                chroma_h_shift: params.chroma_h_shift,
            });
        }

        Ok(Self {
            sx,
            sy,
            slice_x: x0,
            slice_y: y0,
            slice_width: x1 - x0,
            slice_height: y1 - y0,
        })
    }

    /// The subsampled rectangle this slice covers in plane `p`.
    pub fn plane_rect(&self, params: &CodecParams, p: usize) -> PlaneRect {
        let (hs, vs) = if params.is_chroma_plane(p) {
            (params.chroma_h_shift, params.chroma_v_shift)
        } else {
            (0, 0)
        };

        let x = self.slice_x >> hs;
        let y = self.slice_y >> vs;
        PlaneRect {
            x,
            y,
            width: ceil_rshift(self.slice_x + self.slice_width, hs) - x,
            height: ceil_rshift(self.slice_y + self.slice_height, vs) - y,
        }
    }
}

/// Rotating prediction rows per plane. The current line and two above it
/// are enough for both the 3-input and 5-input context models.
pub const SCRATCH_ROWS: usize = 3;

/// Horizontal padding on each side of a scratch row. Reads reach two
/// samples left and one sample right of the line.
pub const SCRATCH_PAD: usize = 3;

/// All mutable per-slice state: context tables and prediction scratch.
#[derive(Debug)]
pub struct SliceState {
    pub geometry: SliceGeometry,
    pub planes: Vec<PlaneContext>,
    /// Row scratch, `SCRATCH_ROWS` rows of `slice_width + 2 * SCRATCH_PAD`
    /// samples per plane. Zeroed at the start of every slice pass so the
    /// virtual line above the slice reads as zero.
    pub sample_buffer: Vec<i32>,
    /// 0 codes through the predictor, 1 is raw sample passthrough.
    pub slice_coding_mode: u8,
}

impl SliceState {
    pub fn new(params: &CodecParams, sx: u32, sy: u32) -> Result<Self> {
        let geometry = SliceGeometry::compute(params, sx, sy)?;

        let mut planes = Vec::with_capacity(params.total_planes());
        for p in 0..params.total_planes() {
            let ti = params.quant_table_index[p];
            let count = params.quant_tables[ti].context_count();
            planes.push(if params.coder.is_golomb_rice() {
                PlaneContext::new_rice(ti, count)
            } else {
                PlaneContext::new_range(ti, count)
            });
        }

        let stride = geometry.slice_width as usize + 2 * SCRATCH_PAD;
        Ok(Self {
            geometry,
            planes,
            sample_buffer: vec![0i32; stride * SCRATCH_ROWS * MAX_PLANES],
            slice_coding_mode: 0,
        })
    }

    /// Scratch row stride in samples.
    pub fn row_stride(&self) -> usize {
        self.geometry.slice_width as usize + 2 * SCRATCH_PAD
    }

    /// Reset context state before coding a frame. Contexts never persist
    /// across frames; they adapt only within one slice of one frame.
    pub fn clear(&mut self, params: &CodecParams) {
        for plane in &mut self.planes {
            let template = params.initial_states[plane.quant_table_index].as_deref();
            plane.clear(template);
        }
        self.sample_buffer.fill(0);
    }
}

/// Build the slice grid for the configured dimensions.
pub fn init_slice_states(params: &CodecParams) -> Result<Vec<SliceState>> {
    let mut slices =
        Vec::with_capacity((params.num_h_slices * params.num_v_slices) as usize);
    for sy in 0..params.num_v_slices {
        for sx in 0..params.num_h_slices {
            slices.push(SliceState::new(params, sx, sy)?);
        }
    }
    Ok(slices)
}
