//! Codec orchestration
//!
//! Owns the validated configuration, the shared probability transition
//! table, and one [`SliceState`] per grid cell. Frames are coded slice by
//! slice; slices are fully independent, so both directions fan out across
//! a thread pool and join on the shared frame only to blit or collect.
//!
//! The per-pixel walk is the classic median-predicted context model: each
//! sample's residual is coded in a context picked from quantized neighbor
//! differences, through whichever entropy backend the stream selected.

use rayon::prelude::*;

use crate::config::{BitsPerPlane, CodecParams, CoderType};
use crate::error::{Ffv1Error, Result};
use crate::frame::{Frame, PlaneBuffer};
use crate::golomb::{fold, GolombRiceCoder, GolombRiceEncoder, RiceState};
use crate::quant::QuantTable;
use crate::rangecoder::{RangeDecoder, RangeEncoder, StateTransition, CONTEXT_SIZE};
use crate::slice::{init_slice_states, SliceState, SCRATCH_PAD, SCRATCH_ROWS};

/// Median of three, used as the spatial predictor.
#[inline]
fn mid_pred(a: i32, b: i32, c: i32) -> i32 {
    a.min(b).max(a.max(b).min(c))
}

/// Context for the current sample, negative when the residual sign must
/// be flipped before coding.
#[inline]
fn sample_context(
    quant: &QuantTable,
    buf: &[i32],
    cur: usize,
    prev: usize,
    prev2: usize,
    x: usize,
) -> i32 {
    let l = buf[cur + x - 1];
    let tl = buf[prev + x - 1];
    let t = buf[prev + x];
    let tr = buf[prev + x + 1];
    if quant.inputs() == 5 {
        quant.context5(buf[cur + x - 2], l, tl, t, tr, buf[prev2 + x])
    } else {
        quant.context3(l, t, tl, tr)
    }
}

#[inline]
fn predict(buf: &[i32], cur: usize, prev: usize, x: usize) -> i32 {
    let l = buf[cur + x - 1];
    let tl = buf[prev + x - 1];
    let t = buf[prev + x];
    mid_pred(l, l + t - tl, t)
}

// ============================================================================
// Line coding
// ============================================================================

fn decode_line_range(
    rc: &mut RangeDecoder,
    transition: &StateTransition,
    states: &mut [[u8; CONTEXT_SIZE]],
    quant: &QuantTable,
    buf: &mut [i32],
    cur: usize,
    prev: usize,
    prev2: usize,
    w: usize,
    mask: i32,
) -> Result<()> {
    for x in 0..w {
        let context = sample_context(quant, buf, cur, prev, prev2, x);
        let (context, sign) = if context < 0 {
            (-context, true)
        } else {
            (context, false)
        };

        let mut diff = rc.get_symbol(&mut states[context as usize], transition, true)?;
        if sign {
            diff = -diff;
        }
        buf[cur + x] = (predict(buf, cur, prev, x) + diff) & mask;
    }
    Ok(())
}

fn encode_line_range(
    rc: &mut RangeEncoder,
    transition: &StateTransition,
    states: &mut [[u8; CONTEXT_SIZE]],
    quant: &QuantTable,
    buf: &mut [i32],
    cur: usize,
    prev: usize,
    prev2: usize,
    w: usize,
    bits: u32,
) {
    for x in 0..w {
        let context = sample_context(quant, buf, cur, prev, prev2, x);
        let (context, sign) = if context < 0 {
            (-context, true)
        } else {
            (context, false)
        };

        let mut diff = buf[cur + x] - predict(buf, cur, prev, x);
        if sign {
            diff = -diff;
        }
        rc.put_symbol(
            &mut states[context as usize],
            transition,
            fold(diff, bits),
            true,
        );
    }
}

fn decode_line_rice(
    gc: &mut GolombRiceCoder,
    states: &mut [RiceState],
    quant: &QuantTable,
    buf: &mut [i32],
    cur: usize,
    prev: usize,
    prev2: usize,
    w: usize,
    bits: u32,
    mask: i32,
) -> Result<()> {
    for x in 0..w {
        let context = sample_context(quant, buf, cur, prev, prev2, x);
        let (context, sign) = if context < 0 {
            (-context, true)
        } else {
            (context, false)
        };

        let mut diff = gc.sg(context, &mut states[context as usize], bits)?;
        if sign {
            diff = -diff;
        }
        buf[cur + x] = (predict(buf, cur, prev, x) + diff) & mask;
    }
    Ok(())
}

fn encode_line_rice(
    gc: &mut GolombRiceEncoder,
    states: &mut [RiceState],
    quant: &QuantTable,
    buf: &mut [i32],
    cur: usize,
    prev: usize,
    prev2: usize,
    w: usize,
    bits: u32,
) {
    for x in 0..w {
        let context = sample_context(quant, buf, cur, prev, prev2, x);
        let (context, sign) = if context < 0 {
            (-context, true)
        } else {
            (context, false)
        };

        let mut diff = buf[cur + x] - predict(buf, cur, prev, x);
        if sign {
            diff = -diff;
        }
        gc.sg(context, &mut states[context as usize], fold(diff, bits), bits);
    }
    gc.end_line();
}

// ============================================================================
// Slice coding
// ============================================================================

/// Set the line borders the context reads depend on: the sample left of
/// the line mirrors the one above it, and the prediction row extends one
/// sample to the right.
#[inline]
fn set_line_borders(buf: &mut [i32], cur: usize, prev: usize, w: usize) {
    buf[cur - 1] = buf[prev];
    buf[prev + w] = buf[prev + w - 1];
}

#[inline]
fn scratch_origin(stride: usize, p: usize, row: usize) -> usize {
    (p * SCRATCH_ROWS + row) * stride + SCRATCH_PAD
}

fn decode_slice(
    params: &CodecParams,
    transition: &StateTransition,
    slice: &mut SliceState,
    data: &[u8],
) -> Result<Vec<PlaneBuffer>> {
    slice.clear(params);
    if params.coder.is_golomb_rice() {
        decode_slice_rice(params, slice, data)
    } else {
        decode_slice_range(params, transition, slice, data)
    }
}

fn decode_slice_range(
    params: &CodecParams,
    transition: &StateTransition,
    slice: &mut SliceState,
    data: &[u8],
) -> Result<Vec<PlaneBuffer>> {
    let bpp = params.compute_bits_per_plane(slice.slice_coding_mode);
    let geometry = slice.geometry;
    let stride = slice.row_stride();
    let SliceState {
        planes,
        sample_buffer,
        ..
    } = slice;

    let mut rc = RangeDecoder::new(data);
    let mut out = Vec::with_capacity(planes.len());
    for (p, plane) in planes.iter_mut().enumerate() {
        let rect = geometry.plane_rect(params, p);
        let quant = &params.quant_tables[plane.quant_table_index];
        let states = plane
            .range_states()
            .ok_or_else(|| Ffv1Error::config("context backend mismatch"))?;
        let w = rect.width as usize;
        let mut local = PlaneBuffer::new(rect.width, rect.height);

        for y in 0..rect.height as usize {
            let cur = scratch_origin(stride, p, y % 3);
            let prev = scratch_origin(stride, p, (y + 2) % 3);
            let prev2 = scratch_origin(stride, p, (y + 1) % 3);
            set_line_borders(sample_buffer, cur, prev, w);

            decode_line_range(
                &mut rc,
                transition,
                states,
                quant,
                sample_buffer,
                cur,
                prev,
                prev2,
                w,
                bpp.mask[p] as i32,
            )?;

            let row = local.index(0, y as u32);
            for x in 0..w {
                local.data[row + x] = sample_buffer[cur + x] as u32;
            }
        }
        out.push(local);
    }
    Ok(out)
}

fn decode_slice_rice(
    params: &CodecParams,
    slice: &mut SliceState,
    data: &[u8],
) -> Result<Vec<PlaneBuffer>> {
    let bpp = params.compute_bits_per_plane(slice.slice_coding_mode);
    let geometry = slice.geometry;
    let stride = slice.row_stride();
    let SliceState {
        planes,
        sample_buffer,
        ..
    } = slice;

    let mut gc = GolombRiceCoder::new(data);
    let mut out = Vec::with_capacity(planes.len());
    for (p, plane) in planes.iter_mut().enumerate() {
        let rect = geometry.plane_rect(params, p);
        let quant = &params.quant_tables[plane.quant_table_index];
        let states = plane
            .rice_states()
            .ok_or_else(|| Ffv1Error::config("context backend mismatch"))?;
        let w = rect.width as usize;
        let mut local = PlaneBuffer::new(rect.width, rect.height);

        gc.new_plane(rect.width);
        for y in 0..rect.height as usize {
            let cur = scratch_origin(stride, p, y % 3);
            let prev = scratch_origin(stride, p, (y + 2) % 3);
            let prev2 = scratch_origin(stride, p, (y + 1) % 3);
            set_line_borders(sample_buffer, cur, prev, w);

            gc.new_line();
            decode_line_rice(
                &mut gc,
                states,
                quant,
                sample_buffer,
                cur,
                prev,
                prev2,
                w,
                bpp.bits[p],
                bpp.mask[p] as i32,
            )?;

            let row = local.index(0, y as u32);
            for x in 0..w {
                local.data[row + x] = sample_buffer[cur + x] as u32;
            }
        }
        out.push(local);
    }
    Ok(out)
}

fn encode_slice(
    params: &CodecParams,
    transition: &StateTransition,
    slice: &mut SliceState,
    frame: &Frame,
) -> Result<Vec<u8>> {
    slice.clear(params);
    if params.coder.is_golomb_rice() {
        encode_slice_rice(params, slice, frame)
    } else {
        encode_slice_range(params, transition, slice, frame)
    }
}

/// Load one source line into the current scratch row, masked to the
/// plane's coded width.
#[inline]
fn load_source_line(
    buf: &mut [i32],
    cur: usize,
    src: &PlaneBuffer,
    x0: u32,
    y: u32,
    w: usize,
    mask: u32,
) {
    let row = src.index(x0, y);
    for x in 0..w {
        buf[cur + x] = (src.data[row + x] & mask) as i32;
    }
}

fn encode_slice_range(
    params: &CodecParams,
    transition: &StateTransition,
    slice: &mut SliceState,
    frame: &Frame,
) -> Result<Vec<u8>> {
    let bpp = params.compute_bits_per_plane(slice.slice_coding_mode);
    let geometry = slice.geometry;
    let stride = slice.row_stride();
    let SliceState {
        planes,
        sample_buffer,
        ..
    } = slice;

    let mut rc = RangeEncoder::new();
    for (p, plane) in planes.iter_mut().enumerate() {
        let rect = geometry.plane_rect(params, p);
        let quant = &params.quant_tables[plane.quant_table_index];
        let states = plane
            .range_states()
            .ok_or_else(|| Ffv1Error::config("context backend mismatch"))?;
        let w = rect.width as usize;
        let src = &frame.planes[p];

        for y in 0..rect.height as usize {
            let cur = scratch_origin(stride, p, y % 3);
            let prev = scratch_origin(stride, p, (y + 2) % 3);
            let prev2 = scratch_origin(stride, p, (y + 1) % 3);

            load_source_line(sample_buffer, cur, src, rect.x, rect.y + y as u32, w, bpp.mask[p]);
            set_line_borders(sample_buffer, cur, prev, w);

            encode_line_range(
                &mut rc,
                transition,
                states,
                quant,
                sample_buffer,
                cur,
                prev,
                prev2,
                w,
                bpp.bits[p],
            );
        }
    }
    Ok(rc.finish())
}

fn encode_slice_rice(
    params: &CodecParams,
    slice: &mut SliceState,
    frame: &Frame,
) -> Result<Vec<u8>> {
    let bpp = params.compute_bits_per_plane(slice.slice_coding_mode);
    let geometry = slice.geometry;
    let stride = slice.row_stride();
    let SliceState {
        planes,
        sample_buffer,
        ..
    } = slice;

    let mut gc = GolombRiceEncoder::new();
    for (p, plane) in planes.iter_mut().enumerate() {
        let rect = geometry.plane_rect(params, p);
        let quant = &params.quant_tables[plane.quant_table_index];
        let states = plane
            .rice_states()
            .ok_or_else(|| Ffv1Error::config("context backend mismatch"))?;
        let w = rect.width as usize;
        let src = &frame.planes[p];

        gc.new_plane(rect.width);
        for y in 0..rect.height as usize {
            let cur = scratch_origin(stride, p, y % 3);
            let prev = scratch_origin(stride, p, (y + 2) % 3);
            let prev2 = scratch_origin(stride, p, (y + 1) % 3);

            load_source_line(sample_buffer, cur, src, rect.x, rect.y + y as u32, w, bpp.mask[p]);
            set_line_borders(sample_buffer, cur, prev, w);

            encode_line_rice(
                &mut gc,
                states,
                quant,
                sample_buffer,
                cur,
                prev,
                prev2,
                w,
                bpp.bits[p],
            );
        }
    }
    Ok(gc.finish())
}

// ============================================================================
// Frame coding
// ============================================================================

/// The codec instance: configuration, transition table, slice grid.
///
/// One frame at a time per instance; use one instance per concurrent
/// stream. Within a frame, slices are coded in parallel.
#[derive(Debug)]
pub struct Ffv1Codec {
    params: CodecParams,
    transition: StateTransition,
    slices: Vec<SliceState>,
}

impl Ffv1Codec {
    pub fn new(params: CodecParams) -> Result<Self> {
        params.validate()?;

        let transition = match &params.coder {
            CoderType::RangeCustomTable(table) => StateTransition::from_one_state(table),
            _ => StateTransition::new(),
        };
        let slices = init_slice_states(&params)?;

        tracing::debug!(
            width = params.width,
            height = params.height,
            slices = slices.len(),
            planes = params.total_planes(),
            bits = params.sample_bits(),
            "codec configured"
        );

        Ok(Self {
            params,
            transition,
            slices,
        })
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    /// Per-plane coded widths for slices in the default coding mode.
    pub fn bits_per_plane(&self) -> BitsPerPlane {
        self.params.compute_bits_per_plane(0)
    }

    /// Rebuild slice state for new dimensions or a new slice grid.
    pub fn reconfigure(&mut self, params: CodecParams) -> Result<()> {
        params.validate()?;
        self.transition = match &params.coder {
            CoderType::RangeCustomTable(table) => StateTransition::from_one_state(table),
            _ => StateTransition::new(),
        };
        self.slices = init_slice_states(&params)?;
        self.params = params;
        tracing::debug!(slices = self.slices.len(), "codec reconfigured");
        Ok(())
    }

    /// Encode one frame into one bitstream buffer per slice.
    pub fn encode_frame(&mut self, frame: &Frame) -> Result<Vec<Vec<u8>>> {
        frame.check_layout(&self.params)?;

        let Ffv1Codec {
            params,
            transition,
            slices,
        } = self;

        let packets: Vec<Vec<u8>> = slices
            .par_iter_mut()
            .map(|slice| encode_slice(params, transition, slice, frame))
            .collect::<Result<_>>()?;

        tracing::trace!(
            bytes = packets.iter().map(Vec::len).sum::<usize>(),
            "frame encoded"
        );
        Ok(packets)
    }

    /// Decode one frame from one bitstream buffer per slice.
    ///
    /// Slices fail independently: every decodable slice is written into
    /// `frame` before the first failure is reported, so a caller can show
    /// a partially decoded frame.
    pub fn decode_frame(&mut self, packets: &[Vec<u8>], frame: &mut Frame) -> Result<()> {
        frame.check_layout(&self.params)?;
        if packets.len() != self.slices.len() {
            return Err(Ffv1Error::SliceCount {
                expected: self.slices.len(),
                got: packets.len(),
            });
        }

        let Ffv1Codec {
            params,
            transition,
            slices,
        } = self;

        let results: Vec<Result<Vec<PlaneBuffer>>> = slices
            .par_iter_mut()
            .zip(packets.par_iter())
            .map(|(slice, data)| decode_slice(params, transition, slice, data))
            .collect();

        let mut first_err = None;
        for (index, (slice, result)) in slices.iter().zip(results).enumerate() {
            match result {
                Ok(locals) => blit_slice(params, slice, &locals, frame),
                Err(e) => {
                    tracing::warn!(slice = index, error = %e, "slice decode failed");
                    if first_err.is_none() {
                        first_err = Some(Ffv1Error::slice(index, e));
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Copy a slice's decoded planes into the frame at the slice's rectangle.
fn blit_slice(params: &CodecParams, slice: &SliceState, locals: &[PlaneBuffer], frame: &mut Frame) {
    for (p, local) in locals.iter().enumerate() {
        let rect = slice.geometry.plane_rect(params, p);
        let dst = &mut frame.planes[p];
        for y in 0..rect.height {
            let s = local.index(0, y);
            let d = dst.index(rect.x, rect.y + y);
            dst.data[d..d + rect.width as usize]
                .copy_from_slice(&local.data[s..s + rect.width as usize]);
        }
    }
}
