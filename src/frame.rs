//! Pixel buffers
//!
//! The codec reads and writes plain per-plane sample arrays. Samples are
//! stored as `u32` so the widened chroma range under the reversible color
//! transform fits at any supported bit depth.

use crate::config::CodecParams;
use crate::error::{Ffv1Error, Result};

/// One plane of samples in raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
}

impl PlaneBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, v: u32) {
        self.data[y as usize * self.width as usize + x as usize] = v;
    }

    /// Raster index of `(x, y)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// A full frame: one buffer per coded plane, chroma planes subsampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub planes: Vec<PlaneBuffer>,
}

impl Frame {
    /// Allocate zeroed planes matching the configured layout.
    pub fn new(params: &CodecParams) -> Self {
        let mut planes = Vec::with_capacity(params.total_planes());
        for p in 0..params.total_planes() {
            let (hs, vs) = if params.is_chroma_plane(p) {
                (params.chroma_h_shift, params.chroma_v_shift)
            } else {
                (0, 0)
            };
            planes.push(PlaneBuffer::new(
                (params.width + (1 << hs) - 1) >> hs,
                (params.height + (1 << vs) - 1) >> vs,
            ));
        }
        Self {
            width: params.width,
            height: params.height,
            planes,
        }
    }

    /// Check this frame matches the configured plane layout.
    pub fn check_layout(&self, params: &CodecParams) -> Result<()> {
        if self.width != params.width || self.height != params.height {
            return Err(Ffv1Error::DimensionMismatch {
                actual_w: self.width,
                actual_h: self.height,
                expected_w: params.width,
                expected_h: params.height,
            });
        }
        if self.planes.len() != params.total_planes() {
            return Err(Ffv1Error::config("frame plane count mismatch"));
        }
        for (p, plane) in self.planes.iter().enumerate() {
            let (hs, vs) = if params.is_chroma_plane(p) {
                (params.chroma_h_shift, params.chroma_v_shift)
            } else {
                (0, 0)
            };
            let w = (params.width + (1 << hs) - 1) >> hs;
            let h = (params.height + (1 << vs) - 1) >> vs;
            if plane.width != w || plane.height != h || plane.data.len() != (w * h) as usize
            {
                return Err(Ffv1Error::config("frame plane geometry mismatch"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsampled_plane_sizes() {
        let params = CodecParams {
            width: 17,
            height: 9,
            chroma_h_shift: 1,
            chroma_v_shift: 1,
            ..Default::default()
        };
        let f = Frame::new(&params);
        assert_eq!(f.planes.len(), 3);
        assert_eq!((f.planes[0].width, f.planes[0].height), (17, 9));
        assert_eq!((f.planes[1].width, f.planes[1].height), (9, 5));
        assert!(f.check_layout(&params).is_ok());
    }

    #[test]
    fn test_layout_mismatch_detected() {
        let params = CodecParams {
            width: 16,
            height: 16,
            ..Default::default()
        };
        let mut f = Frame::new(&params);
        f.planes.pop();
        assert!(f.check_layout(&params).is_err());

        let f2 = Frame::new(&params);
        let mut other = params.clone();
        other.width = 32;
        assert!(f2.check_layout(&other).is_err());
    }

    #[test]
    fn test_get_set() {
        let mut p = PlaneBuffer::new(4, 3);
        p.set(3, 2, 511);
        assert_eq!(p.get(3, 2), 511);
        assert_eq!(p.data[p.index(3, 2)], 511);
    }
}
