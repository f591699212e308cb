//! Error types for the FFV1 codec core
//!
//! This module provides structured error types for the FFV1 slice and entropy
//! coding core, enabling precise error handling and actionable diagnostics.

use thiserror::Error;

/// Result type alias for FFV1 operations
pub type Result<T> = std::result::Result<T, Ffv1Error>;

/// FFV1-specific error types
///
/// Configuration and allocation-class errors abort the whole operation;
/// bitstream errors are local to the slice that raised them (slices are
/// independent coding units) and are wrapped in [`Ffv1Error::Slice`] when
/// surfaced from a frame-level call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Ffv1Error {
    /// Invalid codec configuration, rejected before any pixel is processed
    #[error("Invalid FFV1 configuration: {reason}")]
    Config {
        /// Reason for invalidity
        reason: String,
    },

    /// The requested slice grid cannot tile the image on the chroma grid
    #[error(
        "Slice grid {num_h}x{num_v} cannot split {width}x{height} on the \
        chroma grid (shift {chroma_h_shift}); choose a different slice count"
    )]
    BadSliceSplit {
        /// Horizontal slice count
        num_h: u32,
        /// Vertical slice count
        num_v: u32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Horizontal chroma subsampling shift
        chroma_h_shift: u32,
    },

    /// Decode tried to consume more bits than the slice buffer contains
    #[error("Bitstream exhausted: read past the end of the slice buffer")]
    BitstreamExhausted,

    /// Corrupt or malformed entropy-coded data
    #[error("Corrupt bitstream: {reason}")]
    Bitstream {
        /// Reason for corruption detection
        reason: String,
    },

    /// Frame buffer does not match the configured geometry
    #[error(
        "Frame dimensions {actual_w}x{actual_h} don't match codec \
        configuration {expected_w}x{expected_h}"
    )]
    DimensionMismatch {
        /// Actual width
        actual_w: u32,
        /// Actual height
        actual_h: u32,
        /// Expected width
        expected_w: u32,
        /// Expected height
        expected_h: u32,
    },

    /// Wrong number of per-slice buffers handed to a frame-level call
    #[error("Wrong number of slice buffers: expected {expected}, got {got}")]
    SliceCount {
        /// Expected slice count (num_h_slices * num_v_slices)
        expected: usize,
        /// Provided buffer count
        got: usize,
    },

    /// A single slice failed to decode; sibling slices are unaffected
    #[error("Slice {index} failed to decode: {source}")]
    Slice {
        /// Index of the failing slice in raster order
        index: usize,
        /// Underlying bitstream error
        source: Box<Ffv1Error>,
    },
}

impl Ffv1Error {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Ffv1Error::Config {
            reason: reason.into(),
        }
    }

    /// Create a corrupt-bitstream error
    pub fn bitstream(reason: impl Into<String>) -> Self {
        Ffv1Error::Bitstream {
            reason: reason.into(),
        }
    }

    /// Wrap a per-slice decode failure
    pub fn slice(index: usize, source: Ffv1Error) -> Self {
        Ffv1Error::Slice {
            index,
            source: Box::new(source),
        }
    }

    /// Check if this is a configuration-class error (fatal at configure time)
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Ffv1Error::Config { .. }
                | Ffv1Error::BadSliceSplit { .. }
                | Ffv1Error::DimensionMismatch { .. }
                | Ffv1Error::SliceCount { .. }
        )
    }

    /// Check if this is a bitstream-class error (local to one slice)
    pub fn is_bitstream_error(&self) -> bool {
        matches!(
            self,
            Ffv1Error::BitstreamExhausted
                | Ffv1Error::Bitstream { .. }
                | Ffv1Error::Slice { .. }
        )
    }
}
