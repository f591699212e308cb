//! # ffv1-core
//!
//! Core of the FFV1 lossless video codec: the slice and context state
//! machine, the adaptive range coder, and the Golomb-Rice coder.
//!
//! The crate codes raw pixel planes to and from per-slice bitstream
//! buffers. Container framing, headers, and color transforms live in the
//! layers around it; this crate is handed a validated [`CodecParams`]
//! and does the per-pixel work.
//!
//! ## Example
//!
//! ```
//! use ffv1_core::{CodecParams, Ffv1Codec, Frame};
//!
//! let params = CodecParams {
//!     width: 32,
//!     height: 24,
//!     ..Default::default()
//! };
//! let mut codec = Ffv1Codec::new(params.clone()).unwrap();
//!
//! let frame = Frame::new(&params);
//! let packets = codec.encode_frame(&frame).unwrap();
//!
//! let mut decoded = Frame::new(&params);
//! codec.decode_frame(&packets, &mut decoded).unwrap();
//! assert_eq!(decoded, frame);
//! ```
//!
//! ## Design
//!
//! Slices are independent coding units: each owns its context tables and
//! scratch rows, so frames fan out across the rayon thread pool with no
//! shared mutable state. Context state resets before every frame and
//! adapts freely within a slice.

pub mod bitio;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod golomb;
pub mod quant;
pub mod rangecoder;
pub mod slice;

pub use codec::Ffv1Codec;
pub use config::{BitsPerPlane, CodecParams, CoderType};
pub use context::{ContextTable, PlaneContext, MAX_PLANES};
pub use error::{Ffv1Error, Result};
pub use frame::{Frame, PlaneBuffer};
pub use golomb::{GolombRiceCoder, GolombRiceEncoder, RiceState};
pub use quant::{QuantTable, MAX_CONTEXT_INPUTS, MAX_QUANT_TABLES};
pub use rangecoder::{RangeDecoder, RangeEncoder, StateTransition, CONTEXT_SIZE};
pub use slice::{need_new_slice_split, slice_coord, SliceGeometry, SliceState};
