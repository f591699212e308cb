//! Integration tests for the FFV1 codec core
//!
//! These tests exercise full encode/decode round trips across backends,
//! bit depths, plane layouts, and slice grids, plus the failure paths a
//! caller relies on for partially decoded frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ffv1_core::{
    CodecParams, CoderType, Ffv1Codec, Ffv1Error, Frame, QuantTable, StateTransition,
};

// ============================================================================
// Helper Functions
// ============================================================================

/// Fill every plane with seeded noise clipped to the plane's coded range.
fn fill_noise(frame: &mut Frame, codec: &Ffv1Codec, seed: u64) {
    let bpp = codec.bits_per_plane();
    let mut rng = StdRng::seed_from_u64(seed);
    for (p, plane) in frame.planes.iter_mut().enumerate() {
        for v in plane.data.iter_mut() {
            *v = rng.gen::<u32>() & bpp.mask[p];
        }
    }
}

/// Fill with a smooth gradient plus occasional spikes, which drives both
/// the run-length path and the VLC path in Rice mode.
fn fill_gradient(frame: &mut Frame, codec: &Ffv1Codec, seed: u64) {
    let bpp = codec.bits_per_plane();
    let mut rng = StdRng::seed_from_u64(seed);
    for (p, plane) in frame.planes.iter_mut().enumerate() {
        for y in 0..plane.height {
            for x in 0..plane.width {
                let base = (x / 8 + y / 8) & bpp.mask[p];
                let v = if rng.gen_ratio(1, 50) {
                    rng.gen::<u32>() & bpp.mask[p]
                } else {
                    base
                };
                plane.set(x, y, v);
            }
        }
    }
}

fn roundtrip(params: CodecParams, seed: u64, noisy: bool) {
    let mut codec = Ffv1Codec::new(params.clone()).expect("valid params");
    let mut frame = Frame::new(&params);
    if noisy {
        fill_noise(&mut frame, &codec, seed);
    } else {
        fill_gradient(&mut frame, &codec, seed);
    }

    let packets = codec.encode_frame(&frame).expect("encode");
    assert_eq!(packets.len(), codec.num_slices());

    let mut decoded = Frame::new(&params);
    codec.decode_frame(&packets, &mut decoded).expect("decode");
    assert_eq!(decoded, frame, "round trip mismatch");
}

// ============================================================================
// Range coder backend
// ============================================================================

#[test]
fn test_roundtrip_range_8bit_420() {
    let params = CodecParams {
        width: 64,
        height: 48,
        chroma_h_shift: 1,
        chroma_v_shift: 1,
        num_h_slices: 2,
        num_v_slices: 2,
        ..Default::default()
    };
    roundtrip(params, 1, true);
}

#[test]
fn test_roundtrip_range_10bit() {
    let params = CodecParams {
        width: 48,
        height: 32,
        bits_per_raw_sample: 10,
        chroma_h_shift: 1,
        chroma_v_shift: 0,
        ..Default::default()
    };
    roundtrip(params, 2, true);
}

#[test]
fn test_roundtrip_range_16bit() {
    let params = CodecParams {
        width: 40,
        height: 24,
        bits_per_raw_sample: 16,
        num_h_slices: 2,
        ..Default::default()
    };
    roundtrip(params, 3, true);
}

#[test]
fn test_roundtrip_gray_with_alpha() {
    let params = CodecParams {
        width: 33,
        height: 17,
        plane_count: 1,
        transparency: true,
        ..Default::default()
    };
    roundtrip(params, 4, true);
}

#[test]
fn test_roundtrip_rct_widened_planes() {
    // RGB-like content through the reversible color transform: chroma
    // planes carry 9-bit values at 8-bit depth.
    let params = CodecParams {
        width: 32,
        height: 32,
        rct: true,
        ..Default::default()
    };
    let codec = Ffv1Codec::new(params.clone()).unwrap();
    let bpp = codec.bits_per_plane();
    assert_eq!(bpp.bits[1], 9);
    assert_eq!(bpp.offset, 256);
    roundtrip(params, 5, true);
}

#[test]
fn test_roundtrip_custom_transition_table() {
    let default = StateTransition::new();
    let mut table = [0u8; 256];
    for (i, t) in table.iter_mut().enumerate() {
        *t = default.one(i as u8);
    }

    let params = CodecParams {
        width: 32,
        height: 24,
        coder: CoderType::RangeCustomTable(Box::new(table)),
        ..Default::default()
    };
    roundtrip(params, 6, true);
}

#[test]
fn test_roundtrip_5input_contexts() {
    let params = CodecParams {
        width: 40,
        height: 40,
        quant_tables: vec![QuantTable::default_5input()],
        initial_states: vec![None],
        ..Default::default()
    };
    roundtrip(params, 7, true);
}

#[test]
fn test_roundtrip_legacy_slice_split() {
    // 4.2 streams use the unaligned proportional split.
    let params = CodecParams {
        width: 100,
        height: 30,
        version: 4,
        micro_version: 2,
        num_h_slices: 3,
        ..Default::default()
    };
    roundtrip(params, 8, true);
}

#[test]
fn test_roundtrip_odd_dimensions_subsampled() {
    let params = CodecParams {
        width: 31,
        height: 19,
        chroma_h_shift: 1,
        chroma_v_shift: 1,
        num_h_slices: 2,
        ..Default::default()
    };
    roundtrip(params, 9, true);
}

#[test]
fn test_roundtrip_flat_frame() {
    let params = CodecParams {
        width: 64,
        height: 64,
        num_h_slices: 2,
        num_v_slices: 2,
        ..Default::default()
    };
    let mut codec = Ffv1Codec::new(params.clone()).unwrap();
    let frame = Frame::new(&params);

    let packets = codec.encode_frame(&frame).unwrap();
    let mut decoded = Frame::new(&params);
    codec.decode_frame(&packets, &mut decoded).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn test_repeated_frames_are_deterministic() {
    // Context state resets every frame, so identical input must produce
    // identical bitstreams on every call.
    let params = CodecParams {
        width: 48,
        height: 32,
        ..Default::default()
    };
    let mut codec = Ffv1Codec::new(params.clone()).unwrap();
    let mut frame = Frame::new(&params);
    fill_noise(&mut frame, &codec, 10);

    let first = codec.encode_frame(&frame).unwrap();
    let second = codec.encode_frame(&frame).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Golomb-Rice backend
// ============================================================================

#[test]
fn test_roundtrip_rice_noise() {
    let params = CodecParams {
        width: 56,
        height: 40,
        coder: CoderType::GolombRice,
        chroma_h_shift: 1,
        chroma_v_shift: 1,
        num_h_slices: 2,
        ..Default::default()
    };
    roundtrip(params, 11, true);
}

#[test]
fn test_roundtrip_rice_runs() {
    let params = CodecParams {
        width: 80,
        height: 60,
        coder: CoderType::GolombRice,
        ..Default::default()
    };
    roundtrip(params, 12, false);
}

#[test]
fn test_roundtrip_rice_gray() {
    let params = CodecParams {
        width: 17,
        height: 11,
        plane_count: 1,
        coder: CoderType::GolombRice,
        ..Default::default()
    };
    roundtrip(params, 13, false);
}

// ============================================================================
// Error handling
// ============================================================================

#[test]
fn test_truncated_slice_is_local() {
    let params = CodecParams {
        width: 64,
        height: 32,
        num_h_slices: 2,
        coder: CoderType::GolombRice,
        ..Default::default()
    };
    let mut codec = Ffv1Codec::new(params.clone()).unwrap();
    let mut frame = Frame::new(&params);
    fill_noise(&mut frame, &codec, 14);

    let mut packets = codec.encode_frame(&frame).unwrap();
    packets[1].truncate(2);

    let mut decoded = Frame::new(&params);
    let err = codec.decode_frame(&packets, &mut decoded).unwrap_err();
    match err {
        Ffv1Error::Slice { index, source } => {
            assert_eq!(index, 1);
            assert!(source.is_bitstream_error());
        }
        other => panic!("unexpected error {other:?}"),
    }

    // The intact slice still landed in the frame.
    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(decoded.planes[0].get(x, y), frame.planes[0].get(x, y));
        }
    }
}

#[test]
fn test_wrong_packet_count_rejected() {
    let params = CodecParams {
        width: 32,
        height: 32,
        num_h_slices: 2,
        ..Default::default()
    };
    let mut codec = Ffv1Codec::new(params.clone()).unwrap();
    let mut frame = Frame::new(&params);

    let err = codec.decode_frame(&[], &mut frame).unwrap_err();
    assert!(matches!(err, Ffv1Error::SliceCount { expected: 2, got: 0 }));
}

#[test]
fn test_bad_slice_grid_rejected_at_configure() {
    let params = CodecParams {
        width: 8,
        height: 8,
        chroma_h_shift: 1,
        num_h_slices: 5,
        ..Default::default()
    };
    let err = Ffv1Codec::new(params).unwrap_err();
    assert!(matches!(err, Ffv1Error::BadSliceSplit { .. }));
}

#[test]
fn test_frame_layout_mismatch_rejected() {
    let params = CodecParams {
        width: 32,
        height: 32,
        ..Default::default()
    };
    let mut codec = Ffv1Codec::new(params).unwrap();

    let other = CodecParams {
        width: 64,
        height: 64,
        ..Default::default()
    };
    let frame = Frame::new(&other);
    assert!(codec.encode_frame(&frame).is_err());
}

// ============================================================================
// Reconfiguration
// ============================================================================

#[test]
fn test_reconfigure_then_roundtrip() {
    let params = CodecParams {
        width: 32,
        height: 32,
        ..Default::default()
    };
    let mut codec = Ffv1Codec::new(params).unwrap();

    let bigger = CodecParams {
        width: 96,
        height: 64,
        num_h_slices: 3,
        num_v_slices: 2,
        ..Default::default()
    };
    codec.reconfigure(bigger.clone()).unwrap();
    assert_eq!(codec.num_slices(), 6);

    let mut frame = Frame::new(&bigger);
    fill_noise(&mut frame, &codec, 15);
    let packets = codec.encode_frame(&frame).unwrap();
    let mut decoded = Frame::new(&bigger);
    codec.decode_frame(&packets, &mut decoded).unwrap();
    assert_eq!(decoded, frame);
}
