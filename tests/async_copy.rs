//! Properties of the host `simdgroup_event` tile copies.

use proptest::prelude::*;

use gllm_gemm::emulation::{copy_to_device, copy_to_threadgroup, ClampMode, SimdgroupEvent, TileCopyDescriptor};

fn arb_tile() -> impl Strategy<Value = [u16; 2]> {
    (0u16..=12, 0u16..=12).prop_map(|(x, y)| [x, y])
}

fn arb_clamp() -> impl Strategy<Value = ClampMode> {
    prop_oneof![Just(ClampMode::ClampToZero), Just(ClampMode::ClampToEdge)]
}

/// Strides at least as wide as the (possibly swapped) tiles.
fn descriptor(dst_tile: [u16; 2], src_tile: [u16; 2], transpose: bool, clamp_mode: ClampMode) -> TileCopyDescriptor {
    let widest = |tile: [u16; 2]| u32::from(tile[0].max(tile[1])).max(1);
    TileCopyDescriptor {
        dst_elements_per_row: widest(dst_tile) + 1,
        dst_tile,
        src_elements_per_row: widest(src_tile) + 2,
        src_tile,
        transpose_matrix: transpose,
        clamp_mode,
    }
}

fn buffer_len(elements_per_row: u32) -> usize {
    elements_per_row as usize * 13
}

fn source(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 + 1.0).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Device → threadgroup clamping
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    /// Inside the source tile the copy is exact; outside it is zero.
    #[test]
    fn prop_zero_fill(dst_tile in arb_tile(), src_tile in arb_tile()) {
        let d = descriptor(dst_tile, src_tile, false, ClampMode::ClampToZero);
        let src = source(buffer_len(d.src_elements_per_row));
        let mut dst = vec![f32::NAN; buffer_len(d.dst_elements_per_row)];
        copy_to_threadgroup(&mut dst, &src, &d);

        for y in 0..dst_tile[1] {
            for x in 0..dst_tile[0] {
                let got = dst[y as usize * d.dst_elements_per_row as usize + x as usize];
                if x < src_tile[0] && y < src_tile[1] {
                    prop_assert_eq!(got, src[y as usize * d.src_elements_per_row as usize + x as usize]);
                } else {
                    prop_assert_eq!(got, 0.0);
                }
            }
        }
    }

    /// Outside the source tile, cells repeat the nearest edge element.
    #[test]
    fn prop_edge_clamp(dst_tile in arb_tile(), src_tile in arb_tile()) {
        prop_assume!(src_tile[0] > 0 && src_tile[1] > 0);
        let d = descriptor(dst_tile, src_tile, false, ClampMode::ClampToEdge);
        let src = source(buffer_len(d.src_elements_per_row));
        let mut dst = vec![f32::NAN; buffer_len(d.dst_elements_per_row)];
        copy_to_threadgroup(&mut dst, &src, &d);

        for y in 0..dst_tile[1] {
            for x in 0..dst_tile[0] {
                let sx = x.min(src_tile[0] - 1) as usize;
                let sy = y.min(src_tile[1] - 1) as usize;
                let got = dst[y as usize * d.dst_elements_per_row as usize + x as usize];
                prop_assert_eq!(got, src[sy * d.src_elements_per_row as usize + sx]);
            }
        }
    }

    /// Cells past the destination tile are never written.
    #[test]
    fn prop_no_write_outside_destination(dst_tile in arb_tile(), src_tile in arb_tile(), clamp in arb_clamp()) {
        let d = descriptor(dst_tile, src_tile, false, clamp);
        let src = source(buffer_len(d.src_elements_per_row));
        let mut dst = vec![-7.0f32; buffer_len(d.dst_elements_per_row)];
        copy_to_threadgroup(&mut dst, &src, &d);

        for (i, value) in dst.iter().enumerate() {
            let x = (i % d.dst_elements_per_row as usize) as u16;
            let y = (i / d.dst_elements_per_row as usize) as u16;
            if x >= dst_tile[0] || y >= dst_tile[1] {
                prop_assert_eq!(*value, -7.0);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Transpose swaps both tiles before copying
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prop_transpose_swaps_extents(dst_tile in arb_tile(), src_tile in arb_tile(), clamp in arb_clamp()) {
        let transposed = descriptor(dst_tile, src_tile, true, clamp);
        let swapped = TileCopyDescriptor {
            dst_tile: [dst_tile[1], dst_tile[0]],
            src_tile: [src_tile[1], src_tile[0]],
            transpose_matrix: false,
            ..transposed
        };
        let src = source(buffer_len(transposed.src_elements_per_row));

        let mut a = vec![0.0f32; buffer_len(transposed.dst_elements_per_row)];
        let mut b = a.clone();
        copy_to_threadgroup(&mut a, &src, &transposed);
        copy_to_threadgroup(&mut b, &src, &swapped);
        prop_assert_eq!(&a, &b);

        let mut a = vec![0.0f32; buffer_len(transposed.dst_elements_per_row)];
        let mut b = a.clone();
        copy_to_device(&mut a, &src, &transposed);
        copy_to_device(&mut b, &src, &swapped);
        prop_assert_eq!(a, b);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Threadgroup → device copies only the overlap
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prop_device_copy_overlap(dst_tile in arb_tile(), src_tile in arb_tile()) {
        let d = descriptor(dst_tile, src_tile, false, ClampMode::ClampToEdge);
        let src = source(buffer_len(d.src_elements_per_row));
        let mut dst = vec![-1.0f32; buffer_len(d.dst_elements_per_row)];
        copy_to_device(&mut dst, &src, &d);

        for (i, value) in dst.iter().enumerate() {
            let x = (i % d.dst_elements_per_row as usize) as u16;
            let y = (i / d.dst_elements_per_row as usize) as u16;
            let inside = x < dst_tile[0].min(src_tile[0]) && y < dst_tile[1].min(src_tile[1]);
            if inside {
                prop_assert_eq!(*value, src[y as usize * d.src_elements_per_row as usize + x as usize]);
            } else {
                prop_assert_eq!(*value, -1.0);
            }
        }
    }
}

#[test]
fn test_event_round_trip_through_threadgroup() {
    // Load a 3x2 tile into an 8-wide threadgroup block and write it back.
    let device: Vec<f32> = (0..20).map(|i| i as f32).collect();
    let mut threadgroup = vec![0.0f32; 16];
    let mut out = vec![0.0f32; 20];

    let mut events = [SimdgroupEvent::new(), SimdgroupEvent::new()];
    events[0].async_copy_to_threadgroup(&mut threadgroup, 8, [3, 2], &device, 5, [3, 2], false, ClampMode::ClampToZero);
    SimdgroupEvent::wait(&mut events[..1]);
    events[1].async_copy_to_device(&mut out, 5, [3, 2], &threadgroup, 8, [3, 2], false);
    SimdgroupEvent::wait(&mut events);

    assert_eq!(&out[0..3], &device[0..3]);
    assert_eq!(&out[5..8], &device[5..8]);
    assert_eq!(out[3], 0.0);
    assert_eq!(events.iter().map(SimdgroupEvent::issued).sum::<usize>(), 2);
}
