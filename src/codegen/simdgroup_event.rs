//! `metal_simdgroup_event`: the tile-copy header.
//!
//! The API mirrors the hardware async-copy intrinsics the GEMM kernels were
//! written against, but every copy runs synchronously and `wait` does
//! nothing. Kernels must still issue copy, then `wait`, then the dependent
//! read: some GPU generations stall the whole threadgroup when the read after
//! a copy is skipped. [`crate::emulation::async_copy`] implements the same
//! rules on the host.

const SIMDGROUP_EVENT_HEADER: &str = r#"
// -*- Metal -*-
//===-- metal_simdgroup_event ---------------------------------------------===//
// Copyright (c) 2024 Philip Turner. See MIT LICENSE
//===----------------------------------------------------------------------===//

#ifndef __METAL_SIMDGROUP_EVENT
#define __METAL_SIMDGROUP_EVENT

using namespace metal;

enum class simdgroup_async_copy_clamp_mode {
  clamp_to_zero = 0,
  clamp_to_edge = 1
};

// Synchronous implementation: the API surface matches the async intrinsics,
// but copies complete before async_copy returns.
struct simdgroup_event {
  METAL_FUNC simdgroup_event() thread {}

  template <typename T>
  METAL_FUNC void async_copy(
    threadgroup T *dst,
    const device T *src,
    ulong n_elements
  ) thread {
    for (ulong i = 0; i < n_elements; ++i) {
      dst[i] = src[i];
    }
  }

  template <typename T>
  METAL_FUNC void async_copy(
    device T *dst,
    const threadgroup T *src,
    ulong n_elements
  ) thread {
    for (ulong i = 0; i < n_elements; ++i) {
      dst[i] = src[i];
    }
  }

  template <typename T>
  METAL_FUNC void async_copy(
    // Destination
    threadgroup T *dst,
    ushort dst_elements_per_row,
    ushort2 dst_tile_dimensions,

    // Source
    const device T *src,
    uint src_elements_per_row,
    ushort2 src_tile_dimensions,

    // Other
    bool transpose_matrix = false,
    simdgroup_async_copy_clamp_mode clamp_mode =
      simdgroup_async_copy_clamp_mode::clamp_to_zero
  ) thread {
    // Transposition swaps the tile extents only. Element addressing stays
    // row-major; the caller accounts for the transpose.
    if (transpose_matrix) {
      src_tile_dimensions = src_tile_dimensions.yx;
      dst_tile_dimensions = dst_tile_dimensions.yx;
    }

    for (ushort y = 0; y < dst_tile_dimensions.y; ++y) {
      for (ushort x = 0; x < dst_tile_dimensions.x; ++x) {
        bool in_bounds = (x < src_tile_dimensions.x) && (y < src_tile_dimensions.y);

        ulong dst_index = ulong(y) * ulong(dst_elements_per_row) + ulong(x);

        if (in_bounds) {
          ulong src_index = ulong(y) * ulong(src_elements_per_row) + ulong(x);
          dst[dst_index] = src[src_index];
        } else if (clamp_mode == simdgroup_async_copy_clamp_mode::clamp_to_edge &&
                   src_tile_dimensions.x > 0 && src_tile_dimensions.y > 0) {
          ushort sx = min(x, ushort(src_tile_dimensions.x - 1));
          ushort sy = min(y, ushort(src_tile_dimensions.y - 1));
          ulong src_index = ulong(sy) * ulong(src_elements_per_row) + ulong(sx);
          dst[dst_index] = src[src_index];
        } else {
          dst[dst_index] = T(0);
        }
      }
    }
  }

  template <typename T>
  METAL_FUNC void async_copy(
    // Destination
    device T *dst,
    uint dst_elements_per_row,
    ushort2 dst_tile_dimensions,

    // Source
    const threadgroup T *src,
    ushort src_elements_per_row,
    ushort2 src_tile_dimensions,

    // Other
    bool transpose_matrix = false
  ) thread {
    if (transpose_matrix) {
      src_tile_dimensions = src_tile_dimensions.yx;
      dst_tile_dimensions = dst_tile_dimensions.yx;
    }

    // Only the overlap is written back.
    ushort tile_x = min(dst_tile_dimensions.x, src_tile_dimensions.x);
    ushort tile_y = min(dst_tile_dimensions.y, src_tile_dimensions.y);

    for (ushort y = 0; y < tile_y; ++y) {
      for (ushort x = 0; x < tile_x; ++x) {
        ulong dst_index = ulong(y) * ulong(dst_elements_per_row) + ulong(x);
        ulong src_index = ulong(y) * ulong(src_elements_per_row) + ulong(x);
        dst[dst_index] = src[src_index];
      }
    }
  }

  METAL_FUNC static void wait(int /*count*/, thread simdgroup_event* /*events*/) {
  }
};

#endif // __METAL_SIMDGROUP_EVENT
"#;

/// Source of the `metal_simdgroup_event` header.
pub fn create_simdgroup_event() -> String {
    SIMDGROUP_EVENT_HEADER.to_string()
}
