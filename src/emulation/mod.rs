//! CPU reference for the generated Metal code.
//!
//! These mirror the emitted headers step for step so the addressing, clamp
//! and bfloat transcoding rules can be exercised without a GPU.

pub mod async_copy;
pub mod matrix_storage;

pub use async_copy::{copy_to_device, copy_to_threadgroup, ClampMode, SimdgroupEvent, TileCopyDescriptor, TileExtent};
pub use matrix_storage::SimdgroupMatrixStorage;
