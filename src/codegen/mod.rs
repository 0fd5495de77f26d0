//! Metal source generation.
//!
//! Two headers are produced, both pure functions of their inputs:
//!
//! - `metal_simdgroup_event` ([`create_simdgroup_event`]): synchronous tile
//!   copies behind the async-copy API.
//! - `metal_simdgroup_matrix_storage` ([`create_simdgroup_matrix_storage`]):
//!   register tiles with generated load/store members.
//!
//! ```text
//! AddressSpace ─┐
//! Action ───────┼─> MemoryAccessDescriptor ─> load/store text ─┐
//! decoding_bf16 ┘                                              ├─> matrix storage header
//!                                       prologue / epilogue ───┘
//! ```

pub mod address_space;
pub mod matrix_storage;
pub mod memory_access;
pub mod simdgroup_event;

pub use address_space::{Action, AddressSpace, Device, MemorySpace, Threadgroup};
pub use matrix_storage::create_simdgroup_matrix_storage;
pub use memory_access::{create_memory_access, AccessPath, MemoryAccessDescriptor};
pub use simdgroup_event::create_simdgroup_event;
