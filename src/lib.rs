//! gllm-gemm: Metal source generation and pipeline caching for GEMM kernels.
//!
//! This crate provides:
//! - **Header Generation**: `metal_simdgroup_event` (synchronous tile copies)
//!   and `metal_simdgroup_matrix_storage` (register tiles with generated
//!   load/store members, including bfloat decoding)
//! - **Host Emulation**: a CPU interpreter of the generated members, used to
//!   check addressing, clamping and bfloat transcoding without a GPU
//! - **Pipeline Cache**: canonical GEMM descriptors mapped to compiled
//!   pipelines, one compilation per key
//!
//! # Quick Start
//!
//! ```ignore
//! use gllm_gemm::{GemmPrecision, GemmProblemDescriptor, GemmSourceOptions};
//! use gllm_gemm::metal_kernels::metal_pipeline_cache;
//!
//! let cache = metal_pipeline_cache(GemmSourceOptions::new(KERNEL_BODY, "gemm"))?;
//! let pipeline = cache.register(&GemmProblemDescriptor::new(1024, 1024, 1024, GemmPrecision::F16))?;
//! ```

#[macro_use]
pub mod macros;

pub mod codegen;
pub mod emulation;
pub mod error;
pub mod gemm;
pub mod layout;
pub mod types;

// Metal backend (macOS only)
#[cfg(target_os = "macos")]
pub mod metal_kernels;

pub use codegen::{
    create_memory_access, create_simdgroup_event, create_simdgroup_matrix_storage, AccessPath, Action,
    AddressSpace, MemoryAccessDescriptor,
};
pub use error::{GemmError, GemmResult};
pub use gemm::{
    create_gemm_source, CacheConfig, CacheStats, GemmKey, GemmProblemDescriptor, GemmSourceOptions, PipelineCache,
    PipelineCompiler,
};
pub use layout::morton_order;
pub use types::{GemmPrecision, PerOperand, StorageElement};
