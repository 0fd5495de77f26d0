//! Metal backend for the pipeline cache (macOS only).
//!
//! ## Flow
//!
//! ```text
//! GemmKey → create_gemm_source → newLibraryWithSource → function(entry) → pipeline
//! ```

pub mod gemm_pipeline;
pub mod metal_runtime;

pub use gemm_pipeline::{metal_pipeline_cache, MetalPipelineCompiler};
pub use metal_runtime::{get_metal_device, is_metal_available, MetalCompilerConfig, MetalSourceLibrary};
