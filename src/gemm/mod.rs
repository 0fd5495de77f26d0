//! GEMM problem descriptors, source assembly and the pipeline cache.

pub mod cache;
pub mod descriptor;
pub mod source;

pub use cache::{CacheConfig, CacheStats, PipelineCache, PipelineCompiler, SOURCE_DUMP_ENV};
pub use descriptor::{GemmKey, GemmProblemDescriptor};
pub use source::{create_gemm_source, create_specialization, GemmSourceOptions};
