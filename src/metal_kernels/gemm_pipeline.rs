//! [`PipelineCompiler`] backed by the Metal runtime compiler.

use metal::{ComputePipelineState, Device};

use crate::error::{GemmError, GemmResult};
use crate::gemm::cache::{CacheConfig, PipelineCache, PipelineCompiler};
use crate::gemm::descriptor::GemmKey;
use crate::gemm::source::GemmSourceOptions;
use crate::metal_kernels::metal_runtime::{get_metal_device, MetalCompilerConfig, MetalSourceLibrary};

/// Compiles generated GEMM modules into compute pipelines on one device.
pub struct MetalPipelineCompiler {
    device: Device,
    config: MetalCompilerConfig,
}

impl MetalPipelineCompiler {
    /// Compiler for the default device.
    pub fn new(config: MetalCompilerConfig) -> GemmResult<Self> {
        let device = get_metal_device()
            .cloned()
            .ok_or(GemmError::DeviceNotAvailable)?;
        Ok(Self::with_device(&device, config))
    }

    pub fn with_device(device: &Device, config: MetalCompilerConfig) -> Self {
        Self {
            device: device.clone(),
            config,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &MetalCompilerConfig {
        &self.config
    }
}

impl PipelineCompiler for MetalPipelineCompiler {
    type Pipeline = ComputePipelineState;

    fn compile(&self, key: &GemmKey, source: &str, entry_point: &str) -> GemmResult<ComputePipelineState> {
        log::debug!("compiling {key} on {}", self.device.name());
        let library = MetalSourceLibrary::from_source_with_device(&self.device, source, &self.config)?;
        library.create_pipeline(entry_point)
    }
}

/// Pipeline cache on the default device, configured from the environment.
pub fn metal_pipeline_cache(source_options: GemmSourceOptions) -> GemmResult<PipelineCache<MetalPipelineCompiler>> {
    let compiler = MetalPipelineCompiler::new(MetalCompilerConfig::default())?;
    Ok(PipelineCache::with_config(compiler, source_options, CacheConfig::from_env()))
}
