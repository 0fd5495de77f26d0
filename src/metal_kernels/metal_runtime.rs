//! Metal device discovery and runtime compilation of generated source.
//!
//! Generated GEMM modules are specialized per problem, so they are always
//! compiled from source at runtime with `MTLDevice newLibraryWithSource`.

use std::sync::OnceLock;

use metal::{CompileOptions, ComputePipelineState, Device, Library, MTLLanguageVersion};

use crate::error::{GemmError, GemmResult};

/// Global Metal device instance.
static METAL_DEVICE: OnceLock<Option<Device>> = OnceLock::new();

/// Check if Metal is available on this system.
pub fn is_metal_available() -> bool {
    get_metal_device().is_some()
}

/// Get the default Metal device.
pub fn get_metal_device() -> Option<&'static Device> {
    METAL_DEVICE
        .get_or_init(|| {
            let device = Device::system_default();
            match &device {
                Some(device) => log::info!("using Metal device {}", device.name()),
                None => log::warn!("no Metal device found"),
            }
            device
        })
        .as_ref()
}

/// Options passed to the Metal source compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetalCompilerConfig {
    pub fast_math: bool,
    pub language_version: MTLLanguageVersion,
}

impl Default for MetalCompilerConfig {
    fn default() -> Self {
        Self {
            fast_math: true,
            language_version: MTLLanguageVersion::V3_1,
        }
    }
}

impl MetalCompilerConfig {
    fn compile_options(&self) -> CompileOptions {
        let options = CompileOptions::new();
        options.set_fast_math_enabled(self.fast_math);
        options.set_language_version(self.language_version);
        options
    }
}

/// A library compiled from one generated module.
pub struct MetalSourceLibrary {
    device: Device,
    library: Library,
}

impl MetalSourceLibrary {
    /// Compile `source` on the default device.
    pub fn from_source(source: &str, config: &MetalCompilerConfig) -> GemmResult<Self> {
        let device = get_metal_device()
            .cloned()
            .ok_or(GemmError::DeviceNotAvailable)?;
        Self::from_source_with_device(&device, source, config)
    }

    pub fn from_source_with_device(device: &Device, source: &str, config: &MetalCompilerConfig) -> GemmResult<Self> {
        let library = device
            .new_library_with_source(source, &config.compile_options())
            .map_err(GemmError::Compilation)?;

        Ok(Self {
            device: device.clone(),
            library,
        })
    }

    pub fn get_function(&self, name: &str) -> GemmResult<metal::Function> {
        self.library
            .get_function(name, None)
            .map_err(|_| GemmError::FunctionNotFound(name.to_string()))
    }

    /// Create a compute pipeline for `function_name`.
    pub fn create_pipeline(&self, function_name: &str) -> GemmResult<ComputePipelineState> {
        let function = self.get_function(function_name)?;
        self.device
            .new_compute_pipeline_state_with_function(&function)
            .map_err(GemmError::PipelineCreation)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
