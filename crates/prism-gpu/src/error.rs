//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant except the device-scan skips inside
/// [`crate::device::select_physical_device`] is fatal: the driver logs the
/// message and exits with a failure status.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No Vulkan-capable device present at all.
    #[error("No Vulkan-capable device found")]
    NoDeviceFound,

    /// Devices were enumerated but none can drive the surface.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A requested validation layer is not installed.
    #[error("Validation layer unavailable: {0}")]
    ValidationLayersUnavailable(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Logical device creation failed.
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Image view creation failed.
    #[error("Image view creation failed: {0}")]
    ImageViewCreation(String),

    /// Framebuffer creation failed.
    #[error("Framebuffer creation failed: {0}")]
    FramebufferCreation(String),

    /// Shader byte code absent or unreadable.
    #[error("Shader file unreadable: {path}: {source}")]
    ShaderFileNotFound {
        path: String,
        source: std::io::Error,
    },

    /// The driver rejected the shader byte code.
    #[error("Shader module creation failed: {0}")]
    ShaderModuleCreation(String),

    /// Pipeline layout creation failed.
    #[error("Pipeline layout creation failed: {0}")]
    PipelineLayoutCreation(String),

    /// Render pass creation failed.
    #[error("Render pass creation failed: {0}")]
    RenderPassCreation(String),

    /// Graphics pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = GpuError::ValidationLayersUnavailable("VK_LAYER_KHRONOS_validation".to_string());
        assert_eq!(
            err.to_string(),
            "Validation layer unavailable: VK_LAYER_KHRONOS_validation"
        );

        let err = GpuError::ShaderFileNotFound {
            path: "vert.spv".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("Shader file unreadable: vert.spv"));
    }

    #[test]
    fn vulkan_results_convert() {
        let err = GpuError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(matches!(err, GpuError::Vulkan(_)));
    }
}
