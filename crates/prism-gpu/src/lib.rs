//! Vulkan bootstrap layer for prism.
//!
//! This crate provides:
//! - Vulkan instance creation and validation layer diagnostics
//! - Physical device selection against a presentation surface
//! - Logical device and queue creation
//! - Swapchain handling with per-image views and framebuffers
//! - Render pass and fixed-function graphics pipeline assembly

pub mod context;
pub mod debug;
pub mod device;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;

pub use context::{RenderContext, RenderContextBuilder};
pub use debug::DebugMessenger;
pub use device::{QueueFamilyAssignment, SurfaceSupport};
pub use error::{GpuError, Result};
pub use pipeline::GraphicsPipeline;
pub use swapchain::Swapchain;
