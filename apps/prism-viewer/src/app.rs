//! Application driver: startup sequencing, event loop, teardown.

use std::path::PathBuf;

use ash::vk;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use prism_gpu::pipeline::{create_render_pass, GraphicsPipeline};
use prism_gpu::shader::load_spirv;
use prism_gpu::{RenderContext, RenderContextBuilder, SurfaceSupport, Swapchain};
use prism_platform::{framebuffer_size, window_attributes, PlatformError, WindowConfig};

/// Viewer configuration.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// Enable validation layer diagnostics (default: debug builds only).
    pub validation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            vertex_shader: PathBuf::from("vert.spv"),
            fragment_shader: PathBuf::from("frag.spv"),
            validation: cfg!(debug_assertions),
        }
    }
}

/// Run the viewer until the window closes.
///
/// Any initialization failure is returned to `main`, which reports it on
/// stderr and exits nonzero.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
    // Block until window events arrive; nothing animates here.
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut driver = Driver {
        config,
        state: None,
        init_error: None,
    };
    event_loop.run_app(&mut driver)?;

    if let Some(err) = driver.init_error {
        return Err(err);
    }

    info!("Shut down cleanly");
    Ok(())
}

/// Winit application handler that owns the render state.
struct Driver {
    config: ViewerConfig,
    state: Option<RenderState>,
    init_error: Option<anyhow::Error>,
}

impl ApplicationHandler for Driver {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match RenderState::new(event_loop, &self.config) {
            Ok(state) => {
                info!("Renderer ready");
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize renderer: {e:#}");
                self.init_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            info!("Close requested");
            if let Some(mut state) = self.state.take() {
                state.cleanup();
            }
            event_loop.exit();
        }
    }
}

/// Everything the driver owns while the window is up.
///
/// Field order matters: `ctx` drops before `window`, so the surface is
/// gone before the window it was created from.
struct RenderState {
    ctx: RenderContext,
    window: Window,
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    cleaned: bool,
}

impl RenderState {
    /// Run the full startup sequence.
    ///
    /// On failure partway through, everything created so far is destroyed
    /// in reverse order before the error propagates.
    fn new(event_loop: &ActiveEventLoop, config: &ViewerConfig) -> anyhow::Result<Self> {
        // Shader byte code is plain file I/O; read it before any Vulkan
        // resource exists so a missing file has nothing to unwind.
        let vertex_shader = load_spirv(&config.vertex_shader)?;
        let fragment_shader = load_spirv(&config.fragment_shader)?;

        let window = event_loop
            .create_window(window_attributes(&config.window))
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

        let ctx = RenderContextBuilder::new()
            .app_name(&config.window.title)
            .validation(config.validation)
            .build(&window)?;

        // SAFETY: The context owns a valid surface for this device.
        let support = unsafe {
            SurfaceSupport::query(ctx.surface_loader(), ctx.physical_device(), ctx.surface())?
        };

        // SAFETY: All handles come from the context built above.
        let mut swapchain = unsafe {
            Swapchain::new(
                ctx.device(),
                ctx.swapchain_loader(),
                ctx.surface(),
                &support,
                ctx.graphics_family(),
                ctx.present_family(),
                framebuffer_size(&window),
            )?
        };
        info!(
            "Swapchain created: {}x{} ({} images)",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len()
        );

        // SAFETY: Device is valid; format comes from the swapchain.
        let render_pass = match unsafe { create_render_pass(ctx.device(), swapchain.format) } {
            Ok(render_pass) => render_pass,
            Err(e) => {
                unsafe { destroy_render_resources(&ctx, &mut swapchain, None, None) };
                return Err(e.into());
            }
        };

        // SAFETY: Device and render pass are valid; blobs are whole SPIR-V.
        let pipeline = match unsafe {
            GraphicsPipeline::new(ctx.device(), render_pass, &vertex_shader, &fragment_shader)
        } {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { destroy_render_resources(&ctx, &mut swapchain, Some(render_pass), None) };
                return Err(e.into());
            }
        };

        // SAFETY: Device and render pass are valid.
        if let Err(e) = unsafe { swapchain.create_framebuffers(ctx.device(), render_pass) } {
            unsafe {
                destroy_render_resources(&ctx, &mut swapchain, Some(render_pass), Some(&pipeline));
            }
            return Err(e.into());
        }

        info!("Graphics pipeline ready");

        Ok(Self {
            ctx,
            window,
            swapchain,
            render_pass,
            pipeline,
            cleaned: false,
        })
    }

    /// Tear down the render resources; the context and window follow when
    /// `self` drops. Safe to call more than once.
    fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        // SAFETY: Everything was created against this context and the event
        // loop has stopped handing out work.
        unsafe {
            destroy_render_resources(
                &self.ctx,
                &mut self.swapchain,
                Some(self.render_pass),
                Some(&self.pipeline),
            );
        }
        tracing::debug!("Destroying window {:?}", self.window.id());
    }
}

impl Drop for RenderState {
    // The render pass, pipeline, and swapchain must be gone before the
    // context destroys the device, whichever way the event loop exits.
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Destroy everything created after the context, newest first:
/// framebuffers, pipeline (then its layout), render pass, image views,
/// swapchain. Used on clean shutdown and when initialization fails partway.
///
/// # Safety
/// All passed handles must belong to `ctx` and must not be in use.
unsafe fn destroy_render_resources(
    ctx: &RenderContext,
    swapchain: &mut Swapchain,
    render_pass: Option<vk::RenderPass>,
    pipeline: Option<&GraphicsPipeline>,
) {
    let device = ctx.device();
    let _ = device.device_wait_idle();

    swapchain.destroy_framebuffers(device);
    if let Some(pipeline) = pipeline {
        pipeline.destroy(device);
    }
    if let Some(render_pass) = render_pass {
        device.destroy_render_pass(render_pass, None);
    }
    swapchain.destroy(device, ctx.swapchain_loader());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_conventional_shader_paths() {
        let config = ViewerConfig::default();
        assert_eq!(config.vertex_shader, PathBuf::from("vert.spv"));
        assert_eq!(config.fragment_shader, PathBuf::from("frag.spv"));
    }
}
