//! Render context: instance, diagnostics, surface, device, and queues.

use std::ffi::c_char;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::debug::DebugMessenger;
use crate::device::{required_device_extensions, select_physical_device};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, validation_layers};

/// Main render context holding the negotiated Vulkan state.
///
/// Everything created later (swapchain, render pass, pipeline) executes
/// against this context and must be destroyed before it drops.
pub struct RenderContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    graphics_family: u32,
    present_family: u32,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl RenderContext {
    /// Get the logical device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the surface extension loader.
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Get the present queue family index.
    pub fn present_family(&self) -> u32 {
        self.present_family
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        // Reverse creation order: device, diagnostics, surface, instance.
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            if let Some(messenger) = &self.debug_messenger {
                messenger.destroy();
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a render context against a window.
pub struct RenderContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for RenderContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "prism".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl RenderContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layer diagnostics.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Run the negotiation sequence: instance, diagnostics, surface, device
    /// selection, logical device, queues.
    ///
    /// If any step fails, everything created by the earlier steps is
    /// destroyed before the error is returned.
    pub fn build<W>(self, window: &W) -> Result<RenderContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        let instance = unsafe {
            create_instance(
                &entry,
                display.as_raw(),
                &self.app_name,
                self.enable_validation,
            )
        }?;

        let debug_messenger = if self.enable_validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface = match unsafe {
            ash_window::create_surface(
                &entry,
                &instance,
                display.as_raw(),
                window_handle.as_raw(),
                None,
            )
        } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe {
                    if let Some(messenger) = &debug_messenger {
                        messenger.destroy();
                    }
                    instance.destroy_instance(None);
                }
                return Err(GpuError::SurfaceCreation(e.to_string()));
            }
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let selected =
            unsafe { select_physical_device(&instance, &surface_loader, surface) }.and_then(
                |(physical_device, assignment)| {
                    // Selection only accepts complete assignments.
                    let graphics = assignment.graphics.ok_or(GpuError::NoSuitableDevice)?;
                    let present = assignment.present.ok_or(GpuError::NoSuitableDevice)?;
                    Ok((physical_device, graphics, present))
                },
            );
        let (physical_device, graphics_family, present_family) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe {
                    surface_loader.destroy_surface(surface, None);
                    if let Some(messenger) = &debug_messenger {
                        messenger.destroy();
                    }
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let created = unsafe {
            create_logical_device(
                &instance,
                physical_device,
                graphics_family,
                present_family,
                self.enable_validation,
            )
        };
        let (device, graphics_queue, present_queue) = match created {
            Ok(created) => created,
            Err(e) => {
                unsafe {
                    surface_loader.destroy_surface(surface, None);
                    if let Some(messenger) = &debug_messenger {
                        messenger.destroy();
                    }
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        Ok(RenderContext {
            entry,
            instance,
            debug_messenger,
            surface,
            surface_loader,
            physical_device,
            device,
            swapchain_loader,
            graphics_family,
            present_family,
            graphics_queue,
            present_queue,
        })
    }
}

/// One queue request per unique family index. Graphics and present collapse
/// into a single request when they share a family.
fn unique_family_indices(graphics_family: u32, present_family: u32) -> Vec<u32> {
    let mut families = vec![graphics_family];
    if present_family != graphics_family {
        families.push(present_family);
    }
    families
}

/// Create the logical device and retrieve the per-role queues.
///
/// # Safety
/// The instance and physical device must be valid, and both family indices
/// must come from a completed assignment for this device.
unsafe fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    enable_validation: bool,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> =
        unique_family_indices(graphics_family, present_family)
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(std::slice::from_ref(&queue_priority))
            })
            .collect();

    let extensions = required_device_extensions();
    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Modern drivers ignore device layers, but older ones still read them,
    // so mirror the instance layer set when diagnostics are on.
    let layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

    let graphics_queue = device.get_device_queue(graphics_family, 0);
    let present_queue = device.get_device_queue(present_family, 0);

    Ok((device, graphics_queue, present_queue))
}
