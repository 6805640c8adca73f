//! Vulkan instance creation and validation layer checks.

use std::ffi::{c_char, CStr, CString};

use ash::vk;
use raw_window_handle::RawDisplayHandle;

use crate::debug;
use crate::error::{GpuError, Result};

/// Validation layers to enable when diagnostics are active.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Verify that every requested validation layer is installed.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn check_validation_layer_support(entry: &ash::Entry) -> Result<()> {
    let available = entry.enumerate_instance_layer_properties()?;

    for layer in validation_layers() {
        let found = available.iter().any(|props| {
            let name = CStr::from_ptr(props.layer_name.as_ptr());
            name == layer
        });
        if !found {
            return Err(GpuError::ValidationLayersUnavailable(
                layer.to_string_lossy().into_owned(),
            ));
        }
    }

    Ok(())
}

/// Create a Vulkan instance.
///
/// Instance extensions are the windowing system's required surface
/// extensions plus `VK_EXT_debug_utils` when validation is enabled. With
/// validation on, the messenger configuration is chained onto the create
/// info so instance-creation-time messages reach the callback.
///
/// # Safety
/// The entry must be a valid Vulkan entry point and the display handle must
/// come from a live window system connection.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    display_handle: RawDisplayHandle,
    app_name: &str,
    enable_validation: bool,
) -> Result<ash::Instance> {
    if enable_validation {
        check_validation_layer_support(entry)?;
    }

    let app_name = application_name(app_name)?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"prism")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_0);

    // Surface extensions come from the windowing collaborator.
    let mut extension_names: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| GpuError::SurfaceCreation(format!("No surface extensions for display: {e}")))?
        .to_vec();
    if enable_validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let mut debug_info = debug::messenger_create_info();

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names);
    if enable_validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = entry.create_instance(&create_info, None)?;

    Ok(instance)
}

/// The application name crosses the FFI boundary as a C string, so an
/// interior NUL in the configured title is a config error, not a panic.
fn application_name(app_name: &str) -> Result<CString> {
    CString::new(app_name)
        .map_err(|_| GpuError::Other(format!("Application name contains a NUL byte: {app_name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn khronos_validation_layer_is_requested() {
        let layers = validation_layers();
        assert_eq!(layers, vec![c"VK_LAYER_KHRONOS_validation"]);
    }

    #[test]
    fn application_name_rejects_interior_nul() {
        assert_eq!(application_name("prism").unwrap(), CString::new("prism").unwrap());

        let err = application_name("pri\0sm").unwrap_err();
        assert!(matches!(err, GpuError::Other(_)), "unexpected error: {err}");
    }
}
