//! Validation layer diagnostics.
//!
//! Installs a `VK_EXT_debug_utils` messenger that routes validation messages
//! through `tracing`. The same messenger configuration is chained onto
//! instance creation so messages emitted during `vkCreateInstance` itself are
//! not lost.

use std::ffi::{c_void, CStr};

use ash::vk;

use crate::error::Result;

/// Messenger configuration shared between instance creation and the
/// standalone messenger.
pub fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Debug messenger wrapper.
///
/// Must be created after the instance and destroyed before it.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Register the message callback with the instance.
    ///
    /// # Safety
    /// The instance must be valid and must have been created with the
    /// `VK_EXT_debug_utils` extension enabled.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let messenger = loader.create_debug_utils_messenger(&messenger_create_info(), None)?;
        Ok(Self { loader, messenger })
    }

    /// Unregister the callback.
    ///
    /// # Safety
    /// The owning instance must still be alive.
    pub unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.messenger, None);
    }
}

/// Logs and always returns `vk::FALSE` so the triggering call is never
/// suppressed.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        std::borrow::Cow::from("(no message)")
    } else {
        CStr::from_ptr((*p_callback_data).p_message).to_string_lossy()
    };

    let kind = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", "[{kind}] {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vulkan", "[{kind}] {message}");
    } else {
        tracing::trace!(target: "vulkan", "[{kind}] {message}");
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messenger_config_covers_required_severities_and_types() {
        let info = messenger_create_info();

        for severity in [
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        ] {
            assert!(info.message_severity.contains(severity));
        }
        assert!(!info
            .message_severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));

        for kind in [
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        ] {
            assert!(info.message_type.contains(kind));
        }

        assert!(info.pfn_user_callback.is_some());
    }
}
