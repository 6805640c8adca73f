//! Platform abstraction for prism.
//!
//! Provides window configuration and sizing helpers via winit. Window
//! creation and event polling themselves belong to winit's event loop; the
//! application driver wires them together.

use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Window configuration.
///
/// The window is non-resizable by default: there is no swapchain
/// recreation path, so a fixed surface keeps the renderer honest.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "prism viewer".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Build winit window attributes from a config.
pub fn window_attributes(config: &WindowConfig) -> WindowAttributes {
    Window::default_attributes()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(config.resizable)
}

/// Framebuffer size in pixels, at least one per axis.
pub fn framebuffer_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width.max(1), size.height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_fixed_800_by_600() {
        let config = WindowConfig::default();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 600);
        assert!(!config.resizable);
    }

    #[test]
    fn attributes_mirror_the_config() {
        let config = WindowConfig {
            title: "triangle".to_string(),
            width: 1280,
            height: 720,
            resizable: false,
        };

        let attributes = window_attributes(&config);
        assert_eq!(attributes.title, "triangle");
        assert!(!attributes.resizable);
    }
}
