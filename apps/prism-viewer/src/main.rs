//! prism viewer
//!
//! Opens a window, negotiates a Vulkan device and swapchain for it, builds
//! the triangle pipeline, and polls events until the window closes. No
//! frames are recorded; this is the bootstrap path only.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p prism-viewer -- [VERT_SPV] [FRAG_SPV]
//! ```
//!
//! Shader byte code defaults to `vert.spv` and `frag.spv` in the working
//! directory.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use tracing_subscriber::EnvFilter;

use crate::app::{run, ViewerConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ViewerConfig::default();
    let mut args = std::env::args().skip(1);
    if let Some(vert) = args.next() {
        config.vertex_shader = vert.into();
    }
    if let Some(frag) = args.next() {
        config.fragment_shader = frag.into();
    }

    run(config)
}
