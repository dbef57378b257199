//! Sprig engine.
//!
//! 2D draw pipeline and particle simulation for a small scripting-host
//! graphics runtime:
//! - [`render`]: renderer context, draw transforms, framebuffer capture
//! - [`particle`]: ring-buffered particle sources and systems
//! - [`bindings`]: handle-based surface exposed to the host
//! - [`window`], [`device`], [`core`], [`time`]: the winit/wgpu frame loop

pub mod bindings;
pub mod core;
pub mod device;
pub mod logging;
pub mod paint;
pub mod particle;
pub mod render;
pub mod time;
pub mod window;
