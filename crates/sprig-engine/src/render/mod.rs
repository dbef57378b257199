//! 2D draw pipeline.
//!
//! Convention:
//! - geometry is in framebuffer pixels (top-left origin, +Y down);
//! - every draw is a unit quad (corners at ±0.5) placed by a model matrix,
//!   then mapped by the view and screen matrices.
//!
//! The [`Renderer`] issues draws; a [`GraphicsBackend`] executes them.

pub mod backend;
pub mod capture;
mod mesh;
pub mod programs;
mod renderer;
pub mod transform;

pub use backend::{
    DrawCall, DrawUniforms, GraphicsBackend, HeadlessBackend, ProgramDesc, ProgramHandle,
    ShaderStage, TextureHandle, TextureOptions, VertexLayout, WgpuBackend,
};
pub use capture::{CaptureError, CapturedImage};
pub use programs::ShaderError;
pub use renderer::{Renderer, Texture};
pub use transform::{DrawArgs, DrawFlags, compose_model};
