//! wgpu device and window surface.
//!
//! Creates the Instance/Adapter/Device/Queue, configures the surface and hands
//! out one acquired texture per frame.

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
