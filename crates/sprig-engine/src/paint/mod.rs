//! Paint model shared between the renderer and the particle engine.
//!
//! Only flat colors exist: textures are sampled untinted and rectangles are
//! filled with a single color.

mod color;

pub use color::Color;
