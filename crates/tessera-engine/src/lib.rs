//! Tessera engine crate.
//!
//! Deferred render commands, shader objects and material uniform storage on
//! top of an abstract [`render::RenderBackend`]. Shader parsing and layout
//! come from `tessera-shader`, re-exported here as [`reflect`].

pub mod logging;
pub mod render;
pub mod shader;

pub use tessera_shader as reflect;
