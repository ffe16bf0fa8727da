//! Shader objects, the shader library and material uniform storage.
//!
//! Parsing and layout live in `tessera-shader`; this module ties a reflected
//! layout to a backend program and to CPU-side material data.

mod data;
mod library;
mod material;
mod program;

pub use data::UniformData;
pub use library::ShaderLibrary;
pub use material::Material;
pub use program::Shader;

pub(crate) use program::RetiredPrograms;
