//! Shader uniform reflection for the **Tessera** renderer.
//!
//! This crate is intentionally dependency-free so shader tooling can inspect
//! uniform layouts without pulling in the renderer or a graphics backend.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`scanner`] | keyword search, `struct`/`uniform` statement iterators, tokenizer |
//! | [`parser`] | `DeclarationBuilder`, `parse_stages` and `parse_str` entry points |
//! | [`stage`] | `#type` stage splitting, `StageSources` |
//! | [`reflection`] | `ShaderReflection`, `BufferSlot` |
//! | [`uniform`] | `UniformDeclaration`, `ShaderStruct`, `ShaderUniformBuffer`, `ResourceDeclaration` |
//! | [`types`] | `UniformType`, `ResourceType`, `ShaderDomain`, handles |
//! | [`error`] | `ParseError` |
//!
//! # Layout rules
//!
//! Declarations are packed back to back with no alignment padding: the offset
//! of each declaration is the sum of the sizes before it. Uniforms named with
//! the `r_` prefix go to the renderer-owned buffer of their stage; all others
//! go to the stage's material buffer.
//!
//! # Quick start
//!
//! ```rust
//! use tessera_shader::{parse_str, ShaderDomain};
//!
//! let src = "
//! #type vertex
//! uniform mat4 r_ViewProjection;
//! #type fragment
//! uniform vec4 u_Color;
//! uniform float u_Gamma;
//! ";
//!
//! let (_stages, reflection) = parse_str(src).unwrap();
//! let material = reflection.material_buffer(ShaderDomain::Fragment).unwrap();
//! assert_eq!(material.find("u_Gamma").unwrap().offset(), 16);
//! ```

pub mod error;
pub mod parser;
pub mod reflection;
pub mod scanner;
pub mod stage;
pub mod types;
pub mod uniform;

pub use error::ParseError;
pub use parser::{parse_stages, parse_str, DeclarationBuilder};
pub use reflection::{BufferSlot, ShaderReflection, RENDERER_UNIFORM_PREFIX};
pub use stage::{split_stages, StageSources};
pub use types::{ResourceType, ShaderDomain, StructId, UniformLocation, UniformType};
pub use uniform::{LeafField, ResourceDeclaration, ShaderStruct, ShaderUniformBuffer, UniformDeclaration};
