//! Deferred rendering.
//!
//! Producers record backend calls through [`Renderer`]; the calls are stored
//! as closures in a [`CommandQueue`] and replayed on the render thread once
//! per frame.
//!
//! Convention:
//! - the backend is only touched from inside queued commands
//! - uniform bytes are packed exactly as `tessera-shader` lays them out

mod backend;
mod config;
mod queue;
mod recording;
mod renderer;
mod resolver;
mod upload;

pub use backend::{
    BackendError, FramebufferId, PrimitiveType, ProgramId, RenderBackend, RenderPass, TextureId, UniformValue,
};
pub use config::RendererConfig;
pub use queue::{CommandQueue, DEFAULT_QUEUE_CAPACITY};
pub use recording::{BackendCall, RecordingBackend};
pub use renderer::{FrameStats, Renderer};
pub use resolver::{resolve_uniforms, ResolveReport};
pub use upload::{decode, upload_buffer, upload_declaration};
