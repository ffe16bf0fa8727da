use std::fmt;

use tessera_shader::{StageSources, UniformLocation, UniformType};

/// Backend handle of a compiled and linked shader program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramId(pub u32);

/// Backend handle of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureId(pub u32);

/// Backend handle of a framebuffer (render target).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FramebufferId(pub u32);

/// Primitive topology for indexed draws.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    Triangles,
    Lines,
}

/// One uniform upload, already reinterpreted from raw bytes.
///
/// Single values map to one scalar/vector/matrix call. Arrays carry the
/// whole contiguous block so the backend can upload it in one call.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    /// `int` and `bool` arrays, and texture-unit blocks for sampler arrays.
    IntArray(Vec<i32>),
    /// Float-based arrays: `ty` gives the element type, `data` every component
    /// of every element back to back.
    FloatArray { ty: UniformType, data: Vec<f32> },
}

impl UniformValue {
    /// Type of one element of this value.
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Bool(_) => UniformType::Bool,
            UniformValue::Int(_) | UniformValue::IntArray(_) => UniformType::Int32,
            UniformValue::Float(_) => UniformType::Float32,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat2(_) => UniformType::Mat2,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
            UniformValue::FloatArray { ty, .. } => *ty,
        }
    }
}

/// Compile or link failure reported by a backend, with its full diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Which step failed, e.g. "vertex compile" or "link".
    pub stage: String,
    pub log: String,
}

impl BackendError {
    pub fn new(stage: impl Into<String>, log: impl Into<String>) -> Self {
        Self { stage: stage.into(), log: log.into() }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.log)
    }
}

impl std::error::Error for BackendError {}

/// Render pass description consumed by `begin_render_pass`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub label: String,
    /// `None` renders to the default framebuffer.
    pub target: Option<FramebufferId>,
    /// Clear color applied when the pass begins; `None` keeps the contents.
    pub clear_color: Option<[f32; 4]>,
}

impl RenderPass {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), target: None, clear_color: None }
    }

    pub fn with_target(mut self, target: FramebufferId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_clear(mut self, color: [f32; 4]) -> Self {
        self.clear_color = Some(color);
        self
    }
}

/// Graphics-API binding layer.
///
/// Only the render thread calls into a backend, always from inside a queued
/// command. Implementations decide how failures surface (return values,
/// debug callbacks, logging); the renderer never retries.
pub trait RenderBackend {
    /// Compiles every stage and links them into a program.
    fn create_program(&mut self, name: &str, sources: &StageSources) -> Result<ProgramId, BackendError>;

    fn destroy_program(&mut self, program: ProgramId);

    /// Makes `program` current; `None` unbinds.
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Binding handle of `name` in `program`, `None` if the program has no such uniform.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Uploads `value` to `location` of the current program.
    fn upload_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn set_clear_color(&mut self, color: [f32; 4]);

    fn clear(&mut self);

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    fn set_line_thickness(&mut self, thickness: f32);

    fn draw_indexed(&mut self, count: u32, primitive: PrimitiveType, depth_test: bool);

    fn begin_render_pass(&mut self, pass: &RenderPass);

    fn end_render_pass(&mut self);
}
