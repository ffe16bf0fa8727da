// ── Domain ────────────────────────────────────────────────────────────────

/// Shader stage a declaration was found in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderDomain {
    Vertex,
    Fragment,
}

impl ShaderDomain {
    /// Both domains in processing order.
    pub const ALL: [ShaderDomain; 2] = [ShaderDomain::Vertex, ShaderDomain::Fragment];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ShaderDomain::Vertex => 0,
            ShaderDomain::Fragment => 1,
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            ShaderDomain::Vertex => "vertex",
            ShaderDomain::Fragment => "fragment",
        }
    }
}

// ── Handles ───────────────────────────────────────────────────────────────

/// Index of a [`ShaderStruct`](crate::ShaderStruct) in its reflection's struct table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StructId(pub(crate) usize);

impl StructId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Backend binding handle for a uniform (a "location").
///
/// Backends map their native handles to this value; the reflection only
/// stores and hands it back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub u32);

// ── Uniform types ─────────────────────────────────────────────────────────

/// Closed set of uniform value types.
///
/// Sizes follow raw sequential packing: no std140 padding is applied anywhere.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    /// Stored as a 32-bit integer, uploaded as one.
    Bool,
    Int32,
    Float32,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    Struct(StructId),
}

impl UniformType {
    /// Resolves a built-in GLSL type name. Struct names are not resolved here.
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => UniformType::Bool,
            "int" => UniformType::Int32,
            "float" => UniformType::Float32,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "mat2" => UniformType::Mat2,
            "mat3" => UniformType::Mat3,
            "mat4" => UniformType::Mat4,
            _ => return None,
        })
    }

    pub const fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Bool => "bool",
            UniformType::Int32 => "int",
            UniformType::Float32 => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat2 => "mat2",
            UniformType::Mat3 => "mat3",
            UniformType::Mat4 => "mat4",
            UniformType::Struct(_) => "struct",
        }
    }

    /// Number of 32-bit components in one element.
    ///
    /// Struct types have no fixed component count and return 0.
    pub const fn components(self) -> u32 {
        match self {
            UniformType::Bool | UniformType::Int32 | UniformType::Float32 => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 | UniformType::Mat2 => 4,
            UniformType::Mat3 => 9,
            UniformType::Mat4 => 16,
            UniformType::Struct(_) => 0,
        }
    }

    /// Byte size of one element, or `None` for struct types (their size
    /// lives in the struct table).
    pub const fn element_size(self) -> Option<u32> {
        match self {
            UniformType::Struct(_) => None,
            ty => Some(ty.components() * 4),
        }
    }

    #[inline]
    pub const fn is_struct(self) -> bool {
        matches!(self, UniformType::Struct(_))
    }
}

// ── Resource types ────────────────────────────────────────────────────────

/// Opaque resource kinds, uploaded as texture-unit indices rather than bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceType {
    Sampler1D,
    Sampler2D,
    Sampler2DMs,
    SamplerCube,
    Sampler2DShadow,
}

impl ResourceType {
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "sampler1D" => ResourceType::Sampler1D,
            "sampler2D" => ResourceType::Sampler2D,
            "sampler2DMS" => ResourceType::Sampler2DMs,
            "samplerCube" => ResourceType::SamplerCube,
            "sampler2DShadow" => ResourceType::Sampler2DShadow,
            _ => return None,
        })
    }

    pub const fn glsl_name(self) -> &'static str {
        match self {
            ResourceType::Sampler1D => "sampler1D",
            ResourceType::Sampler2D => "sampler2D",
            ResourceType::Sampler2DMs => "sampler2DMS",
            ResourceType::SamplerCube => "samplerCube",
            ResourceType::Sampler2DShadow => "sampler2DShadow",
        }
    }
}
