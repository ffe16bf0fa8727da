use crate::types::{ShaderDomain, StructId, UniformType};
use crate::uniform::{LeafField, ResourceDeclaration, ShaderStruct, ShaderUniformBuffer, UniformDeclaration};

/// Names starting with this prefix are renderer-owned (camera matrices,
/// transforms) and are populated by the renderer, not by materials.
pub const RENDERER_UNIFORM_PREFIX: &str = "r_";

/// Identifies one of the four uniform buffers a shader can carry.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferSlot {
    Renderer(ShaderDomain),
    Material(ShaderDomain),
}

impl BufferSlot {
    /// Order in which buffers are walked during resolution.
    pub const RESOLVE_ORDER: [BufferSlot; 4] = [
        BufferSlot::Renderer(ShaderDomain::Vertex),
        BufferSlot::Renderer(ShaderDomain::Fragment),
        BufferSlot::Material(ShaderDomain::Vertex),
        BufferSlot::Material(ShaderDomain::Fragment),
    ];
}

/// Everything the declaration builder discovered in one shader.
///
/// Owns the struct table; struct-typed declarations refer into it by [`StructId`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderReflection {
    structs: Vec<ShaderStruct>,
    renderer_buffers: [ShaderUniformBuffer; 2],
    /// Created lazily on the first material uniform of each domain.
    material_buffers: [Option<ShaderUniformBuffer>; 2],
    resources: Vec<ResourceDeclaration>,
}

impl Default for ShaderReflection {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderReflection {
    pub fn new() -> Self {
        Self {
            structs: Vec::new(),
            renderer_buffers: [
                ShaderUniformBuffer::new("renderer", ShaderDomain::Vertex),
                ShaderUniformBuffer::new("renderer", ShaderDomain::Fragment),
            ],
            material_buffers: [None, None],
            resources: Vec::new(),
        }
    }

    // ── Structs ───────────────────────────────────────────────────────────

    pub fn structs(&self) -> &[ShaderStruct] {
        &self.structs
    }

    /// # Panics
    /// Panics if `id` did not come from this reflection.
    pub fn get_struct(&self, id: StructId) -> &ShaderStruct {
        &self.structs[id.0]
    }

    /// First struct registered under `name`.
    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        self.structs.iter().position(|s| s.name() == name).map(StructId)
    }

    pub fn add_struct(&mut self, st: ShaderStruct) -> StructId {
        self.structs.push(st);
        StructId(self.structs.len() - 1)
    }

    // ── Buffers ───────────────────────────────────────────────────────────

    pub fn renderer_buffer(&self, domain: ShaderDomain) -> &ShaderUniformBuffer {
        &self.renderer_buffers[domain.index()]
    }

    pub fn material_buffer(&self, domain: ShaderDomain) -> Option<&ShaderUniformBuffer> {
        self.material_buffers[domain.index()].as_ref()
    }

    /// Byte size of the domain's material buffer (0 if it has none).
    pub fn material_size(&self, domain: ShaderDomain) -> u32 {
        self.material_buffer(domain).map_or(0, ShaderUniformBuffer::size)
    }

    pub fn buffer(&self, slot: BufferSlot) -> Option<&ShaderUniformBuffer> {
        match slot {
            BufferSlot::Renderer(domain) => Some(self.renderer_buffer(domain)),
            BufferSlot::Material(domain) => self.material_buffer(domain),
        }
    }

    pub fn buffer_mut(&mut self, slot: BufferSlot) -> Option<&mut ShaderUniformBuffer> {
        match slot {
            BufferSlot::Renderer(domain) => Some(&mut self.renderer_buffers[domain.index()]),
            BufferSlot::Material(domain) => self.material_buffers[domain.index()].as_mut(),
        }
    }

    /// Appends `uniform` to the buffer its name routes it to, creating the
    /// material buffer on first use. Returns the slot it landed in, or `None`
    /// when that buffer's size would overflow `u32`.
    pub fn push_uniform(&mut self, uniform: UniformDeclaration) -> Option<BufferSlot> {
        let domain = uniform.domain();
        if uniform.name().starts_with(RENDERER_UNIFORM_PREFIX) {
            self.renderer_buffers[domain.index()].push(uniform)?;
            Some(BufferSlot::Renderer(domain))
        } else {
            self.material_buffers[domain.index()]
                .get_or_insert_with(|| ShaderUniformBuffer::new("material", domain))
                .push(uniform)?;
            Some(BufferSlot::Material(domain))
        }
    }

    // ── Resources ─────────────────────────────────────────────────────────

    pub fn resources(&self) -> &[ResourceDeclaration] {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut [ResourceDeclaration] {
        &mut self.resources
    }

    pub fn push_resource(&mut self, resource: ResourceDeclaration) {
        self.resources.push(resource);
    }

    pub fn find_resource(&self, name: &str) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|r| r.name() == name)
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    /// First declaration named `name`, searching buffers in resolution order.
    pub fn find_uniform(&self, name: &str) -> Option<(BufferSlot, &UniformDeclaration)> {
        BufferSlot::RESOLVE_ORDER.iter().find_map(|&slot| {
            self.buffer(slot)
                .and_then(|buf| buf.find(name))
                .map(|decl| (slot, decl))
        })
    }

    /// Expands a declaration into the non-struct values it covers.
    ///
    /// Struct arrays name their elements `name[i].field`; single structs use
    /// `name.field`. Nested structs recurse.
    pub fn leaf_fields(&self, decl: &UniformDeclaration) -> Vec<LeafField> {
        let mut out = Vec::new();
        self.collect_leaves(decl.name(), decl.ty(), decl.count(), decl.offset(), &mut out);
        out
    }

    fn collect_leaves(
        &self,
        path: &str,
        ty: UniformType,
        count: u32,
        offset: u32,
        out: &mut Vec<LeafField>,
    ) {
        let UniformType::Struct(id) = ty else {
            let size = ty.element_size().unwrap_or(0) * count;
            out.push(LeafField { name: path.to_string(), ty, count, offset, size });
            return;
        };

        let st = self.get_struct(id);
        for element in 0..count {
            let base = offset + element * st.size();
            let prefix = if count > 1 { format!("{path}[{element}]") } else { path.to_string() };
            for field in st.fields() {
                let name = format!("{prefix}.{}", field.name());
                self.collect_leaves(&name, field.ty(), field.count(), base + field.offset(), out);
            }
        }
    }

    /// Finds the leaf value named `name` (a plain uniform or `struct.field` path).
    pub fn find_leaf(&self, name: &str) -> Option<(BufferSlot, LeafField)> {
        if let Some((slot, decl)) = self.find_uniform(name) {
            if !decl.ty().is_struct() {
                return self.leaf_fields(decl).into_iter().next().map(|leaf| (slot, leaf));
            }
        }

        // Struct paths: the root name is everything before the first '.' or '['.
        let root = name.split(['.', '[']).next().unwrap_or(name);
        let (slot, decl) = self.find_uniform(root)?;
        self.leaf_fields(decl)
            .into_iter()
            .find(|leaf| leaf.name == name)
            .map(|leaf| (slot, leaf))
    }

    /// Drops every resolved binding handle and texture unit.
    pub fn clear_bindings(&mut self) {
        for slot in BufferSlot::RESOLVE_ORDER {
            if let Some(buf) = self.buffer_mut(slot) {
                buf.uniforms_mut().iter_mut().for_each(UniformDeclaration::clear_locations);
            }
        }
        for res in &mut self.resources {
            res.set_unit(None);
        }
    }
}
