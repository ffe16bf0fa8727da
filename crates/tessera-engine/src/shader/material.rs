use std::sync::Arc;

use parking_lot::RwLock;
use tessera_shader::{BufferSlot, ShaderDomain, ShaderReflection};

use super::data::UniformData;
use super::program::Shader;
use crate::render::{upload_buffer, RenderBackend, TextureId};

#[derive(Debug, Clone, PartialEq)]
struct TextureSlot {
    name: String,
    index: u32,
    texture: TextureId,
}

#[derive(Debug)]
struct MaterialState {
    generation: u64,
    buffers: [Vec<u8>; 2],
    textures: Vec<TextureSlot>,
}

impl MaterialState {
    fn sized_for(generation: u64, reflection: &ShaderReflection) -> Self {
        Self {
            generation,
            buffers: ShaderDomain::ALL.map(|d| vec![0; reflection.material_size(d) as usize]),
            textures: Vec::new(),
        }
    }

    /// Rebuilds the buffers if the shader was reloaded since they were sized.
    ///
    /// `reflection` must be a guard on `shader`'s current layout.
    fn sync_layout(&mut self, shader: &Shader, reflection: &ShaderReflection) {
        let generation = shader.generation();
        if self.generation != generation {
            log::debug!("material buffers of '{}' reset after reload", shader.name());
            *self = Self::sized_for(generation, reflection);
        }
    }

    fn write(&mut self, domain: ShaderDomain, offset: u32, bytes: &[u8]) {
        let buffer = &mut self.buffers[domain.index()];
        let end = offset as usize + bytes.len();
        assert!(
            end <= buffer.len(),
            "write of {} bytes at {offset} overruns the {} byte {} material buffer",
            bytes.len(),
            buffer.len(),
            domain.name()
        );
        buffer[offset as usize..end].copy_from_slice(bytes);
    }
}

/// CPU-side material uniform storage for one shader.
///
/// Holds one byte buffer per stage laid out exactly like the shader's
/// material buffer declarations, plus texture assignments for its
/// resources. Values are written from gameplay code and read by the render
/// thread when the material is bound.
///
/// Writes address uniforms by name. Unknown names, type mismatches,
/// renderer-owned uniforms and out-of-range writes are programmer errors
/// and panic.
#[derive(Debug)]
pub struct Material {
    shader: Arc<Shader>,
    state: RwLock<MaterialState>,
}

impl Material {
    pub fn new(shader: Arc<Shader>) -> Self {
        let state = {
            let reflection = shader.reflection();
            MaterialState::sized_for(shader.generation(), &*reflection)
        };
        Self { shader, state: RwLock::new(state) }
    }

    #[inline]
    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    /// Sets a single material uniform or struct leaf (`u_Light.intensity`).
    pub fn set<T: UniformData>(&self, name: &str, value: T) {
        self.with_layout(|reflection, state| {
            let (slot, leaf) = reflection
                .find_leaf(name)
                .unwrap_or_else(|| panic!("shader '{}' has no uniform '{name}'", self.shader.name()));
            assert!(
                leaf.ty == T::TYPE && leaf.count == 1,
                "uniform '{name}' is {} x{}, not {}",
                leaf.ty.glsl_name(),
                leaf.count,
                T::TYPE.glsl_name()
            );
            state.write(material_domain(name, slot), leaf.offset, bytemuck::bytes_of(&value.to_repr()));
        });
    }

    /// Sets every element of an array uniform.
    pub fn set_array<T: UniformData>(&self, name: &str, values: &[T]) {
        let bytes: Vec<u8> = values
            .iter()
            .flat_map(|v| bytemuck::bytes_of(&v.to_repr()).to_vec())
            .collect();
        self.with_layout(|reflection, state| {
            let (slot, leaf) = reflection
                .find_leaf(name)
                .unwrap_or_else(|| panic!("shader '{}' has no uniform '{name}'", self.shader.name()));
            assert!(
                leaf.ty == T::TYPE && leaf.count as usize == values.len(),
                "uniform '{name}' is {} x{}, got {} x{}",
                leaf.ty.glsl_name(),
                leaf.count,
                T::TYPE.glsl_name(),
                values.len()
            );
            state.write(material_domain(name, slot), leaf.offset, &bytes);
        });
    }

    /// Copies an opaque blob to the start of a uniform; whole structs included.
    pub fn set_bytes(&self, name: &str, bytes: &[u8]) {
        self.with_layout(|reflection, state| {
            let (slot, offset, size) = match reflection.find_uniform(name) {
                Some((slot, decl)) => (slot, decl.offset(), decl.size()),
                None => {
                    let (slot, leaf) = reflection
                        .find_leaf(name)
                        .unwrap_or_else(|| panic!("shader '{}' has no uniform '{name}'", self.shader.name()));
                    (slot, leaf.offset, leaf.size)
                }
            };
            assert!(
                bytes.len() <= size as usize,
                "{} bytes do not fit uniform '{name}' of {size} bytes",
                bytes.len()
            );
            state.write(material_domain(name, slot), offset, bytes);
        });
    }

    /// Replaces a stage's whole material buffer.
    pub fn set_uniform_buffer(&self, domain: ShaderDomain, bytes: &[u8]) {
        self.with_layout(|_, state| {
            let buffer = &mut state.buffers[domain.index()];
            assert_eq!(
                bytes.len(),
                buffer.len(),
                "{} material buffer of '{}' is {} bytes",
                domain.name(),
                self.shader.name(),
                buffer.len()
            );
            buffer.copy_from_slice(bytes);
        });
    }

    /// Assigns a texture to a sampler uniform (element 0 of an array).
    pub fn set_texture(&self, name: &str, texture: TextureId) {
        self.set_texture_at(name, 0, texture);
    }

    /// Assigns a texture to element `index` of a sampler array.
    pub fn set_texture_at(&self, name: &str, index: u32, texture: TextureId) {
        self.with_layout(|reflection, state| {
            let resource = reflection
                .find_resource(name)
                .unwrap_or_else(|| panic!("shader '{}' has no resource '{name}'", self.shader.name()));
            assert!(index < resource.count(), "resource '{name}' has {} elements", resource.count());

            match state.textures.iter_mut().find(|t| t.name == name && t.index == index) {
                Some(slot) => slot.texture = texture,
                None => state.textures.push(TextureSlot { name: name.to_string(), index, texture }),
            }
        });
    }

    /// Snapshot of a stage's material bytes.
    pub fn buffer(&self, domain: ShaderDomain) -> Vec<u8> {
        self.with_layout(|_, state| state.buffers[domain.index()].clone())
    }

    /// Uploads both material buffers and binds the assigned textures.
    ///
    /// Runs on the render thread with the shader's program bound.
    pub(crate) fn upload<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        self.with_layout(|reflection, state| {
            for domain in ShaderDomain::ALL {
                upload_buffer(backend, reflection, BufferSlot::Material(domain), &state.buffers[domain.index()]);
            }
            for slot in &state.textures {
                match reflection.find_resource(&slot.name).and_then(|r| r.unit()) {
                    Some(unit) => backend.bind_texture(unit + slot.index, slot.texture),
                    None => log::warn!("material of '{}': resource '{}' has no texture unit", self.shader.name(), slot.name),
                }
            }
        });
    }

    /// Runs `f` against the shader's current layout with the buffers synced to it.
    ///
    /// Locks the shader's reflection first, then the material state. A reload
    /// cannot land in between, so offsets read from `reflection` always match
    /// the buffer sizes.
    fn with_layout<R>(&self, f: impl FnOnce(&ShaderReflection, &mut MaterialState) -> R) -> R {
        let reflection = self.shader.reflection();
        let mut state = self.state.write();
        state.sync_layout(&self.shader, &*reflection);
        f(&*reflection, &mut *state)
    }
}

fn material_domain(name: &str, slot: BufferSlot) -> ShaderDomain {
    match slot {
        BufferSlot::Material(domain) => domain,
        BufferSlot::Renderer(_) => panic!("uniform '{name}' is renderer-owned and cannot be set on a material"),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BackendCall, RecordingBackend, UniformValue};
    use tessera_shader::parse_str;

    const SOURCE: &str = "#type vertex
uniform mat4 r_Transform;
uniform vec2 u_Scroll;
#type fragment
struct Light { vec3 position; float intensity; }
uniform float u_Gamma;
uniform vec3 u_Color;
uniform Light u_Light;
uniform int u_Steps[2];
uniform sampler2D u_Albedo;
uniform sampler2D u_Layers[2];
";

    fn shader(src: &str) -> Arc<Shader> {
        let (stages, reflection) = parse_str(src).unwrap();
        Arc::new(Shader::new("material_test", stages, reflection, Default::default()))
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
    }

    #[test]
    fn buffers_are_sized_per_stage() {
        let material = Material::new(shader(SOURCE));
        assert_eq!(material.buffer(ShaderDomain::Vertex).len(), 8);
        assert_eq!(material.buffer(ShaderDomain::Fragment).len(), 4 + 12 + 16 + 8);
    }

    #[test]
    fn values_land_at_their_offsets() {
        let material = Material::new(shader(SOURCE));
        material.set("u_Gamma", 2.2f32);
        material.set("u_Color", [0.1f32, 0.2, 0.3]);
        material.set("u_Light.intensity", 4.0f32);
        material.set_array("u_Steps", &[3i32, 5]);
        material.set("u_Scroll", [1.0f32, -1.0]);

        let fragment = material.buffer(ShaderDomain::Fragment);
        assert_eq!(floats(&fragment[..16]), vec![2.2, 0.1, 0.2, 0.3]);
        assert_eq!(floats(&fragment[28..32]), vec![4.0]);
        assert_eq!(bytemuck::pod_read_unaligned::<[i32; 2]>(&fragment[32..40]), [3, 5]);
        assert_eq!(floats(&material.buffer(ShaderDomain::Vertex)), vec![1.0, -1.0]);
    }

    #[test]
    fn whole_struct_and_whole_buffer_writes() {
        let material = Material::new(shader(SOURCE));
        material.set_bytes("u_Light", bytemuck::bytes_of(&[9.0f32, 8.0, 7.0, 6.0]));
        assert_eq!(floats(&material.buffer(ShaderDomain::Fragment)[16..32]), vec![9.0, 8.0, 7.0, 6.0]);

        material.set_uniform_buffer(ShaderDomain::Vertex, bytemuck::bytes_of(&[5.0f32, 6.0]));
        assert_eq!(floats(&material.buffer(ShaderDomain::Vertex)), vec![5.0, 6.0]);
    }

    #[test]
    #[should_panic(expected = "not vec3")]
    fn type_mismatch_panics() {
        Material::new(shader(SOURCE)).set("u_Gamma", [1.0f32, 1.0, 1.0]);
    }

    #[test]
    #[should_panic(expected = "renderer-owned")]
    fn renderer_uniforms_are_not_material_data() {
        Material::new(shader(SOURCE)).set("r_Transform", [[0.0f32; 4]; 4]);
    }

    #[test]
    #[should_panic(expected = "do not fit")]
    fn oversized_blob_panics() {
        Material::new(shader(SOURCE)).set_bytes("u_Gamma", &[0u8; 8]);
    }

    #[test]
    #[should_panic(expected = "has no uniform")]
    fn unknown_name_panics() {
        Material::new(shader(SOURCE)).set("u_Missing", 1.0f32);
    }

    #[test]
    fn upload_sends_buffers_and_textures() {
        let shader = shader(SOURCE);
        let mut backend = RecordingBackend::new();
        shader.compile(&mut backend).unwrap();
        backend.take_calls();

        let material = Material::new(Arc::clone(&shader));
        material.set("u_Gamma", 1.8f32);
        material.set_texture("u_Albedo", TextureId(10));
        material.set_texture_at("u_Layers", 1, TextureId(11));
        material.upload(&mut backend);

        let uploads = backend.uploads();
        assert!(uploads.contains(&("u_Gamma", &UniformValue::Float(1.8))));
        assert!(uploads.contains(&("u_Scroll", &UniformValue::Vec2([0.0, 0.0]))));
        assert!(backend.calls().contains(&BackendCall::BindTexture { unit: 0, texture: TextureId(10) }));
        assert!(backend.calls().contains(&BackendCall::BindTexture { unit: 2, texture: TextureId(11) }));
    }

    #[test]
    fn reload_resets_stale_buffers() {
        let shader = shader(SOURCE);
        let mut backend = RecordingBackend::new();
        shader.compile(&mut backend);

        let material = Material::new(Arc::clone(&shader));
        material.set("u_Gamma", 1.0f32);

        let (stages, reflection) = parse_str("#type vertex\n#type fragment\nuniform vec4 u_Tint;\n").unwrap();
        shader.swap(&mut backend, stages, reflection);
        assert_eq!(shader.generation(), 1);
        assert_eq!(material.buffer(ShaderDomain::Fragment), vec![0; 16]);
        assert!(material.buffer(ShaderDomain::Vertex).is_empty());
    }

    #[test]
    fn writes_racing_reloads_use_the_current_layout() {
        const WIDE: &str = "#type vertex\n#type fragment\nuniform mat4 u_Big;\nuniform float u_Gamma;\n";
        const NARROW: &str = "#type vertex\n#type fragment\nuniform float u_Gamma;\n";

        let shader = shader(WIDE);
        let material = Material::new(Arc::clone(&shader));

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut backend = RecordingBackend::new();
                for i in 0..200 {
                    let (stages, reflection) = parse_str(if i % 2 == 0 { NARROW } else { WIDE }).unwrap();
                    shader.swap(&mut backend, stages, reflection);
                }
            });
            s.spawn(|| {
                for _ in 0..2000 {
                    material.set("u_Gamma", 0.5f32);
                }
            });
        });

        // 200 swaps end on the wide layout
        material.set("u_Gamma", 0.5f32);
        let fragment = material.buffer(ShaderDomain::Fragment);
        assert_eq!(fragment.len(), 68);
        assert_eq!(floats(&fragment[64..]), vec![0.5]);
    }
}
