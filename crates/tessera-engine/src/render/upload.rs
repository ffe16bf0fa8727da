//! Typed upload dispatch: raw uniform bytes to backend upload calls.

use bytemuck::Pod;
use tessera_shader::{BufferSlot, ShaderReflection, UniformDeclaration, UniformType};

use super::backend::{RenderBackend, UniformValue};

fn read<T: Pod>(bytes: &[u8]) -> T {
    bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<T>()])
}

fn read_all<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Reinterprets `bytes` as `count` elements of `ty`.
///
/// A single element becomes one scalar/vector/matrix value; arrays become
/// one value carrying the whole contiguous block.
///
/// # Panics
/// Panics on struct types (they are uploaded per leaf field) and when
/// `bytes` is shorter than `count` elements.
pub fn decode(ty: UniformType, count: u32, bytes: &[u8]) -> UniformValue {
    let Some(element_size) = ty.element_size() else {
        unreachable!("struct uniforms are uploaded field by field");
    };
    let size = (element_size * count) as usize;
    assert!(
        bytes.len() >= size,
        "{} bytes cannot hold {count} x {}",
        bytes.len(),
        ty.glsl_name()
    );
    let bytes = &bytes[..size];

    if count > 1 {
        return match ty {
            UniformType::Bool => UniformValue::IntArray(
                read_all::<u32>(bytes).into_iter().map(|b| i32::from(b != 0)).collect(),
            ),
            UniformType::Int32 => UniformValue::IntArray(read_all(bytes)),
            _ => UniformValue::FloatArray { ty, data: read_all(bytes) },
        };
    }

    match ty {
        UniformType::Bool => UniformValue::Bool(read::<u32>(bytes) != 0),
        UniformType::Int32 => UniformValue::Int(read(bytes)),
        UniformType::Float32 => UniformValue::Float(read(bytes)),
        UniformType::Vec2 => UniformValue::Vec2(read(bytes)),
        UniformType::Vec3 => UniformValue::Vec3(read(bytes)),
        UniformType::Vec4 => UniformValue::Vec4(read(bytes)),
        UniformType::Mat2 => UniformValue::Mat2(read(bytes)),
        UniformType::Mat3 => UniformValue::Mat3(read(bytes)),
        UniformType::Mat4 => UniformValue::Mat4(read(bytes)),
        UniformType::Struct(_) => unreachable!("struct uniforms are uploaded field by field"),
    }
}

/// Reads `decl` out of its owning buffer's bytes and uploads it.
///
/// Struct declarations issue one call per resolved leaf field. Declarations
/// (or leaves) without a binding handle are skipped.
pub fn upload_declaration<B: RenderBackend + ?Sized>(
    backend: &mut B,
    reflection: &ShaderReflection,
    decl: &UniformDeclaration,
    buffer: &[u8],
) {
    if !decl.ty().is_struct() {
        if let Some(location) = decl.location() {
            let value = decode(decl.ty(), decl.count(), slice(buffer, decl.offset(), decl.size()));
            backend.upload_uniform(location, value);
        }
        return;
    }

    for (leaf, location) in reflection.leaf_fields(decl).iter().zip(decl.field_locations()) {
        let Some(location) = *location else { continue };
        let value = decode(leaf.ty, leaf.count, slice(buffer, leaf.offset, leaf.size));
        backend.upload_uniform(location, value);
    }
}

/// Uploads every declaration of one buffer from `bytes`.
pub fn upload_buffer<B: RenderBackend + ?Sized>(
    backend: &mut B,
    reflection: &ShaderReflection,
    slot: BufferSlot,
    bytes: &[u8],
) {
    let Some(buffer) = reflection.buffer(slot) else { return };
    for decl in buffer.uniforms() {
        upload_declaration(backend, reflection, decl, bytes);
    }
}

fn slice(buffer: &[u8], offset: u32, size: u32) -> &[u8] {
    let (start, end) = (offset as usize, (offset + size) as usize);
    assert!(
        end <= buffer.len(),
        "uniform range {start}..{end} is outside a {} byte buffer",
        buffer.len()
    );
    &buffer[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingBackend;
    use crate::render::resolver::resolve_uniforms;
    use tessera_shader::{parse_stages, ShaderDomain, StageSources};

    const SOURCE: &str = "
        struct Light { vec3 position; float intensity; }
        uniform float u_Float;
        uniform int u_Int;
        uniform vec2 u_Vec2;
        uniform vec3 u_Vec3;
        uniform vec4 u_Vec4;
        uniform mat2 u_Mat2;
        uniform mat3 u_Mat3;
        uniform mat4 u_Mat4;
        uniform bool u_Bool;
        uniform float u_Weights[3];
        uniform bool u_Flags[2];
        uniform Light u_Lights[2];
    ";

    struct Fixture {
        backend: RecordingBackend,
        reflection: ShaderReflection,
        bytes: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let stages = StageSources::new("", SOURCE);
            let mut reflection = parse_stages(&stages).unwrap();
            let mut backend = RecordingBackend::new();
            let program = backend.create_program("upload", &stages).unwrap();
            resolve_uniforms(&mut backend, program, "upload", &mut reflection);
            backend.take_calls();
            let bytes = vec![0; reflection.material_size(ShaderDomain::Fragment) as usize];
            Self { backend, reflection, bytes }
        }

        fn write<T: Pod>(&mut self, name: &str, value: T) {
            let (_, leaf) = self.reflection.find_leaf(name).unwrap();
            let src = bytemuck::bytes_of(&value);
            assert_eq!(src.len(), leaf.size as usize);
            self.bytes[leaf.offset as usize..][..src.len()].copy_from_slice(src);
        }

        /// Dispatches one declaration and returns what reached the backend.
        fn upload(&mut self, name: &str) -> Vec<(String, UniformValue)> {
            let (_, decl) = self.reflection.find_uniform(name).unwrap();
            upload_declaration(&mut self.backend, &self.reflection, decl, &self.bytes);
            let out = self
                .backend
                .uploads()
                .into_iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect();
            self.backend.take_calls();
            out
        }
    }

    fn single(name: &str, value: UniformValue) -> Vec<(String, UniformValue)> {
        vec![(name.to_string(), value)]
    }

    #[test]
    fn every_single_value_type_round_trips() {
        let mut fx = Fixture::new();
        let mat3: [f32; 9] = std::array::from_fn(|i| i as f32 * 0.5);
        let mat4: [f32; 16] = std::array::from_fn(|i| 100.0 - i as f32);

        fx.write("u_Float", 1.5f32);
        fx.write("u_Int", -42i32);
        fx.write("u_Vec2", [1.0f32, 2.0]);
        fx.write("u_Vec3", [3.0f32, 4.0, 5.0]);
        fx.write("u_Vec4", [6.0f32, 7.0, 8.0, 9.0]);
        fx.write("u_Mat2", [1.0f32, 0.0, 0.0, 1.0]);
        fx.write("u_Mat3", mat3);
        fx.write("u_Mat4", mat4);
        fx.write("u_Bool", 1u32);

        assert_eq!(fx.upload("u_Float"), single("u_Float", UniformValue::Float(1.5)));
        assert_eq!(fx.upload("u_Int"), single("u_Int", UniformValue::Int(-42)));
        assert_eq!(fx.upload("u_Vec2"), single("u_Vec2", UniformValue::Vec2([1.0, 2.0])));
        assert_eq!(fx.upload("u_Vec3"), single("u_Vec3", UniformValue::Vec3([3.0, 4.0, 5.0])));
        assert_eq!(fx.upload("u_Vec4"), single("u_Vec4", UniformValue::Vec4([6.0, 7.0, 8.0, 9.0])));
        assert_eq!(fx.upload("u_Mat2"), single("u_Mat2", UniformValue::Mat2([1.0, 0.0, 0.0, 1.0])));
        assert_eq!(fx.upload("u_Mat3"), single("u_Mat3", UniformValue::Mat3(mat3)));
        assert_eq!(fx.upload("u_Mat4"), single("u_Mat4", UniformValue::Mat4(mat4)));
        assert_eq!(fx.upload("u_Bool"), single("u_Bool", UniformValue::Bool(true)));
    }

    #[test]
    fn arrays_upload_in_one_call() {
        let mut fx = Fixture::new();
        fx.write("u_Weights", [0.25f32, 0.5, 0.25]);
        fx.write("u_Flags", [0u32, 7]);

        assert_eq!(
            fx.upload("u_Weights"),
            single(
                "u_Weights",
                UniformValue::FloatArray { ty: UniformType::Float32, data: vec![0.25, 0.5, 0.25] }
            )
        );
        assert_eq!(fx.upload("u_Flags"), single("u_Flags", UniformValue::IntArray(vec![0, 1])));
    }

    #[test]
    fn struct_arrays_upload_per_leaf() {
        let mut fx = Fixture::new();
        fx.write("u_Lights[0].position", [1.0f32, 2.0, 3.0]);
        fx.write("u_Lights[0].intensity", 0.5f32);
        fx.write("u_Lights[1].position", [4.0f32, 5.0, 6.0]);
        fx.write("u_Lights[1].intensity", 2.0f32);

        assert_eq!(
            fx.upload("u_Lights"),
            vec![
                ("u_Lights[0].position".to_string(), UniformValue::Vec3([1.0, 2.0, 3.0])),
                ("u_Lights[0].intensity".to_string(), UniformValue::Float(0.5)),
                ("u_Lights[1].position".to_string(), UniformValue::Vec3([4.0, 5.0, 6.0])),
                ("u_Lights[1].intensity".to_string(), UniformValue::Float(2.0)),
            ]
        );
    }

    #[test]
    fn whole_buffer_upload_covers_every_declaration() {
        let mut fx = Fixture::new();
        upload_buffer(
            &mut fx.backend,
            &fx.reflection,
            BufferSlot::Material(ShaderDomain::Fragment),
            &fx.bytes,
        );
        // 11 plain declarations plus 4 struct leaves
        assert_eq!(fx.backend.uploads().len(), 15);
    }

    #[test]
    fn decode_reads_unaligned_bytes() {
        let mut bytes = vec![0u8; 1];
        bytes.extend_from_slice(bytemuck::bytes_of(&[2.0f32, -1.0]));
        assert_eq!(decode(UniformType::Vec2, 1, &bytes[1..]), UniformValue::Vec2([2.0, -1.0]));
    }

    #[test]
    #[should_panic]
    fn short_buffers_panic() {
        decode(UniformType::Mat4, 1, &[0u8; 16]);
    }
}
