//! Binding-handle resolution after a program links.

use tessera_shader::{BufferSlot, ShaderReflection, UniformLocation};

use super::backend::{ProgramId, RenderBackend, UniformValue};

/// Outcome of one resolution pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveReport {
    /// Uniform names (struct leaves included) that received a handle.
    pub resolved: usize,
    /// Names the backend did not know, uniforms and resources alike.
    pub missing: Vec<String>,
    /// Texture units handed out to resources.
    pub texture_units: u32,
}

/// Looks up binding handles for every declaration of `reflection`.
///
/// Buffers are walked renderer vertex, renderer fragment, material vertex,
/// material fragment. Struct declarations resolve one handle per leaf
/// (`u_Light.position`, `u_Lights[1].color`). Resources get sequential
/// texture units from 0, uploaded with the program bound. Misses are
/// logged and leave the handle unset, so later uploads skip it.
pub fn resolve_uniforms<B: RenderBackend + ?Sized>(
    backend: &mut B,
    program: ProgramId,
    shader: &str,
    reflection: &mut ShaderReflection,
) -> ResolveReport {
    let mut report = ResolveReport::default();

    for slot in BufferSlot::RESOLVE_ORDER {
        let Some(buffer) = reflection.buffer(slot) else { continue };
        // Leaf names need the struct table, so collect them before borrowing the buffer mutably.
        let names: Vec<Vec<String>> = buffer
            .uniforms()
            .iter()
            .map(|decl| {
                if decl.ty().is_struct() {
                    reflection.leaf_fields(decl).into_iter().map(|leaf| leaf.name).collect()
                } else {
                    vec![decl.name().to_string()]
                }
            })
            .collect();

        let Some(buffer) = reflection.buffer_mut(slot) else { continue };
        for (decl, names) in buffer.uniforms_mut().iter_mut().zip(names) {
            let locations: Vec<Option<UniformLocation>> = names
                .into_iter()
                .map(|name| lookup(backend, program, shader, name, &mut report))
                .collect();
            if decl.ty().is_struct() {
                decl.set_field_locations(locations);
            } else {
                decl.set_location(locations.into_iter().next().flatten());
            }
        }
    }

    backend.use_program(Some(program));
    let mut unit = 0u32;
    for resource in reflection.resources_mut() {
        resource.set_unit(Some(unit));
        match backend.uniform_location(program, resource.name()) {
            Some(location) => {
                let value = if resource.count() > 1 {
                    UniformValue::IntArray((unit..unit + resource.count()).map(|u| u as i32).collect())
                } else {
                    UniformValue::Int(unit as i32)
                };
                backend.upload_uniform(location, value);
                report.resolved += 1;
            }
            None => {
                log::warn!("shader '{shader}': resource '{}' not found", resource.name());
                report.missing.push(resource.name().to_string());
            }
        }
        unit += resource.count();
    }
    report.texture_units = unit;

    log::debug!(
        "shader '{shader}': resolved {} uniforms, {} missing, {} texture units",
        report.resolved,
        report.missing.len(),
        report.texture_units
    );
    report
}

fn lookup<B: RenderBackend + ?Sized>(
    backend: &mut B,
    program: ProgramId,
    shader: &str,
    name: String,
    report: &mut ResolveReport,
) -> Option<UniformLocation> {
    let location = backend.uniform_location(program, &name);
    if location.is_some() {
        report.resolved += 1;
    } else {
        log::warn!("shader '{shader}': uniform '{name}' not found");
        report.missing.push(name);
    }
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{BackendCall, RecordingBackend};
    use tessera_shader::{parse_stages, ShaderDomain, StageSources};

    fn setup(backend: &mut RecordingBackend, vertex: &str, fragment: &str) -> (ProgramId, ShaderReflection) {
        let stages = StageSources::new(vertex, fragment);
        let reflection = parse_stages(&stages).unwrap();
        let program = backend.create_program("test", &stages).unwrap();
        (program, reflection)
    }

    #[test]
    fn struct_uniforms_resolve_per_field() {
        let mut backend = RecordingBackend::new();
        let (program, mut refl) = setup(
            &mut backend,
            "uniform mat4 r_ViewProjection;",
            "struct Light { vec3 position; float intensity; }\nuniform Light u_Light;\nuniform float u_Gamma;",
        );
        let report = resolve_uniforms(&mut backend, program, "test", &mut refl);
        assert_eq!(report.resolved, 4);
        assert!(report.missing.is_empty());

        let (_, light) = refl.find_uniform("u_Light").unwrap();
        assert!(light.location().is_none());
        let names: Vec<&str> = light
            .field_locations()
            .iter()
            .map(|l| backend.location_name(l.unwrap()).unwrap())
            .collect();
        assert_eq!(names, vec!["u_Light.position", "u_Light.intensity"]);

        let (_, gamma) = refl.find_uniform("u_Gamma").unwrap();
        assert_eq!(backend.location_name(gamma.location().unwrap()), Some("u_Gamma"));
    }

    #[test]
    fn buffers_resolve_renderer_first() {
        let mut backend = RecordingBackend::new();
        let (program, mut refl) = setup(
            &mut backend,
            "uniform vec4 u_VertexTint;\nuniform mat4 r_Transform;",
            "uniform float u_Alpha;\nuniform vec3 r_CameraPosition;",
        );
        resolve_uniforms(&mut backend, program, "test", &mut refl);

        // Handles are issued in lookup order.
        let order: Vec<u32> = ["r_Transform", "r_CameraPosition", "u_VertexTint", "u_Alpha"]
            .iter()
            .map(|name| refl.find_uniform(name).unwrap().1.location().unwrap().0)
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn misses_are_reported_not_fatal() {
        let mut backend = RecordingBackend::new()
            .with_inactive_uniform("u_Unused")
            .with_inactive_uniform("u_Light.intensity");
        let (program, mut refl) = setup(
            &mut backend,
            "",
            "struct Light { vec3 position; float intensity; }\nuniform Light u_Light;\nuniform float u_Unused;",
        );
        let report = resolve_uniforms(&mut backend, program, "test", &mut refl);
        assert_eq!(report.missing, vec!["u_Light.intensity".to_string(), "u_Unused".to_string()]);

        let (_, light) = refl.find_uniform("u_Light").unwrap();
        assert!(light.field_locations()[0].is_some());
        assert!(light.field_locations()[1].is_none());
        assert!(refl.find_uniform("u_Unused").unwrap().1.location().is_none());
    }

    #[test]
    fn resources_take_sequential_units() {
        let mut backend = RecordingBackend::new();
        let (program, mut refl) = setup(
            &mut backend,
            "",
            "uniform sampler2D u_Albedo;\nuniform sampler2DShadow u_Cascades[3];\nuniform samplerCube u_Env;",
        );
        backend.take_calls();
        let report = resolve_uniforms(&mut backend, program, "test", &mut refl);
        assert_eq!(report.texture_units, 5);

        let units: Vec<Option<u32>> = refl.resources().iter().map(|r| r.unit()).collect();
        assert_eq!(units, vec![Some(0), Some(1), Some(4)]);

        let calls = backend.calls();
        assert_eq!(calls[0], BackendCall::UseProgram(Some(program)));
        let uploads: Vec<&UniformValue> = backend.uploads().into_iter().map(|(_, v)| v).collect();
        assert_eq!(
            uploads,
            vec![
                &UniformValue::Int(0),
                &UniformValue::IntArray(vec![1, 2, 3]),
                &UniformValue::Int(4),
            ]
        );
    }

    #[test]
    fn reflection_without_material_buffers() {
        let mut backend = RecordingBackend::new();
        let (program, mut refl) = setup(&mut backend, "uniform mat4 r_MVP;", "");
        let report = resolve_uniforms(&mut backend, program, "test", &mut refl);
        assert_eq!(report.resolved, 1);
        assert!(refl.material_buffer(ShaderDomain::Fragment).is_none());
    }
}
