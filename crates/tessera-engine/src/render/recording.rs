//! Headless backend that records every call instead of talking to a GPU.
//!
//! Used by the test suite and by the studio inspector to replay a frame
//! without a graphics context.

use std::collections::{HashMap, HashSet};

use tessera_shader::{ShaderDomain, StageSources, UniformLocation};

use super::backend::{BackendError, PrimitiveType, ProgramId, RenderBackend, RenderPass, TextureId, UniformValue};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateProgram { name: String, program: ProgramId },
    DestroyProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    Upload { location: UniformLocation, value: UniformValue },
    BindTexture { unit: u32, texture: TextureId },
    SetClearColor([f32; 4]),
    Clear,
    SetViewport { x: u32, y: u32, width: u32, height: u32 },
    SetLineThickness(f32),
    DrawIndexed { count: u32, primitive: PrimitiveType, depth_test: bool },
    BeginRenderPass(RenderPass),
    EndRenderPass,
}

/// Recording backend.
///
/// Binding handles are handed out sequentially per program, the first time
/// a name is looked up. Names registered with [`RecordingBackend::with_inactive_uniform`]
/// report a miss, like uniforms a driver optimized away.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    next_program: u32,
    next_location: u32,
    live_programs: HashSet<ProgramId>,
    locations: HashMap<(ProgramId, String), UniformLocation>,
    location_names: HashMap<UniformLocation, String>,
    inactive: HashSet<String>,
    fail_marker: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `name` as missing from every program.
    pub fn with_inactive_uniform(mut self, name: impl Into<String>) -> Self {
        self.inactive.insert(name.into());
        self
    }

    /// Fails compilation of any stage whose source contains `marker`.
    pub fn with_compile_failure(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Returns and forgets every recorded call.
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Uploads in call order, with handles mapped back to uniform names.
    pub fn uploads(&self) -> Vec<(&str, &UniformValue)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Upload { location, value } => Some((self.location_name(*location)?, value)),
                _ => None,
            })
            .collect()
    }

    /// Name a handle was issued for.
    pub fn location_name(&self, location: UniformLocation) -> Option<&str> {
        self.location_names.get(&location).map(String::as_str)
    }

    /// Programs created and not yet destroyed.
    pub fn live_programs(&self) -> usize {
        self.live_programs.len()
    }

    pub fn is_live(&self, program: ProgramId) -> bool {
        self.live_programs.contains(&program)
    }
}

impl RenderBackend for RecordingBackend {
    fn create_program(&mut self, name: &str, sources: &StageSources) -> Result<ProgramId, BackendError> {
        if let Some(marker) = &self.fail_marker {
            for domain in ShaderDomain::ALL {
                if sources.get(domain).contains(marker.as_str()) {
                    return Err(BackendError::new(
                        format!("{} compile", domain.name()),
                        format!("{name}: unexpected `{marker}`"),
                    ));
                }
            }
        }

        self.next_program += 1;
        let program = ProgramId(self.next_program);
        self.live_programs.insert(program);
        self.calls.push(BackendCall::CreateProgram { name: name.to_string(), program });
        log::trace!("RecordingBackend: created program {program:?} for {name}");
        Ok(program)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.live_programs.remove(&program);
        self.calls.push(BackendCall::DestroyProgram(program));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if self.inactive.contains(name) || !self.live_programs.contains(&program) {
            return None;
        }
        let key = (program, name.to_string());
        if let Some(location) = self.locations.get(&key) {
            return Some(*location);
        }
        let location = UniformLocation(self.next_location);
        self.next_location += 1;
        self.locations.insert(key, location);
        self.location_names.insert(location, name.to_string());
        Some(location)
    }

    fn upload_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.calls.push(BackendCall::Upload { location, value });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.calls.push(BackendCall::BindTexture { unit, texture });
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.calls.push(BackendCall::SetClearColor(color));
    }

    fn clear(&mut self) {
        self.calls.push(BackendCall::Clear);
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.calls.push(BackendCall::SetViewport { x, y, width, height });
    }

    fn set_line_thickness(&mut self, thickness: f32) {
        self.calls.push(BackendCall::SetLineThickness(thickness));
    }

    fn draw_indexed(&mut self, count: u32, primitive: PrimitiveType, depth_test: bool) {
        self.calls.push(BackendCall::DrawIndexed { count, primitive, depth_test });
    }

    fn begin_render_pass(&mut self, pass: &RenderPass) {
        self.calls.push(BackendCall::BeginRenderPass(pass.clone()));
    }

    fn end_render_pass(&mut self) {
        self.calls.push(BackendCall::EndRenderPass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_are_stable_per_program_and_name() {
        let mut backend = RecordingBackend::new();
        let stages = StageSources::new("v", "f");
        let a = backend.create_program("a", &stages).unwrap();
        let b = backend.create_program("b", &stages).unwrap();

        let first = backend.uniform_location(a, "u_Color");
        assert_eq!(backend.uniform_location(a, "u_Color"), first);
        assert_ne!(backend.uniform_location(b, "u_Color"), first);
        assert_eq!(backend.location_name(first.unwrap()), Some("u_Color"));
    }

    #[test]
    fn inactive_uniforms_and_dead_programs_miss() {
        let mut backend = RecordingBackend::new().with_inactive_uniform("u_Unused");
        let program = backend.create_program("s", &StageSources::new("v", "f")).unwrap();
        assert!(backend.uniform_location(program, "u_Unused").is_none());

        backend.destroy_program(program);
        assert_eq!(backend.live_programs(), 0);
        assert!(backend.uniform_location(program, "u_Color").is_none());
    }

    #[test]
    fn compile_failure_marker() {
        let mut backend = RecordingBackend::new().with_compile_failure("#error");
        let err = backend
            .create_program("broken", &StageSources::new("void main() {}", "#error nope"))
            .unwrap_err();
        assert_eq!(err.stage, "fragment compile");
        assert!(backend.calls().is_empty());
    }
}
