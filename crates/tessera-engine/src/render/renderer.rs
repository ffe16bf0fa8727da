use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tessera_shader::{parse_str, UniformType, RENDERER_UNIFORM_PREFIX};

use super::backend::{PrimitiveType, RenderBackend, RenderPass, UniformValue};
use super::config::RendererConfig;
use super::queue::CommandQueue;
use crate::shader::{Material, RetiredPrograms, Shader};

/// Counters for one `render()` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    /// 1-based index of the frame just rendered.
    pub frame_index: u64,
    pub commands: usize,
    /// Programs destroyed because their last shader handle was dropped.
    pub released_programs: usize,
    /// Bytes currently held by the command queue.
    pub arena_capacity: usize,
}

/// Deferred rendering façade.
///
/// Every mutating call captures its arguments into a closure and queues it;
/// nothing touches the backend until [`Renderer::render`] replays the queue
/// on the thread that owns the renderer. Calls may come from any thread
/// (given `B: Sync`); commands from one thread keep their order, and
/// commands from different threads interleave in submission order.
///
/// Per-call uniform uploads capture their value at submission. Material
/// binds capture the material itself, so they upload whatever it holds
/// when the frame is rendered.
pub struct Renderer<B: RenderBackend> {
    backend: B,
    queue: CommandQueue<B>,
    config: RendererConfig,
    retired: RetiredPrograms,
    open_pass: Mutex<Option<String>>,
    frame_index: u64,
}

impl<B: RenderBackend> Renderer<B> {
    pub fn new(backend: B, config: RendererConfig) -> Self {
        log::info!(
            "renderer started ({} KiB command arena)",
            config.initial_queue_capacity / 1024
        );
        let renderer = Self {
            backend,
            queue: CommandQueue::with_capacity(config.initial_queue_capacity),
            config,
            retired: RetiredPrograms::default(),
            open_pass: Mutex::new(None),
            frame_index: 0,
        };
        renderer.set_clear_color(renderer.config.clear_color);
        renderer
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Commands waiting for the next frame.
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Queues an arbitrary backend call.
    pub fn submit<F>(&self, command: F)
    where
        F: FnOnce(&mut B) + Send + 'static,
    {
        self.queue.submit(command);
    }

    // ── State and draws ───────────────────────────────────────────────────

    pub fn set_clear_color(&self, color: [f32; 4]) {
        self.submit(move |backend| backend.set_clear_color(color));
    }

    pub fn clear(&self) {
        self.submit(|backend| backend.clear());
    }

    pub fn set_viewport(&self, x: u32, y: u32, width: u32, height: u32) {
        self.submit(move |backend| backend.set_viewport(x, y, width, height));
    }

    pub fn set_line_thickness(&self, thickness: f32) {
        self.submit(move |backend| backend.set_line_thickness(thickness));
    }

    pub fn draw_indexed(&self, count: u32, primitive: PrimitiveType, depth_test: bool) {
        self.submit(move |backend| backend.draw_indexed(count, primitive, depth_test));
    }

    /// Opens a render pass.
    ///
    /// # Panics
    /// Panics if another pass is still open.
    pub fn begin_render_pass(&self, pass: RenderPass) {
        {
            let mut open = self.open_pass.lock();
            if let Some(current) = open.as_deref() {
                panic!("render pass '{}' begun while '{current}' is still open", pass.label);
            }
            *open = Some(pass.label.clone());
        }
        self.submit(move |backend| backend.begin_render_pass(&pass));
    }

    /// # Panics
    /// Panics if no pass is open.
    pub fn end_render_pass(&self) {
        if self.open_pass.lock().take().is_none() {
            panic!("end_render_pass without an open render pass");
        }
        self.submit(|backend| backend.end_render_pass());
    }

    // ── Shaders ───────────────────────────────────────────────────────────

    /// Parses a `#type`-sectioned shader and queues its compilation.
    ///
    /// Parse errors are returned immediately. Compile and link errors surface
    /// on the render thread, in the log, and leave the shader uncompiled.
    pub fn load_shader(&self, name: &str, source: &str) -> Result<Arc<Shader>> {
        let (stages, reflection) = parse_str(source).with_context(|| format!("failed to parse shader '{name}'"))?;
        let shader = Arc::new(Shader::new(name, stages, reflection, Arc::clone(&self.retired)));

        let compiled = Arc::clone(&shader);
        self.submit(move |backend| {
            compiled.compile(backend);
        });
        log::info!("shader '{name}' loaded");
        Ok(shader)
    }

    /// Loads a shader file, named after its file stem.
    pub fn load_shader_file(&self, path: impl AsRef<Path>) -> Result<Arc<Shader>> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).with_context(|| format!("failed to read shader {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("shader path {} has no usable file name", path.display()))?;
        self.load_shader(name, &source)
    }

    /// Re-parses `source` now and swaps it into `shader` on the render thread.
    ///
    /// The swap destroys the old program, compiles the new one, re-resolves
    /// every binding, bumps the shader's generation and runs its reload callbacks.
    pub fn reload_shader(&self, shader: &Arc<Shader>, source: &str) -> Result<()> {
        let (stages, reflection) =
            parse_str(source).with_context(|| format!("failed to parse shader '{}'", shader.name()))?;
        let shader = Arc::clone(shader);
        self.submit(move |backend| shader.swap(backend, stages, reflection));
        Ok(())
    }

    pub fn bind_shader(&self, shader: &Arc<Shader>) {
        let shader = Arc::clone(shader);
        self.submit(move |backend| {
            if shader.program().is_none() {
                log::warn!("binding shader '{}' without a compiled program", shader.name());
            }
            backend.use_program(shader.program());
        });
    }

    pub fn unbind_shader(&self) {
        self.submit(|backend| backend.use_program(None));
    }

    /// Uploads one value to a uniform (or struct leaf) of `shader`.
    ///
    /// The value is captured now. The upload binds the shader's program and
    /// is skipped when the uniform has no binding handle.
    ///
    /// # Panics
    /// Panics if the value's type does not match the declaration.
    pub fn set_uniform(&self, shader: &Arc<Shader>, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        if let Some((_, leaf)) = shader.reflection().find_leaf(name) {
            assert!(
                value_fits(&value, leaf.ty, leaf.count),
                "value {:?} does not match uniform '{name}' ({} x{})",
                value,
                leaf.ty.glsl_name(),
                leaf.count
            );
        }

        let shader = Arc::clone(shader);
        let name = name.to_string();
        self.submit(move |backend| {
            let (Some(program), Some(location)) = (shader.program(), shader.location_of(&name)) else {
                return;
            };
            backend.use_program(Some(program));
            backend.upload_uniform(location, value);
        });
    }

    /// Like [`Renderer::set_uniform`], restricted to renderer-owned (`r_`) uniforms.
    pub fn set_renderer_uniform(&self, shader: &Arc<Shader>, name: &str, value: impl Into<UniformValue>) {
        assert!(
            name.starts_with(RENDERER_UNIFORM_PREFIX),
            "'{name}' is not a renderer uniform (missing '{RENDERER_UNIFORM_PREFIX}' prefix)"
        );
        self.set_uniform(shader, name, value);
    }

    /// Binds the material's shader, uploads its buffers and binds its textures.
    ///
    /// The material is read when the frame renders, not now.
    pub fn bind_material(&self, material: &Arc<Material>) {
        let material = Arc::clone(material);
        self.submit(move |backend| {
            let shader = material.shader();
            let Some(program) = shader.program() else {
                log::warn!("material of '{}' bound without a compiled program", shader.name());
                return;
            };
            backend.use_program(Some(program));
            material.upload(backend);
        });
    }

    // ── Frame ─────────────────────────────────────────────────────────────

    /// Replays every queued command, then destroys programs of dropped shaders.
    pub fn render(&mut self) -> FrameStats {
        let commands = self.queue.execute(&mut self.backend);
        let released_programs = self.release_programs();
        self.frame_index += 1;

        let stats = FrameStats {
            frame_index: self.frame_index,
            commands,
            released_programs,
            arena_capacity: self.queue.capacity(),
        };
        if self.config.log_frame_stats {
            log::trace!(
                "frame {}: {} commands, {} programs released, {} byte arena",
                stats.frame_index,
                stats.commands,
                stats.released_programs,
                stats.arena_capacity
            );
        }
        stats
    }

    fn release_programs(&mut self) -> usize {
        let retired = std::mem::take(&mut *self.retired.lock());
        for &program in &retired {
            self.backend.destroy_program(program);
        }
        retired.len()
    }

    /// Runs the commands still queued and hands the backend back.
    pub fn shutdown(mut self) -> B {
        if let Some(pass) = self.open_pass.get_mut().take() {
            log::warn!("shutting down inside render pass '{pass}'");
        }
        let commands = self.queue.execute(&mut self.backend);
        self.release_programs();
        log::info!("renderer shut down after {} frames ({commands} trailing commands)", self.frame_index);
        self.backend
    }
}

fn value_fits(value: &UniformValue, ty: UniformType, count: u32) -> bool {
    match value {
        UniformValue::IntArray(data) => {
            matches!(ty, UniformType::Int32 | UniformType::Bool) && data.len() == count as usize
        }
        UniformValue::FloatArray { ty: element, data } => {
            *element == ty && data.len() == (ty.components() * count) as usize
        }
        single => single.ty() == ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{BackendCall, RecordingBackend};

    fn renderer() -> Renderer<RecordingBackend> {
        let config = RendererConfig { initial_queue_capacity: 1024, ..Default::default() };
        let mut renderer = Renderer::new(RecordingBackend::new(), config);
        renderer.render();
        renderer.backend_mut().take_calls();
        renderer
    }

    #[test]
    fn calls_are_deferred_until_render() {
        let mut renderer = renderer();
        renderer.set_clear_color([1.0, 0.0, 0.0, 1.0]);
        renderer.clear();
        renderer.draw_indexed(6, PrimitiveType::Triangles, true);
        assert!(renderer.backend().calls().is_empty());
        assert_eq!(renderer.pending_commands(), 3);

        let stats = renderer.render();
        assert_eq!(stats.commands, 3);
        assert_eq!(stats.frame_index, 2);
        assert_eq!(
            renderer.backend().calls(),
            &[
                BackendCall::SetClearColor([1.0, 0.0, 0.0, 1.0]),
                BackendCall::Clear,
                BackendCall::DrawIndexed { count: 6, primitive: PrimitiveType::Triangles, depth_test: true },
            ]
        );
    }

    #[test]
    fn initial_clear_color_is_queued() {
        let mut renderer = Renderer::new(RecordingBackend::new(), RendererConfig::default());
        renderer.render();
        assert_eq!(renderer.backend().calls(), &[BackendCall::SetClearColor([0.1, 0.1, 0.1, 1.0])]);
    }

    #[test]
    #[should_panic(expected = "still open")]
    fn nested_render_passes_panic() {
        let renderer = renderer();
        renderer.begin_render_pass(RenderPass::new("shadow"));
        renderer.begin_render_pass(RenderPass::new("main"));
    }

    #[test]
    #[should_panic(expected = "without an open render pass")]
    fn unmatched_end_panics() {
        renderer().end_render_pass();
    }

    #[test]
    fn parse_errors_are_returned() {
        let renderer = renderer();
        let err = renderer
            .load_shader("broken", "#type vertex\nuniform Missing u_M;\n#type fragment\n")
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("failed to parse shader 'broken'"));
        assert!(message.contains("unknown type 'Missing'"));
        assert_eq!(renderer.pending_commands(), 0);
    }

    #[test]
    fn value_shapes_are_checked() {
        assert!(value_fits(&UniformValue::Float(1.0), UniformType::Float32, 1));
        assert!(value_fits(&UniformValue::IntArray(vec![1, 0]), UniformType::Bool, 2));
        assert!(value_fits(
            &UniformValue::FloatArray { ty: UniformType::Vec2, data: vec![0.0; 6] },
            UniformType::Vec2,
            3
        ));
        assert!(!value_fits(&UniformValue::Vec3([0.0; 3]), UniformType::Vec4, 1));
        assert!(!value_fits(&UniformValue::IntArray(vec![1]), UniformType::Int32, 2));
    }
}
