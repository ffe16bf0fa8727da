use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use tessera_shader::{ShaderDomain, ShaderReflection, StageSources, UniformLocation};

use crate::render::{resolve_uniforms, ProgramId, RenderBackend, ResolveReport};

/// Programs whose shader was dropped, waiting for the render thread to destroy them.
pub(crate) type RetiredPrograms = Arc<Mutex<Vec<ProgramId>>>;

type ReloadCallback = Box<dyn Fn(&Shader) + Send + Sync>;

struct ShaderState {
    sources: StageSources,
    reflection: ShaderReflection,
    program: Option<ProgramId>,
}

/// A shader program together with its reflected uniform layout.
///
/// Shaders are shared as `Arc<Shader>`. Compilation, reload and program
/// destruction all happen on the render thread; producers only read the
/// layout. Each reload bumps [`Shader::generation`] so dependent material
/// buffers can tell their layout went stale.
pub struct Shader {
    name: String,
    state: RwLock<ShaderState>,
    generation: AtomicU64,
    reload_callbacks: Mutex<Vec<ReloadCallback>>,
    retired: RetiredPrograms,
}

impl Shader {
    pub(crate) fn new(
        name: impl Into<String>,
        sources: StageSources,
        reflection: ShaderReflection,
        retired: RetiredPrograms,
    ) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ShaderState { sources, reflection, program: None }),
            generation: AtomicU64::new(0),
            reload_callbacks: Mutex::new(Vec::new()),
            retired,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layout generation; starts at 0 and increments on every reload.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Backend program, `None` until compiled or after a failed compile.
    pub fn program(&self) -> Option<ProgramId> {
        self.state.read().program
    }

    pub fn is_compiled(&self) -> bool {
        self.program().is_some()
    }

    pub fn reflection(&self) -> MappedRwLockReadGuard<'_, ShaderReflection> {
        RwLockReadGuard::map(self.state.read(), |state| &state.reflection)
    }

    pub fn sources(&self) -> StageSources {
        self.state.read().sources.clone()
    }

    pub fn material_size(&self, domain: ShaderDomain) -> u32 {
        self.state.read().reflection.material_size(domain)
    }

    /// Resolved binding handle of a uniform or struct leaf (`u_Light.color`).
    pub fn location_of(&self, name: &str) -> Option<UniformLocation> {
        let state = self.state.read();
        let reflection = &state.reflection;
        if let Some((_, decl)) = reflection.find_uniform(name) {
            if !decl.ty().is_struct() {
                return decl.location();
            }
        }

        let root = name.split(['.', '[']).next().unwrap_or(name);
        let (_, decl) = reflection.find_uniform(root)?;
        let index = reflection.leaf_fields(decl).iter().position(|leaf| leaf.name == name)?;
        decl.field_locations().get(index).copied().flatten()
    }

    /// Registers `callback` to run on the render thread after every reload.
    pub fn on_reload(&self, callback: impl Fn(&Shader) + Send + Sync + 'static) {
        self.reload_callbacks.lock().push(Box::new(callback));
    }

    /// Compiles the current sources and resolves every binding.
    ///
    /// A compile or link failure is logged with the backend diagnostics and
    /// leaves the shader without a program.
    pub(crate) fn compile<B: RenderBackend + ?Sized>(&self, backend: &mut B) -> Option<ResolveReport> {
        let mut state = self.state.write();
        let ShaderState { sources, reflection, program } = &mut *state;

        match backend.create_program(&self.name, sources) {
            Ok(id) => {
                *program = Some(id);
                Some(resolve_uniforms(backend, id, &self.name, reflection))
            }
            Err(err) => {
                log::error!("shader '{}': {err}", self.name);
                *program = None;
                None
            }
        }
    }

    /// Replaces sources and layout, recompiles, and notifies reload listeners.
    pub(crate) fn swap<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        sources: StageSources,
        reflection: ShaderReflection,
    ) {
        {
            let mut state = self.state.write();
            if let Some(old) = state.program.take() {
                backend.destroy_program(old);
            }
            state.sources = sources;
            state.reflection = reflection;
            // Bumped under the write lock so a reflection guard always sees
            // the generation of the layout it points at.
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.compile(backend);
        let generation = self.generation();
        log::info!("shader '{}' reloaded (generation {generation})", self.name);

        for callback in self.reload_callbacks.lock().iter() {
            callback(self);
        }
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(program) = self.state.get_mut().program.take() {
            self.retired.lock().push(program);
        }
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("name", &self.name)
            .field("program", &self.program())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
