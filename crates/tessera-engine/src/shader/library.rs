use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::RwLock;

use super::program::Shader;
use crate::render::{RenderBackend, Renderer};

/// Name-indexed registry of loaded shaders.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: RwLock<HashMap<String, Arc<Shader>>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `shader` under its own name. Names must be unique.
    pub fn add(&self, shader: Arc<Shader>) -> Result<()> {
        let mut shaders = self.shaders.write();
        if shaders.contains_key(shader.name()) {
            bail!("shader '{}' is already in the library", shader.name());
        }
        shaders.insert(shader.name().to_string(), shader);
        Ok(())
    }

    /// Parses and queues compilation of `source`, then registers the shader.
    pub fn load<B: RenderBackend>(&self, renderer: &Renderer<B>, name: &str, source: &str) -> Result<Arc<Shader>> {
        if self.contains(name) {
            bail!("shader '{name}' is already in the library");
        }
        let shader = renderer.load_shader(name, source)?;
        self.add(Arc::clone(&shader))?;
        Ok(shader)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Shader>> {
        self.shaders.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Shader>> {
        self.shaders.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.shaders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted shader names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shaders.read().keys().cloned().collect();
        names.sort();
        names
    }
}
