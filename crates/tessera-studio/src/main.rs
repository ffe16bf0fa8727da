use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tessera_engine::logging::{init_logging, LoggingConfig};
use tessera_engine::render::{BackendCall, PrimitiveType, RecordingBackend, RenderPass, Renderer, RendererConfig, TextureId};
use tessera_engine::shader::{Material, Shader};
use tessera_shader::{BufferSlot, ShaderReflection, ShaderUniformBuffer, UniformDeclaration};

const DEMO_SHADER: &str = include_str!("../shaders/lit.glsl");

/// Tessera shader inspector.
#[derive(Parser, Debug)]
#[command(
    name = "tessera-studio",
    about = "Prints the uniform layout of a shader and replays one frame through the recording backend",
    version
)]
struct Args {
    /// Shader file with `#type vertex` / `#type fragment` sections.
    /// The bundled demo shader is used when omitted.
    shader: Option<PathBuf>,

    /// Only print the layout; skip the frame replay.
    #[arg(long)]
    layout_only: bool,

    /// Uniforms the recording backend should report as inactive.
    #[arg(long = "inactive", value_name = "NAME")]
    inactive: Vec<String>,

    /// Log filter, e.g. `tessera_engine=debug`.
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig { env_filter: args.log.clone(), ..LoggingConfig::default() });

    let (name, source) = match &args.shader {
        Some(path) => {
            let source =
                std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("shader").to_string();
            (name, source)
        }
        None => ("lit".to_string(), DEMO_SHADER.to_string()),
    };

    println!();
    println!("  ╔════════════════════════════════════════╗");
    println!("  ║        TESSERA SHADER STUDIO v0.1      ║");
    println!("  ║   uniform reflection  ·  frame replay  ║");
    println!("  ╚════════════════════════════════════════╝");
    println!();

    let mut backend = RecordingBackend::new();
    for uniform in &args.inactive {
        backend = backend.with_inactive_uniform(uniform.as_str());
    }
    let mut renderer = Renderer::new(backend, RendererConfig::default());
    let shader = renderer.load_shader(&name, &source)?;
    renderer.render();

    print_layout(&name, &shader.reflection());
    if args.layout_only {
        return Ok(());
    }

    replay_frame(&mut renderer, &shader)
}

// ── Layout ────────────────────────────────────────────────────────────────

fn print_layout(name: &str, reflection: &ShaderReflection) {
    println!("  [SHADER] {name}");
    println!();

    for st in reflection.structs() {
        println!("  struct {}  ({} bytes)", st.name(), st.size());
        for field in st.fields() {
            println!("    {}", row(field, reflection));
        }
        println!();
    }

    for slot in BufferSlot::RESOLVE_ORDER {
        if let Some(buffer) = reflection.buffer(slot) {
            print_buffer(buffer, reflection);
        }
    }

    if !reflection.resources().is_empty() {
        println!("  resources");
        for res in reflection.resources() {
            let unit = res.unit().map_or("-".to_string(), |u| u.to_string());
            println!("    {:<24} {:<16} x{:<3} unit {unit}", res.name(), res.ty().glsl_name(), res.count());
        }
        println!();
    }
}

fn print_buffer(buffer: &ShaderUniformBuffer, reflection: &ShaderReflection) {
    if buffer.is_empty() {
        return;
    }
    println!("  {} buffer ({})  {} bytes", buffer.name(), buffer.domain().name(), buffer.size());
    for decl in buffer.uniforms() {
        let handle = if decl.ty().is_struct() {
            let bound = decl.field_locations().iter().filter(|l| l.is_some()).count();
            format!("{bound}/{} fields bound", decl.field_locations().len())
        } else {
            decl.location().map_or("unbound".to_string(), |l| format!("location {}", l.0))
        };
        println!("    {}  {handle}", row(decl, reflection));
    }
    println!();
}

fn row(decl: &UniformDeclaration, reflection: &ShaderReflection) -> String {
    let ty = match decl.struct_id() {
        Some(id) => reflection.get_struct(id).name(),
        None => decl.ty().glsl_name(),
    };
    format!(
        "{:<24} {:<10} x{:<3} @{:<5} {:>4} B",
        decl.name(),
        ty,
        decl.count(),
        decl.offset(),
        decl.size()
    )
}

// ── Frame replay ──────────────────────────────────────────────────────────

/// Records one frame that binds a default material and draws a quad.
fn replay_frame(renderer: &mut Renderer<RecordingBackend>, shader: &Arc<Shader>) -> Result<()> {
    renderer.backend_mut().take_calls();
    if !shader.is_compiled() {
        bail!("shader '{}' did not compile; see the log", shader.name());
    }

    log::debug!("replaying one frame of '{}'", shader.name());
    let material = Arc::new(Material::new(Arc::clone(shader)));
    let resources: Vec<(String, u32)> =
        shader.reflection().resources().iter().map(|r| (r.name().to_string(), r.count())).collect();
    for (slot, (name, count)) in resources.iter().enumerate() {
        for index in 0..*count {
            material.set_texture_at(name, index, TextureId(100 * (slot as u32 + 1) + index));
        }
    }

    renderer.begin_render_pass(RenderPass::new("studio").with_clear([0.0, 0.0, 0.0, 1.0]));
    renderer.set_viewport(0, 0, 1280, 720);
    renderer.bind_material(&material);
    renderer.draw_indexed(6, PrimitiveType::Triangles, true);
    renderer.end_render_pass();
    let stats = renderer.render();

    println!("  [FRAME] {} commands replayed", stats.commands);
    println!();
    let backend = renderer.backend();
    for call in backend.calls() {
        match call {
            BackendCall::Upload { location, value } => {
                let name = backend.location_name(*location).unwrap_or("?");
                println!("    upload   {name:<24} {value:?}");
            }
            other => println!("    {other:?}"),
        }
    }
    println!();
    Ok(())
}
