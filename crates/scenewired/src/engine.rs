//! The engine boundary.
//!
//! The actual rendering engine is an external collaborator; the daemon
//! only ever talks to it through [`RenderEngine`]. Everything crossing
//! this trait is fully materialized: blob references are resolved to
//! bytes, transforms are in column-major memory layout reduced to their
//! affine block, plugin parameters have their `$<NAME>` markers expanded.
//!
//! [`NullEngine`] is the built-in implementation: it records what it is
//! given and synthesizes framebuffers, so the whole transport stack runs
//! and tests end to end without a renderer attached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use scenewire_core::message::{
    CameraSettings, ImageSettings, LightSettings, ObjectKind, PluginKind, RenderSettings,
};

/// A mesh with every buffer resolved to local bytes.
#[derive(Debug, Clone)]
pub struct ResolvedMesh {
    pub name: String,
    pub vertex_count: u32,
    pub triangle_count: u32,
    pub positions: Bytes,
    pub normals: Option<Bytes>,
    pub vertex_colors: Option<Bytes>,
    pub triangles: Bytes,
}

/// Failure inside the engine. The message travels back to the client in
/// `GenerateResult` where the protocol provides for it.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// What the daemon requires of a rendering engine.
///
/// One engine instance per connection; the daemon serializes all calls,
/// so implementations need `Send` but not `Sync`.
pub trait RenderEngine: Send {
    fn load_mesh(&mut self, mesh: &ResolvedMesh) -> EngineResult<()>;

    /// Generate a plugin instance (procedural geometry, volume loaders).
    /// `parameters` arrives with string values already expanded.
    fn generate_plugin_instance(
        &mut self,
        kind: PluginKind,
        name: &str,
        plugin_name: &str,
        parameters: &serde_json::Value,
    ) -> EngineResult<()>;

    /// Place named data in the world. `affine` is the 3×4 block: three
    /// basis columns, then the translation.
    fn place_object(
        &mut self,
        name: &str,
        kind: ObjectKind,
        affine: &[f32; 12],
        data_link: &str,
        material_link: Option<&str>,
    ) -> EngineResult<()>;

    fn apply_camera(&mut self, settings: &CameraSettings) -> EngineResult<()>;
    fn apply_image(&mut self, settings: &ImageSettings) -> EngineResult<()>;
    fn apply_render_settings(&mut self, settings: &RenderSettings) -> EngineResult<()>;
    fn apply_lights(&mut self, settings: &LightSettings) -> EngineResult<()>;

    fn clear_scene(&mut self);

    /// Prepare a render of `samples` progressive samples.
    fn begin_render(&mut self, samples: u32) -> EngineResult<()>;

    /// Render one sample and return its framebuffer (RGBA f32).
    fn render_sample(&mut self, sample: u32) -> EngineResult<Bytes>;
}

// ── Null engine ───────────────────────────────────────────────────────────────

/// Records scene state and synthesizes framebuffers. Not a renderer.
pub struct NullEngine {
    meshes: HashMap<String, ResolvedMesh>,
    objects: HashMap<String, String>,
    image: ImageSettings,
    generations: Option<Arc<AtomicUsize>>,
}

impl NullEngine {
    pub fn new() -> Self {
        Self {
            meshes: HashMap::new(),
            objects: HashMap::new(),
            image: ImageSettings {
                width: 8,
                height: 8,
                border: None,
            },
            generations: None,
        }
    }

    /// Count plugin-instance generations into `counter`. Tests use this
    /// to observe which updates reached the engine.
    pub fn with_generation_counter(counter: Arc<AtomicUsize>) -> Self {
        let mut engine = Self::new();
        engine.generations = Some(counter);
        engine
    }

    pub fn mesh(&self, name: &str) -> Option<&ResolvedMesh> {
        self.meshes.get(name)
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for NullEngine {
    fn load_mesh(&mut self, mesh: &ResolvedMesh) -> EngineResult<()> {
        tracing::debug!(
            mesh = %mesh.name,
            vertices = mesh.vertex_count,
            triangles = mesh.triangle_count,
            "null engine loaded mesh"
        );
        self.meshes.insert(mesh.name.clone(), mesh.clone());
        Ok(())
    }

    fn generate_plugin_instance(
        &mut self,
        kind: PluginKind,
        name: &str,
        plugin_name: &str,
        _parameters: &serde_json::Value,
    ) -> EngineResult<()> {
        tracing::debug!(?kind, name, plugin = plugin_name, "null engine generated instance");
        if let Some(counter) = &self.generations {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn place_object(
        &mut self,
        name: &str,
        _kind: ObjectKind,
        _affine: &[f32; 12],
        data_link: &str,
        _material_link: Option<&str>,
    ) -> EngineResult<()> {
        self.objects.insert(name.to_string(), data_link.to_string());
        Ok(())
    }

    fn apply_camera(&mut self, _settings: &CameraSettings) -> EngineResult<()> {
        Ok(())
    }

    fn apply_image(&mut self, settings: &ImageSettings) -> EngineResult<()> {
        self.image = *settings;
        Ok(())
    }

    fn apply_render_settings(&mut self, _settings: &RenderSettings) -> EngineResult<()> {
        Ok(())
    }

    fn apply_lights(&mut self, _settings: &LightSettings) -> EngineResult<()> {
        Ok(())
    }

    fn clear_scene(&mut self) {
        self.meshes.clear();
        self.objects.clear();
    }

    fn begin_render(&mut self, _samples: u32) -> EngineResult<()> {
        Ok(())
    }

    fn render_sample(&mut self, sample: u32) -> EngineResult<Bytes> {
        // One RGBA f32 pixel per image position, every channel the sample
        // number. Deterministic, so tests can assert on content.
        let pixels = (self.image.width * self.image.height) as usize;
        let channel = (sample as f32).to_le_bytes();
        let mut framebuffer = Vec::with_capacity(pixels * 16);
        for _ in 0..pixels * 4 {
            framebuffer.extend_from_slice(&channel);
        }
        Ok(Bytes::from(framebuffer))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
