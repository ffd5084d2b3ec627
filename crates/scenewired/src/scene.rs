//! Per-connection scene state.
//!
//! Each connection owns its own name-keyed maps and its own resource
//! cache; nothing here is shared across connections. The maps mirror
//! what has been handed to the engine so updates can be compared against
//! what the daemon already holds.

use std::collections::HashMap;

use scenewire_core::cache::ResourceCache;
use scenewire_core::digest::ContentDigest;
use scenewire_core::message::{MeshUpdate, ObjectUpdate, PluginKind};

/// What the daemon remembers about a generated plugin instance. A later
/// update matching all three fields skips regeneration entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInstanceState {
    pub kind: PluginKind,
    pub plugin_name: String,
    pub parameters_digest: ContentDigest,
}

/// Everything one connection has streamed in so far.
pub struct SceneState {
    /// Mesh declarations by name (the resolved bytes live in the cache
    /// and the engine).
    pub meshes: HashMap<String, MeshUpdate>,
    pub plugin_instances: HashMap<String, PluginInstanceState>,
    pub objects: HashMap<String, ObjectUpdate>,
    /// Digest → () for blobs this peer has sent; the entry retains the
    /// blob bytes for `Cached` reference resolution.
    pub cache: ResourceCache<()>,
}

impl SceneState {
    pub fn new() -> Self {
        Self {
            meshes: HashMap::new(),
            plugin_instances: HashMap::new(),
            objects: HashMap::new(),
            cache: ResourceCache::new(),
        }
    }

    /// Drop all named state. The blob cache survives a scene clear:
    /// content identity outlives the scene graph, and the client's send
    /// cache does not reset either.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.plugin_instances.clear();
        self.objects.clear();
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}
