//! Protocol schema — every message exchanged between client and daemon.
//!
//! Messages are serde types carried as serde_json payloads inside frames
//! (see [`crate::frame`]). The framing layer stays format-agnostic; this
//! module is the only place that names the serialization format.
//!
//! Large binary buffers never ride inside a message. A message declares
//! them as [`BlobRef`]s, and inline blob bytes follow as raw frames in
//! declaration order.

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::frame::{DecodePayload, EncodePayload, FrameError};

/// Protocol version carried in `Hello`. The daemon rejects any other value.
pub const PROTOCOL_VERSION: u32 = 2;

/// Default daemon TCP port.
pub const DEFAULT_PORT: u16 = 5909;

// ── Blob references ───────────────────────────────────────────────────────────

/// Reference to a binary buffer attached to a message.
///
/// `Inline` means the raw bytes follow as the next frames on the
/// connection, in declaration order. `Cached` means the receiver has seen
/// this digest before and resolves it locally; nothing follows on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlobRef {
    Inline { digest: ContentDigest, byte_len: u64 },
    Cached { digest: ContentDigest, byte_len: u64 },
}

impl BlobRef {
    pub fn digest(&self) -> ContentDigest {
        match self {
            BlobRef::Inline { digest, .. } | BlobRef::Cached { digest, .. } => *digest,
        }
    }

    pub fn byte_len(&self) -> u64 {
        match self {
            BlobRef::Inline { byte_len, .. } | BlobRef::Cached { byte_len, .. } => *byte_len,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, BlobRef::Inline { .. })
    }
}

// ── Scene payloads ────────────────────────────────────────────────────────────

/// Triangle mesh data under a client-chosen name.
///
/// Blob wire order: positions, normals, vertex_colors, triangles, with
/// absent options skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshUpdate {
    pub name: String,
    pub vertex_count: u32,
    pub triangle_count: u32,

    /// vertex_count × 3 f32.
    pub positions: BlobRef,

    /// vertex_count × 3 f32.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<BlobRef>,

    /// vertex_count × 4 f32.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_colors: Option<BlobRef>,

    /// triangle_count × 3 u32 vertex indices.
    pub triangles: BlobRef,
}

impl MeshUpdate {
    /// Blob references in wire declaration order.
    pub fn blob_refs(&self) -> Vec<&BlobRef> {
        let mut refs = vec![&self.positions];
        if let Some(normals) = &self.normals {
            refs.push(normals);
        }
        if let Some(colors) = &self.vertex_colors {
            refs.push(colors);
        }
        refs.push(&self.triangles);
        refs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Mesh,
    Geometry,
    Scene,
    Volume,
    Slices,
    Isosurfaces,
}

/// Places a named data block in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub name: String,
    pub kind: ObjectKind,

    /// Row-major wire transform; see [`crate::transform::from_wire`].
    pub object2world: [f32; 16],

    /// Name of the mesh or plugin instance this object places.
    pub data_link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_link: Option<String>,

    #[serde(default)]
    pub custom_properties: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Geometry,
    Volume,
    Scene,
}

/// Server-side plugin instance (procedural geometry, volume loaders).
///
/// String values in `parameters` may contain `$<NAME>` markers; the daemon
/// expands them before the instance is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInstanceUpdate {
    pub kind: PluginKind,
    pub name: String,
    pub plugin_name: String,

    #[serde(default)]
    pub parameters: serde_json::Value,

    #[serde(default)]
    pub custom_properties: serde_json::Value,
}

impl PluginInstanceUpdate {
    /// Digest of the canonical parameter serialization.
    ///
    /// The daemon skips regeneration when kind, plugin name, and this
    /// digest are unchanged since the previous update of the same name.
    pub fn parameters_digest(&self) -> ContentDigest {
        // JSON object keys are strings, so this serialization cannot fail.
        let bytes = serde_json::to_vec(&self.parameters).unwrap_or_default();
        ContentDigest::of(&bytes)
    }
}

// ── Render configuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    Perspective,
    Orthographic,
    Panoramic,
}

/// Camera state for subsequent renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    pub kind: CameraKind,
    pub position: [f32; 3],
    pub view_dir: [f32; 3],
    pub up_dir: [f32; 3],

    /// Vertical field of view in degrees (perspective cameras).
    pub fov_y: f32,

    /// View height in world units (orthographic cameras).
    pub ortho_height: f32,

    pub clip_start: f32,

    /// Depth of field. Aperture 0 disables it.
    pub dof_focus_distance: f32,
    pub dof_aperture: f32,
}

/// Output image geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub width: u32,
    pub height: u32,

    /// Normalized crop region (min x, min y, max x, max y).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<[f32; 4]>,
}

/// Renderer selection and quality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    pub renderer: String,
    pub samples: u32,
    pub ao_samples: u32,
    pub background_color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Point,
    Sun,
    Spot,
    Area,
}

/// One light. Fields that do not apply to `kind` are zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub name: String,
    pub color: [f32; 3],
    pub intensity: f32,
    pub visible: bool,

    /// Row-major wire transform placing the light.
    pub object2world: [f32; 16],

    /// Sun/point angular diameter in degrees.
    pub angular_diameter: f32,

    /// Spot opening angle in degrees.
    pub spot_angle: f32,
    pub spot_blend: f32,

    /// Area light extent.
    pub size: [f32; 2],
}

/// The complete light rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightSettings {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub lights: Vec<Light>,
}

// ── Render control ────────────────────────────────────────────────────────────

/// Starts a render of `samples` progressive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub samples: u32,
}

/// Announces one rendered sample. When `byte_len` > 0, the raw framebuffer
/// bytes follow as the next frame on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub sample: u32,
    pub byte_len: u64,

    /// Daemon resident memory in MB when the sample finished.
    pub memory_mb: f32,
    pub peak_memory_mb: f32,
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Everything the client sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    Hello { protocol_version: u32 },
    UpdateImage(ImageSettings),
    UpdateRenderSettings(RenderSettings),
    UpdateCamera(CameraSettings),
    UpdateLights(LightSettings),
    UpdateMesh(MeshUpdate),
    UpdateObject(ObjectUpdate),
    UpdatePluginInstance(PluginInstanceUpdate),
    ClearScene,
    StartRendering(RenderRequest),
    CancelRendering,
    Bye,
    Quit,
}

/// Everything the daemon sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    HelloResult { success: bool, message: String },
    GenerateResult { success: bool, message: String },
    RenderFrame(FrameInfo),
    RenderCanceled,
    RenderDone { samples: u32 },
}

impl EncodePayload for ClientMessage {
    fn encode_payload(&self) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(self).map_err(|e| FrameError::Encode(e.into()))
    }
}

impl DecodePayload for ClientMessage {
    fn decode_payload(bytes: &[u8]) -> Result<Self, FrameError> {
        serde_json::from_slice(bytes).map_err(|e| FrameError::Decode(e.into()))
    }
}

impl EncodePayload for ServerMessage {
    fn encode_payload(&self) -> Result<Vec<u8>, FrameError> {
        serde_json::to_vec(self).map_err(|e| FrameError::Encode(e.into()))
    }
}

impl DecodePayload for ServerMessage {
    fn decode_payload(bytes: &[u8]) -> Result<Self, FrameError> {
        serde_json::from_slice(bytes).map_err(|e| FrameError::Decode(e.into()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
