//! Client-side mesh buffers.
//!
//! The host application hands over raw vertex/index data; this module
//! packages it as the owned byte buffers the connection hashes, declares,
//! and ships. Buffers are `bytes::Bytes` so the dedup cache can retain
//! them without copying.

use bytes::Bytes;

/// Raw buffers for one named triangle mesh.
///
/// Layouts match the wire contract: positions and normals are
/// `vertex_count × 3` f32, vertex colors `vertex_count × 4` f32,
/// triangles `triangle_count × 3` u32, all little-endian.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    pub vertex_count: u32,
    pub triangle_count: u32,
    pub positions: Bytes,
    pub normals: Option<Bytes>,
    pub vertex_colors: Option<Bytes>,
    pub triangles: Bytes,
}

impl MeshBuffers {
    /// Package position and index slices. Panics in debug builds if the
    /// slice lengths disagree with their counts.
    pub fn new(positions: &[f32], triangles: &[u32]) -> Self {
        debug_assert_eq!(positions.len() % 3, 0);
        debug_assert_eq!(triangles.len() % 3, 0);
        Self {
            vertex_count: (positions.len() / 3) as u32,
            triangle_count: (triangles.len() / 3) as u32,
            positions: f32_bytes(positions),
            normals: None,
            vertex_colors: None,
            triangles: u32_bytes(triangles),
        }
    }

    /// Attach per-vertex normals (`vertex_count × 3` f32).
    pub fn with_normals(mut self, normals: &[f32]) -> Self {
        debug_assert_eq!(normals.len(), self.vertex_count as usize * 3);
        self.normals = Some(f32_bytes(normals));
        self
    }

    /// Attach per-vertex colors (`vertex_count × 4` f32 RGBA).
    pub fn with_vertex_colors(mut self, colors: &[f32]) -> Self {
        debug_assert_eq!(colors.len(), self.vertex_count as usize * 4);
        self.vertex_colors = Some(f32_bytes(colors));
        self
    }

    /// Buffers in wire declaration order, parallel to
    /// `MeshUpdate::blob_refs`.
    pub fn buffers(&self) -> Vec<&Bytes> {
        let mut buffers = vec![&self.positions];
        if let Some(normals) = &self.normals {
            buffers.push(normals);
        }
        if let Some(colors) = &self.vertex_colors {
            buffers.push(colors);
        }
        buffers.push(&self.triangles);
        buffers
    }
}

fn f32_bytes(values: &[f32]) -> Bytes {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Bytes::from(out)
}

fn u32_bytes(values: &[u32]) -> Bytes {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Bytes::from(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
