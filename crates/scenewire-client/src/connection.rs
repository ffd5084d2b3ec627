//! Blocking client connection to a scenewired daemon.
//!
//! One `Connection` per daemon. All calls block until the daemon has
//! accepted the framed bytes (or the transport fails); the protocol has no
//! multiplexing, so calls must not interleave from multiple threads.
//!
//! Mesh uploads are deduplicated per connection: a buffer whose digest was
//! already sent on this connection travels as a `Cached` reference and no
//! bytes follow it on the wire.

use std::net::{TcpStream, ToSocketAddrs};

use bytes::Bytes;
use glam::Mat4;

use scenewire_core::cache::{CacheError, ResourceCache};
use scenewire_core::config::LimitsConfig;
use scenewire_core::digest::ContentDigest;
use scenewire_core::frame::{receive_frame, receive_message, send_frame, send_message, FrameError};
use scenewire_core::message::{
    BlobRef, CameraSettings, ClientMessage, FrameInfo, ImageSettings, LightSettings, MeshUpdate,
    ObjectKind, ObjectUpdate, PluginInstanceUpdate, RenderRequest, RenderSettings, ServerMessage,
    PROTOCOL_VERSION,
};
use scenewire_core::transform;

/// What a mesh upload actually put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshTransfer {
    /// Buffers sent in full.
    pub inline_blobs: usize,
    /// Buffers the daemon already held, sent as digest references only.
    pub cached_blobs: usize,
    /// Blob payload bytes written, excluding the message itself.
    pub blob_bytes_sent: u64,
}

/// Per-frame verdict from the render sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderControl {
    Continue,
    Cancel,
}

/// How a render ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Done { samples: u32 },
    Canceled,
}

/// Blocking session with one daemon.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    sent: ResourceCache<()>,
    limits: LimitsConfig,
}

impl Connection {
    /// Connect and perform the `Hello` exchange.
    ///
    /// Fails with [`ClientError::Handshake`] carrying the daemon's message
    /// when the protocol versions disagree.
    pub fn connect<A: ToSocketAddrs>(addr: A, limits: LimitsConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let mut conn = Self {
            stream,
            sent: ResourceCache::new(),
            limits,
        };

        conn.send(&ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
        })?;
        match conn.receive()? {
            ServerMessage::HelloResult { success: true, .. } => Ok(conn),
            ServerMessage::HelloResult { message, .. } => {
                Err(ClientError::Handshake { message })
            }
            other => Err(ClientError::unexpected("HelloResult", &other)),
        }
    }

    fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        send_message(&mut self.stream, message)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<ServerMessage, ClientError> {
        Ok(receive_message(
            &mut self.stream,
            self.limits.max_message_bytes,
        )?)
    }

    // ── Scene updates ─────────────────────────────────────────────────────────

    pub fn update_image(&mut self, settings: ImageSettings) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdateImage(settings))
    }

    pub fn update_render_settings(&mut self, settings: RenderSettings) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdateRenderSettings(settings))
    }

    pub fn update_camera(&mut self, settings: CameraSettings) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdateCamera(settings))
    }

    pub fn update_lights(&mut self, settings: LightSettings) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdateLights(settings))
    }

    pub fn clear_scene(&mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::ClearScene)
    }

    /// Place a named data block in the world. The transform enters
    /// column-major and leaves on the wire row-major.
    pub fn update_object(
        &mut self,
        name: &str,
        kind: ObjectKind,
        object2world: &Mat4,
        data_link: &str,
        material_link: Option<String>,
        custom_properties: serde_json::Value,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdateObject(ObjectUpdate {
            name: name.to_string(),
            kind,
            object2world: transform::to_wire(object2world),
            data_link: data_link.to_string(),
            material_link,
            custom_properties,
        }))
    }

    /// Upload mesh buffers under `name`, skipping buffers this connection
    /// has already sent. Returns what actually went over the wire.
    pub fn update_mesh(
        &mut self,
        name: &str,
        buffers: &crate::mesh::MeshBuffers,
    ) -> Result<MeshTransfer, ClientError> {
        let update = MeshUpdate {
            name: name.to_string(),
            vertex_count: buffers.vertex_count,
            triangle_count: buffers.triangle_count,
            positions: self.blob_ref(&buffers.positions),
            normals: buffers.normals.as_ref().map(|b| self.blob_ref(b)),
            vertex_colors: buffers.vertex_colors.as_ref().map(|b| self.blob_ref(b)),
            triangles: self.blob_ref(&buffers.triangles),
        };

        // The message declares every blob; inline payloads follow it as
        // raw frames in declaration order.
        self.send(&ClientMessage::UpdateMesh(update.clone()))?;

        let mut transfer = MeshTransfer {
            inline_blobs: 0,
            cached_blobs: 0,
            blob_bytes_sent: 0,
        };
        for (blob_ref, bytes) in update.blob_refs().iter().zip(buffers.buffers()) {
            if blob_ref.is_inline() {
                send_frame(&mut self.stream, bytes)?;
                self.sent.insert(blob_ref.digest(), bytes.clone(), ())?;
                transfer.inline_blobs += 1;
                transfer.blob_bytes_sent += bytes.len() as u64;
            } else {
                transfer.cached_blobs += 1;
            }
        }

        tracing::debug!(
            mesh = name,
            inline = transfer.inline_blobs,
            cached = transfer.cached_blobs,
            bytes = transfer.blob_bytes_sent,
            "mesh update sent"
        );
        Ok(transfer)
    }

    fn blob_ref(&self, bytes: &Bytes) -> BlobRef {
        let digest = ContentDigest::of(bytes);
        let byte_len = bytes.len() as u64;
        if self.sent.contains(&digest) {
            BlobRef::Cached { digest, byte_len }
        } else {
            BlobRef::Inline { digest, byte_len }
        }
    }

    /// Create or update a server-side plugin instance and wait for the
    /// daemon's generation verdict.
    pub fn update_plugin_instance(
        &mut self,
        update: PluginInstanceUpdate,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdatePluginInstance(update))?;
        match self.receive()? {
            ServerMessage::GenerateResult { success: true, .. } => Ok(()),
            ServerMessage::GenerateResult { message, .. } => {
                Err(ClientError::Generate { message })
            }
            other => Err(ClientError::unexpected("GenerateResult", &other)),
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    /// Render `request.samples` progressive samples, handing each
    /// framebuffer to `sink`.
    ///
    /// A sink returning [`RenderControl::Cancel`] sends `CancelRendering`
    /// once; frames already in flight keep arriving until the daemon
    /// acknowledges with `RenderCanceled` (or finishes regardless).
    pub fn render<F>(
        &mut self,
        request: RenderRequest,
        mut sink: F,
    ) -> Result<RenderOutcome, ClientError>
    where
        F: FnMut(&FrameInfo, Bytes) -> RenderControl,
    {
        self.send(&ClientMessage::StartRendering(request))?;

        let mut cancel_sent = false;
        loop {
            match self.receive()? {
                ServerMessage::RenderFrame(info) => {
                    let framebuffer = if info.byte_len > 0 {
                        Bytes::from(receive_frame(
                            &mut self.stream,
                            self.limits.max_blob_bytes,
                        )?)
                    } else {
                        Bytes::new()
                    };
                    if sink(&info, framebuffer) == RenderControl::Cancel && !cancel_sent {
                        self.send(&ClientMessage::CancelRendering)?;
                        cancel_sent = true;
                    }
                }
                ServerMessage::RenderDone { samples } => {
                    return Ok(RenderOutcome::Done { samples });
                }
                ServerMessage::RenderCanceled => return Ok(RenderOutcome::Canceled),
                other => return Err(ClientError::unexpected("render message", &other)),
            }
        }
    }

    // ── Session end ───────────────────────────────────────────────────────────

    /// End the session; the daemon keeps serving other connections.
    pub fn bye(mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::Bye)
    }

    /// End the session and ask the daemon process to exit.
    pub fn quit(mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::Quit)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("connect failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake rejected: {message}")]
    Handshake { message: String },

    #[error("plugin instance generation failed: {message}")]
    Generate { message: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("expected {expected}, daemon sent {got}")]
    UnexpectedMessage { expected: &'static str, got: String },
}

impl ClientError {
    fn unexpected(expected: &'static str, got: &ServerMessage) -> Self {
        ClientError::UnexpectedMessage {
            expected,
            got: format!("{got:?}"),
        }
    }
}
