//! One client connection, served start to finish.
//!
//! A session is the handshake, then a blocking receive loop dispatching
//! client messages until the peer says goodbye, hangs up, or breaks the
//! protocol. Any protocol or data-integrity error ends the session; there
//! is no mid-stream resynchronization.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use bytes::Bytes;

use scenewire_core::cache::CacheError;
use scenewire_core::config::LimitsConfig;
use scenewire_core::digest::ContentDigest;
use scenewire_core::expand::expand_env;
use scenewire_core::frame::{receive_frame, receive_message, send_frame, send_message, FrameError};
use scenewire_core::message::{
    BlobRef, ClientMessage, FrameInfo, MeshUpdate, ObjectUpdate, PluginInstanceUpdate,
    RenderRequest, ServerMessage, PROTOCOL_VERSION,
};
use scenewire_core::transform;

use crate::engine::{EngineError, RenderEngine, ResolvedMesh};
use crate::memory;
use crate::scene::{PluginInstanceState, SceneState};
use crate::store::ContentStore;

/// How a session ended, as far as the daemon cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent `Bye`.
    Bye,
    /// Client sent `Quit`: the whole daemon should exit.
    Quit,
    /// Peer hung up between frames without a goodbye.
    Disconnected,
}

pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    limits: LimitsConfig,
    store: Arc<ContentStore>,
    engine: Box<dyn RenderEngine>,
    state: SceneState,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        limits: LimitsConfig,
        store: Arc<ContentStore>,
        engine: Box<dyn RenderEngine>,
    ) -> Self {
        Self {
            stream,
            peer,
            limits,
            store,
            engine,
            state: SceneState::new(),
        }
    }

    /// Serve the connection until it ends.
    pub fn serve(mut self) -> Result<SessionEnd, SessionError> {
        self.handshake()?;
        tracing::info!(peer = %self.peer, "session established");

        loop {
            match receive_message::<_, ClientMessage>(
                &mut self.stream,
                self.limits.max_message_bytes,
            ) {
                Ok(message) => {
                    if let Some(end) = self.handle(message)? {
                        return Ok(end);
                    }
                }
                Err(FrameError::Disconnected) => return Ok(SessionEnd::Disconnected),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn handshake(&mut self) -> Result<(), SessionError> {
        let first = receive_message::<_, ClientMessage>(
            &mut self.stream,
            self.limits.max_message_bytes,
        )?;
        let ClientMessage::Hello { protocol_version } = first else {
            return Err(SessionError::Protocol(
                "first message was not Hello".to_string(),
            ));
        };

        if protocol_version != PROTOCOL_VERSION {
            let message = format!(
                "protocol version mismatch: client speaks {protocol_version}, \
                 daemon speaks {PROTOCOL_VERSION}"
            );
            send_message(
                &mut self.stream,
                &ServerMessage::HelloResult {
                    success: false,
                    message: message.clone(),
                },
            )?;
            return Err(SessionError::Protocol(message));
        }

        send_message(
            &mut self.stream,
            &ServerMessage::HelloResult {
                success: true,
                message: format!("scenewired protocol {PROTOCOL_VERSION}"),
            },
        )?;
        Ok(())
    }

    fn handle(&mut self, message: ClientMessage) -> Result<Option<SessionEnd>, SessionError> {
        match message {
            ClientMessage::Hello { .. } => Err(SessionError::Protocol(
                "unexpected second Hello".to_string(),
            )),
            ClientMessage::UpdateImage(settings) => {
                self.engine.apply_image(&settings)?;
                Ok(None)
            }
            ClientMessage::UpdateRenderSettings(settings) => {
                self.engine.apply_render_settings(&settings)?;
                Ok(None)
            }
            ClientMessage::UpdateCamera(settings) => {
                self.engine.apply_camera(&settings)?;
                Ok(None)
            }
            ClientMessage::UpdateLights(settings) => {
                self.engine.apply_lights(&settings)?;
                Ok(None)
            }
            ClientMessage::UpdateMesh(update) => {
                self.handle_mesh(update)?;
                Ok(None)
            }
            ClientMessage::UpdateObject(update) => {
                self.handle_object(update)?;
                Ok(None)
            }
            ClientMessage::UpdatePluginInstance(update) => {
                self.handle_plugin_instance(update)?;
                Ok(None)
            }
            ClientMessage::ClearScene => {
                self.state.clear();
                self.engine.clear_scene();
                Ok(None)
            }
            ClientMessage::StartRendering(request) => {
                self.run_render(request)?;
                Ok(None)
            }
            ClientMessage::CancelRendering => {
                // Lost the race against RenderDone; nothing to cancel.
                tracing::debug!(peer = %self.peer, "cancel received outside a render, ignoring");
                Ok(None)
            }
            ClientMessage::Bye => Ok(Some(SessionEnd::Bye)),
            ClientMessage::Quit => Ok(Some(SessionEnd::Quit)),
        }
    }

    // ── Meshes ────────────────────────────────────────────────────────────────

    fn handle_mesh(&mut self, update: MeshUpdate) -> Result<(), SessionError> {
        // Inline payloads arrive as raw frames in declaration order.
        let positions = self.resolve_blob(&update.positions)?;
        let normals = match &update.normals {
            Some(blob_ref) => Some(self.resolve_blob(blob_ref)?),
            None => None,
        };
        let vertex_colors = match &update.vertex_colors {
            Some(blob_ref) => Some(self.resolve_blob(blob_ref)?),
            None => None,
        };
        let triangles = self.resolve_blob(&update.triangles)?;

        let mesh = ResolvedMesh {
            name: update.name.clone(),
            vertex_count: update.vertex_count,
            triangle_count: update.triangle_count,
            positions,
            normals,
            vertex_colors,
            triangles,
        };
        self.engine.load_mesh(&mesh)?;
        self.state.meshes.insert(update.name.clone(), update);
        Ok(())
    }

    /// Produce the bytes a blob reference stands for.
    ///
    /// `Inline` reads the next frame, verifies its digest against the
    /// declaration, and records it in the connection cache and the shared
    /// store. `Cached` resolves locally; a digest this connection never
    /// received and the store never saw is a protocol error.
    fn resolve_blob(&mut self, blob_ref: &BlobRef) -> Result<Bytes, SessionError> {
        match *blob_ref {
            BlobRef::Inline { digest, byte_len } => {
                let bytes = Bytes::from(receive_frame(
                    &mut self.stream,
                    self.limits.max_blob_bytes,
                )?);
                if bytes.len() as u64 != byte_len {
                    return Err(SessionError::BlobLengthMismatch {
                        declared: byte_len,
                        received: bytes.len() as u64,
                    });
                }
                let actual = ContentDigest::of(&bytes);
                if actual != digest {
                    tracing::warn!(
                        peer = %self.peer,
                        declared = %digest,
                        actual = %actual,
                        "inline blob failed digest verification"
                    );
                    return Err(SessionError::DigestMismatch {
                        declared: digest,
                        actual,
                    });
                }
                self.state.cache.insert(digest, bytes.clone(), ())?;
                self.store.insert(digest, bytes.clone())?;
                Ok(bytes)
            }
            BlobRef::Cached { digest, .. } => self
                .state
                .cache
                .content(&digest)
                .cloned()
                .or_else(|| self.store.get(&digest))
                .ok_or(SessionError::UnknownDigest(digest)),
        }
    }

    // ── Objects ───────────────────────────────────────────────────────────────

    fn handle_object(&mut self, update: ObjectUpdate) -> Result<(), SessionError> {
        let object2world = transform::from_wire(&update.object2world);
        self.engine.place_object(
            &update.name,
            update.kind,
            &transform::to_affine(&object2world),
            &update.data_link,
            update.material_link.as_deref(),
        )?;
        self.state.objects.insert(update.name.clone(), update);
        Ok(())
    }

    // ── Plugin instances ──────────────────────────────────────────────────────

    fn handle_plugin_instance(
        &mut self,
        update: PluginInstanceUpdate,
    ) -> Result<(), SessionError> {
        let incoming = PluginInstanceState {
            kind: update.kind,
            plugin_name: update.plugin_name.clone(),
            // Digest of the raw parameters: environment expansion happens
            // after the comparison so the skip check is env-independent.
            parameters_digest: update.parameters_digest(),
        };

        if self.state.plugin_instances.get(&update.name) == Some(&incoming) {
            tracing::debug!(
                instance = %update.name,
                "plugin instance unchanged, skipping regeneration"
            );
            return self.send_generate_result(true, "unchanged".to_string());
        }

        let mut parameters = update.parameters.clone();
        expand_parameter_strings(&mut parameters);

        match self.engine.generate_plugin_instance(
            update.kind,
            &update.name,
            &update.plugin_name,
            &parameters,
        ) {
            Ok(()) => {
                self.state.plugin_instances.insert(update.name, incoming);
                self.send_generate_result(true, String::new())
            }
            Err(EngineError(message)) => {
                tracing::warn!(
                    instance = %update.name,
                    plugin = %update.plugin_name,
                    error = %message,
                    "plugin instance generation failed"
                );
                self.send_generate_result(false, message)
            }
        }
    }

    fn send_generate_result(&mut self, success: bool, message: String) -> Result<(), SessionError> {
        send_message(
            &mut self.stream,
            &ServerMessage::GenerateResult { success, message },
        )?;
        Ok(())
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn run_render(&mut self, request: RenderRequest) -> Result<(), SessionError> {
        tracing::info!(peer = %self.peer, samples = request.samples, "render starting");
        self.engine.begin_render(request.samples)?;

        for sample in 1..=request.samples {
            if self.poll_cancel()? {
                tracing::info!(peer = %self.peer, sample, "render canceled by client");
                send_message(&mut self.stream, &ServerMessage::RenderCanceled)?;
                return Ok(());
            }

            let framebuffer = self.engine.render_sample(sample)?;
            let info = FrameInfo {
                sample,
                byte_len: framebuffer.len() as u64,
                memory_mb: memory::resident_mb(),
                peak_memory_mb: memory::peak_resident_mb(),
            };
            send_message(&mut self.stream, &ServerMessage::RenderFrame(info))?;
            if !framebuffer.is_empty() {
                send_frame(&mut self.stream, &framebuffer)?;
            }
        }

        send_message(
            &mut self.stream,
            &ServerMessage::RenderDone {
                samples: request.samples,
            },
        )?;
        Ok(())
    }

    /// Between samples, check whether a complete `CancelRendering` is
    /// waiting, without ever blocking and without consuming a partial
    /// frame.
    fn poll_cancel(&mut self) -> Result<bool, SessionError> {
        let mut probe = [0u8; 4096];
        self.stream.set_nonblocking(true)?;
        let peeked = match self.stream.peek(&mut probe) {
            Ok(n) => {
                self.stream.set_nonblocking(false)?;
                n
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                self.stream.set_nonblocking(false)?;
                return Ok(false);
            }
            Err(e) => {
                let _ = self.stream.set_nonblocking(false);
                return Err(SessionError::from(e));
            }
        };

        if peeked < 4 {
            return Ok(false);
        }
        let declared = u32::from_le_bytes([probe[0], probe[1], probe[2], probe[3]]) as usize;
        if 4 + declared > peeked && 4 + declared <= probe.len() {
            // Frame still in flight; pick it up on a later poll.
            return Ok(false);
        }

        match receive_message::<_, ClientMessage>(
            &mut self.stream,
            self.limits.max_message_bytes,
        )? {
            ClientMessage::CancelRendering => Ok(true),
            other => {
                tracing::warn!(
                    peer = %self.peer,
                    message = ?other,
                    "unexpected message during render, ignoring"
                );
                Ok(false)
            }
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("inline blob declared digest {declared}, bytes hash to {actual}")]
    DigestMismatch {
        declared: ContentDigest,
        actual: ContentDigest,
    },

    #[error("inline blob declared {declared} bytes, frame carried {received}")]
    BlobLengthMismatch { declared: u64, received: u64 },

    #[error("cached reference to unknown digest {0}")]
    UnknownDigest(ContentDigest),
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Frame(FrameError::Io(e))
    }
}

/// Expand `$<NAME>` markers in every string value of a parameter tree.
fn expand_parameter_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = expand_env(s),
        serde_json::Value::Array(items) => {
            for item in items {
                expand_parameter_strings(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                expand_parameter_strings(item);
            }
        }
        _ => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
