//! scenewire framing — `[u32 length LE][payload]` on a byte stream.
//!
//! This framing IS the outer protocol layer. Every schema message and every
//! raw blob travels as exactly one frame. The functions are generic over
//! std::io::Read and Write, so the same code serves TCP sockets, Unix
//! sockets, and in-memory buffers in tests.
//!
//! The receive path allocates per call and enforces a caller-supplied size
//! limit. There is no static receive buffer and no size baked into the code:
//! a frame whose declared length exceeds the limit is a clean protocol
//! error, never a truncation or an abort.

use std::io::{Read, Write};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Bytes in the length prefix.
pub const LEN_PREFIX_BYTES: usize = 4;

/// Default limit for schema message frames.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Default limit for raw blob frames (geometry buffers, framebuffers).
pub const DEFAULT_MAX_BLOB_BYTES: usize = 256 * 1024 * 1024;

// ── Raw frames ────────────────────────────────────────────────────────────────

/// Write one frame: 4-byte little-endian length, then the payload.
///
/// Blocks until every byte is accepted by the writer. On error the stream
/// may hold a partial frame and must be considered unusable.
pub fn send_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        declared: payload.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame: exactly 4 prefix bytes, then exactly `length` payload
/// bytes.
///
/// A declared length above `max_len` fails with [`FrameError::TooLarge`]
/// before any payload byte is read. A stream that ends cleanly before the
/// first prefix byte reports [`FrameError::Disconnected`]; a stream that
/// ends anywhere inside a frame is a transport error. A short read is never
/// success.
pub fn receive_frame<R: Read>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError> {
    let mut prefix = [0u8; LEN_PREFIX_BYTES];
    read_prefix(reader, &mut prefix)?;

    let declared = u32::from_le_bytes(prefix) as usize;
    if declared > max_len {
        return Err(FrameError::TooLarge {
            declared,
            max: max_len,
        });
    }

    let mut payload = vec![0u8; declared];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Read the length prefix, distinguishing an orderly hang-up (no bytes at
/// all) from a frame truncated mid-prefix.
fn read_prefix<R: Read>(
    reader: &mut R,
    prefix: &mut [u8; LEN_PREFIX_BYTES],
) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < LEN_PREFIX_BYTES {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Err(FrameError::Disconnected),
            Ok(0) => {
                return Err(FrameError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stream ended inside a length prefix",
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FrameError::Io(e)),
        }
    }
    Ok(())
}

// ── Typed frames ──────────────────────────────────────────────────────────────

/// Capability: a type that can serialize itself into a frame payload.
///
/// The codec deliberately knows nothing about serialization formats. Schema
/// types implement this pair; the framing layer only moves opaque bytes.
pub trait EncodePayload {
    fn encode_payload(&self) -> Result<Vec<u8>, FrameError>;
}

/// Capability: a type that can parse itself from a frame payload.
pub trait DecodePayload: Sized {
    fn decode_payload(bytes: &[u8]) -> Result<Self, FrameError>;
}

/// Encode a message and send it as one frame.
pub fn send_message<W: Write, T: EncodePayload>(
    writer: &mut W,
    message: &T,
) -> Result<(), FrameError> {
    let payload = message.encode_payload()?;
    send_frame(writer, &payload)
}

/// Receive one frame and decode it as `T`.
pub fn receive_message<R: Read, T: DecodePayload>(
    reader: &mut R,
    max_len: usize,
) -> Result<T, FrameError> {
    let payload = receive_frame(reader, max_len)?;
    T::decode_payload(&payload)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors from the framing layer.
///
/// `Io` is a transport failure: the connection is gone or unusable and the
/// caller owns reconnect policy. `TooLarge`, `Encode`, and `Decode` are
/// protocol errors: the stream can no longer be trusted to sit on a frame
/// boundary and must be closed. `Disconnected` is the orderly case: the
/// peer hung up between frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer disconnected between frames")]
    Disconnected,

    #[error("frame of {declared} bytes exceeds limit of {max}")]
    TooLarge { declared: usize, max: usize },

    #[error("payload encoding failed: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("payload decoding failed: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
