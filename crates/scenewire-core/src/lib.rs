//! scenewire-core — wire framing, content addressing, and the protocol schema.
//! All other scenewire crates depend on this one.

pub mod cache;
pub mod config;
pub mod digest;
pub mod expand;
pub mod frame;
pub mod message;
pub mod transform;

pub use cache::{CacheError, ResourceCache};
pub use digest::ContentDigest;
pub use frame::{DecodePayload, EncodePayload, FrameError};
pub use message::{ClientMessage, ServerMessage};
