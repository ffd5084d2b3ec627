//! scenewire-client — blocking client session for the scenewire protocol.
//!
//! Embedded in the content-creation application. Owns one TCP connection
//! to a scenewired daemon, performs the version handshake, streams
//! incremental scene updates with digest-based blob deduplication, and
//! consumes render results.

pub mod connection;
pub mod mesh;

pub use connection::{ClientError, Connection, MeshTransfer, RenderControl, RenderOutcome};
pub use mesh::MeshBuffers;
