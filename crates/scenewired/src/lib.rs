//! scenewired — the scene streaming render daemon.
//!
//! Accepts client connections, maintains per-connection scene state and a
//! shared content store, materializes resources through the engine
//! boundary, and streams render results back. Exposed as a library so the
//! integration tests can run a daemon in-process on an ephemeral port.

pub mod daemon;
pub mod engine;
pub mod memory;
pub mod scene;
pub mod session;
pub mod store;

pub use daemon::Daemon;
pub use engine::{EngineError, NullEngine, RenderEngine};
pub use store::ContentStore;
