//! Listener and per-connection threads.
//!
//! Blocking I/O throughout: the accept loop runs on the calling thread
//! and every connection gets a thread of its own. A connection failure
//! tears down only that connection's state; `Quit` from any client stops
//! the whole daemon.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use scenewire_core::config::ScenewireConfig;

use crate::engine::{NullEngine, RenderEngine};
use crate::session::{Session, SessionEnd};
use crate::store::ContentStore;

/// Builds one engine per connection.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn RenderEngine> + Send + Sync>;

pub struct Daemon {
    listener: TcpListener,
    config: ScenewireConfig,
    store: Arc<ContentStore>,
    engine_factory: EngineFactory,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    /// Bind the configured address with the built-in [`NullEngine`].
    pub fn bind(config: &ScenewireConfig) -> Result<Self> {
        Self::bind_with_engine(
            config,
            Arc::new(|| Box::new(NullEngine::new()) as Box<dyn RenderEngine>),
        )
    }

    /// Bind with a custom engine behind the boundary trait.
    pub fn bind_with_engine(config: &ScenewireConfig, engine_factory: EngineFactory) -> Result<Self> {
        let addr = format!("{}:{}", config.network.listen_addr, config.network.port);
        let listener = TcpListener::bind(&addr).with_context(|| format!("failed to bind {addr}"))?;
        Ok(Self {
            listener,
            config: config.clone(),
            store: Arc::new(ContentStore::new()),
            engine_factory,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The bound address; useful when the configured port was 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until a client sends `Quit`.
    pub fn run(self) -> Result<()> {
        let local_addr = self.local_addr()?;
        tracing::info!(addr = %local_addr, "scenewired listening");

        for incoming in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let stream = match incoming {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let limits = self.config.limits.clone();
            let store = self.store.clone();
            let engine = (self.engine_factory)();
            let shutdown = self.shutdown.clone();
            std::thread::spawn(move || {
                serve_connection(stream, limits, store, engine, shutdown, local_addr);
            });
        }

        tracing::info!("scenewired shutting down");
        Ok(())
    }
}

fn serve_connection(
    stream: TcpStream,
    limits: scenewire_core::config::LimitsConfig,
    store: Arc<ContentStore>,
    engine: Box<dyn RenderEngine>,
    shutdown: Arc<AtomicBool>,
    local_addr: SocketAddr,
) {
    let peer = match stream.peer_addr() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "peer address unavailable, dropping connection");
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(peer = %peer, error = %e, "set_nodelay failed");
    }

    let session = Session::new(stream, peer, limits, store, engine);
    match session.serve() {
        Ok(SessionEnd::Bye) => tracing::info!(peer = %peer, "session ended"),
        Ok(SessionEnd::Disconnected) => {
            tracing::info!(peer = %peer, "peer disconnected")
        }
        Ok(SessionEnd::Quit) => {
            tracing::info!(peer = %peer, "quit requested");
            shutdown.store(true, Ordering::SeqCst);
            // The acceptor blocks in accept(); poke it awake so it sees
            // the flag and exits.
            let _ = TcpStream::connect(local_addr);
        }
        Err(e) => tracing::warn!(peer = %peer, error = %e, "session failed"),
    }
}
