//! Shared server state.
//!
//! One [`ServerState`] lives for the whole server and is shared by every
//! request handler and live-reload socket. Configuration is read-only after
//! construction; the only interior mutability is the lazily started watcher
//! inside [`ReloadBroadcaster`].

use crate::config::ServerConfig;
use crate::interceptor::Interceptors;
use crate::reload::ReloadBroadcaster;
use crate::resolver::PathResolver;
use std::sync::Arc;
use tokio::sync::mpsc;

/// State shared by all request handlers.
#[derive(Debug)]
pub struct ServerState {
    /// Resolved configuration
    pub config: ServerConfig,

    /// Request path resolution against `config.root`
    pub resolver: PathResolver,

    /// Live-reload watcher and fan-out
    pub broadcaster: ReloadBroadcaster,

    /// Before/after request pipelines
    pub interceptors: Interceptors,

    /// Raised when the request pipeline hands over something unusable
    fatal: mpsc::UnboundedSender<String>,
}

impl ServerState {
    /// Create state for `config`, returning the receiving half of the fatal
    /// signal alongside it.
    pub fn new(config: ServerConfig, interceptors: Interceptors) -> (Self, FatalReceiver) {
        let (fatal, rx) = mpsc::unbounded_channel();
        let state = Self {
            resolver: PathResolver::from_config(&config),
            broadcaster: ReloadBroadcaster::new(config.root.clone()),
            config,
            interceptors,
            fatal,
        };
        (state, FatalReceiver(rx))
    }

    /// Ask the listener to stop immediately.
    pub fn trigger_fatal(&self, reason: impl Into<String>) {
        // Nobody listening means the server is already gone.
        let _ = self.fatal.send(reason.into());
    }
}

/// Shared state handle for passing around the application.
pub type SharedState = Arc<ServerState>;

/// Receiving half of the fatal signal, held by [`crate::Server`].
#[derive(Debug)]
pub struct FatalReceiver(mpsc::UnboundedReceiver<String>);

impl FatalReceiver {
    /// Wait for the first fatal reason. Never resolves if the state is gone.
    pub async fn wait(&mut self) -> String {
        match self.0.recv().await {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}
