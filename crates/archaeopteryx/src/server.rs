//! Listener lifecycle.
//!
//! [`Server::bind`] validates the configuration, loads TLS credentials when
//! `secure` is set and binds the listener. [`Server::run`] then accepts
//! connections until a protocol violation is raised by the router, or until
//! the caller drops the future (e.g. on Ctrl+C).

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::interceptor::Interceptors;
use crate::router::build_router;
use crate::state::{FatalReceiver, ServerState, SharedState};
use crate::tls;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A bound static file server.
pub struct Server {
    /// Shared application state
    state: SharedState,
    /// Bound listener
    listener: TcpListener,
    /// Present when serving HTTPS
    tls: Option<TlsAcceptor>,
    /// Fatal signal raised by the router
    fatal: FatalReceiver,
}

impl Server {
    /// Validate `config` and bind its address.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, the TLS credentials
    /// cannot be loaded, or the address cannot be bound.
    pub async fn bind(config: ServerConfig, interceptors: Interceptors) -> Result<Self> {
        config.validate()?;

        let tls = if config.secure {
            Some(tls::load_acceptor(&config.cert_path(), &config.key_path())?)
        } else {
            None
        };

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (state, fatal) = ServerState::new(config, interceptors);

        Ok(Self {
            state: Arc::new(state),
            listener,
            tls,
            fatal,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// The router this server dispatches through.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ProtocolViolation`] when the before interceptors
    /// hand the router a request without a path target. Requests that arrive
    /// that way from clients only get a 400. In-flight connections are not
    /// drained.
    pub async fn run(self) -> Result<()> {
        let app = self.router();
        let Server {
            listener,
            tls,
            mut fatal,
            ..
        } = self;

        let serve = async move {
            match tls {
                None => axum::serve(listener, app).await.map_err(ServerError::Io),
                Some(acceptor) => serve_tls(listener, acceptor, app).await,
            }
        };

        tokio::select! {
            result = serve => result,
            reason = fatal.wait() => Err(ServerError::ProtocolViolation(reason)),
        }
    }
}

async fn serve_tls(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let app = app.clone();

        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!("TLS handshake with {} failed: {}", peer, e);
                    return;
                }
            };

            let service = TowerToHyperService::new(app);
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!("Connection with {} ended: {}", peer, e);
            }
        });
    }
}
