//! # archaeopteryx
//!
//! A static file server for front-end development.
//!
//! - `GET /` serves the SPA entry point (`index.html` by default) with a small
//!   live-reload script appended
//! - other paths resolve against the served root: files are streamed,
//!   directories get an HTML listing, anything else gets a 404 page
//! - a websocket upgrade on any path subscribes to file changes under the root
//!   and receives `reload` on every change
//! - optional before/after [`interceptor`] pipelines see every request
//!
//! ```no_run
//! use archaeopteryx::{Interceptors, Server, ServerConfig};
//!
//! # async fn example() -> archaeopteryx::Result<()> {
//! let config = ServerConfig::new("dist");
//! let server = Server::bind(config, Interceptors::default()).await?;
//! println!("listening on {}", server.local_addr()?);
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod interceptor;
pub mod listing;
pub mod pages;
pub mod reload;
pub mod resolver;
pub mod router;
pub mod server;
pub mod state;
pub mod tls;

pub use config::{CONFIG_FILE_NAME, ServerConfig};
pub use error::{BoxError, ConfigError, DispatchError, Result, ServerError, report_error};
pub use interceptor::{Interceptor, InterceptorPipeline, Interceptors, Stage};
pub use reload::{RELOAD_MESSAGE, ReloadBroadcaster};
pub use resolver::{PathResolver, Resolution};
pub use router::build_router;
pub use server::Server;
pub use state::{ServerState, SharedState};
