//! Named interceptors selectable from flags and `archaeopteryx.json`.
//!
//! Interceptors are compiled in and looked up by name in an
//! [`InterceptorRegistry`]. The built-ins are:
//!
//! | name | effect |
//! |---|---|
//! | `log` | logs method, path and header count |
//! | `trailing-slash` | `/docs/` → `/docs` (never `/` itself) |
//! | `no-query` | drops the query string |

use crate::error::ConfigError;
use archaeopteryx::interceptor::{BoxError, Interceptor, InterceptorPipeline, Interceptors};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::Uri;
use axum::http::uri::PathAndQuery;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name → interceptor lookup table.
#[derive(Default)]
pub struct InterceptorRegistry {
    entries: BTreeMap<String, Arc<dyn Interceptor>>,
}

impl InterceptorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in interceptors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("log", LogRequest);
        registry.register("trailing-slash", TrimTrailingSlash);
        registry.register("no-query", StripQuery);
        registry
    }

    /// Register `interceptor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, interceptor: impl Interceptor + 'static) {
        self.entries.insert(name.into(), Arc::new(interceptor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Interceptor>> {
        self.entries.get(name).cloned()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Build a pipeline from names, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownInterceptor`] for the first name that is
    /// not registered.
    pub fn pipeline(&self, names: &[String]) -> Result<InterceptorPipeline, ConfigError> {
        let mut pipeline = InterceptorPipeline::new();
        for name in names {
            let interceptor = self
                .get(name)
                .ok_or_else(|| ConfigError::UnknownInterceptor {
                    name: name.clone(),
                    available: self.names().collect::<Vec<_>>().join(", "),
                })?;
            pipeline.push(interceptor);
        }
        Ok(pipeline)
    }

    /// Build both pipelines.
    pub fn resolve(&self, before: &[String], after: &[String]) -> Result<Interceptors, ConfigError> {
        Ok(Interceptors::new(self.pipeline(before)?, self.pipeline(after)?))
    }
}

/// Logs each request it sees.
pub struct LogRequest;

#[async_trait]
impl Interceptor for LogRequest {
    async fn intercept(&self, request: Request) -> Result<Request, BoxError> {
        tracing::info!(
            "{} {} ({} headers)",
            request.method(),
            request.uri().path(),
            request.headers().len()
        );
        Ok(request)
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Removes trailing slashes from the path.
pub struct TrimTrailingSlash;

#[async_trait]
impl Interceptor for TrimTrailingSlash {
    async fn intercept(&self, mut request: Request) -> Result<Request, BoxError> {
        let path = request.uri().path();
        let trimmed = path.trim_end_matches('/');
        if trimmed.len() == path.len() || trimmed.is_empty() {
            return Ok(request);
        }

        let path_and_query = match request.uri().query() {
            Some(query) => format!("{}?{}", trimmed, query),
            None => trimmed.to_string(),
        };
        let uri = with_path_and_query(request.uri(), &path_and_query)?;
        *request.uri_mut() = uri;
        Ok(request)
    }

    fn name(&self) -> &str {
        "trailing-slash"
    }
}

/// Drops the query string.
pub struct StripQuery;

#[async_trait]
impl Interceptor for StripQuery {
    async fn intercept(&self, mut request: Request) -> Result<Request, BoxError> {
        if request.uri().query().is_none() {
            return Ok(request);
        }

        let path = request.uri().path().to_string();
        let uri = with_path_and_query(request.uri(), &path)?;
        *request.uri_mut() = uri;
        Ok(request)
    }

    fn name(&self) -> &str {
        "no-query"
    }
}

fn with_path_and_query(uri: &Uri, path_and_query: &str) -> Result<Uri, BoxError> {
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}
