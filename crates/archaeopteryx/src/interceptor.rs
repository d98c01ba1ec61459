//! Request interceptors.
//!
//! An [`Interceptor`] takes a request and hands back a (possibly rewritten)
//! request. An [`InterceptorPipeline`] runs a configured list of them strictly
//! left to right, each one's output feeding the next. An empty pipeline is
//! the identity.
//!
//! The server runs two pipelines per request:
//! - **before**: its output is what the router dispatches
//! - **after**: runs once dispatch has finished against a body-less snapshot of
//!   the request as it arrived; its output is discarded
//!
//! # Example
//!
//! ```rust
//! use archaeopteryx::interceptor::{BoxError, InterceptorPipeline};
//! use axum::extract::Request;
//!
//! let pipeline = InterceptorPipeline::new()
//!     .with(|mut request: Request| -> Result<Request, BoxError> {
//!         request.headers_mut().insert("x-seen", "1".parse()?);
//!         Ok(request)
//!     });
//! assert_eq!(pipeline.len(), 1);
//! ```

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use crate::error::BoxError;

/// Transforms a request before or after dispatch.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Transform `request`. An error abandons the request.
    async fn intercept(&self, request: Request) -> Result<Request, BoxError>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<F> Interceptor for F
where
    F: Fn(Request) -> Result<Request, BoxError> + Send + Sync,
{
    async fn intercept(&self, request: Request) -> Result<Request, BoxError> {
        self(request)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Which pipeline an interceptor ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Before,
    After,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Before => f.write_str("before"),
            Stage::After => f.write_str("after"),
        }
    }
}

/// An interceptor failed; the pipeline stopped at `index`.
#[derive(Debug, Error)]
#[error("Interceptor '{name}' ({stage} #{index}) failed: {source}")]
pub struct InterceptorError {
    pub stage: Stage,
    pub index: usize,
    pub name: String,
    #[source]
    pub source: BoxError,
}

/// Ordered list of interceptors applied sequentially.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    steps: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipeline {
    /// Empty (identity) pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor.
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.steps.push(Arc::new(interceptor));
        self
    }

    /// Append a shared interceptor.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.steps.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every interceptor in order, feeding each output into the next.
    ///
    /// # Errors
    ///
    /// Stops at the first failing interceptor; later ones do not run.
    pub async fn run(&self, stage: Stage, mut request: Request) -> Result<Request, InterceptorError> {
        for (index, step) in self.steps.iter().enumerate() {
            request = step
                .intercept(request)
                .await
                .map_err(|source| InterceptorError {
                    stage,
                    index,
                    name: step.name().to_string(),
                    source,
                })?;
        }
        Ok(request)
    }
}

impl From<Vec<Arc<dyn Interceptor>>> for InterceptorPipeline {
    fn from(steps: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { steps }
    }
}

impl From<Arc<dyn Interceptor>> for InterceptorPipeline {
    fn from(step: Arc<dyn Interceptor>) -> Self {
        Self { steps: vec![step] }
    }
}

impl fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| s.name()))
            .finish()
    }
}

/// The before and after pipelines of a server.
#[derive(Debug, Clone, Default)]
pub struct Interceptors {
    pub before: InterceptorPipeline,
    pub after: InterceptorPipeline,
}

impl Interceptors {
    pub fn new(before: InterceptorPipeline, after: InterceptorPipeline) -> Self {
        Self { before, after }
    }
}

/// Body-less copy of a request's method, URI, version and headers.
pub fn snapshot(request: &Request) -> Request {
    let mut copy = Request::new(Body::empty());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
