//! Request dispatch.
//!
//! Every request takes exactly one branch:
//!
//! 1. URI path not in origin form (`OPTIONS *`, `CONNECT host:port`) → 400
//! 2. websocket upgrade (live reload enabled) → reload socket
//! 3. `GET /` → SPA entry point with the reload script appended, falling back
//!    to step 4 for `/` when the entry point cannot be read
//! 4. path resolution:
//!    - missing → 404 page
//!    - directory → listing, or 404 when listings are disabled
//!    - file → streamed with a content type from its extension
//!
//! Not-found failures anywhere in 2–4 become the 404 page. Anything else is
//! reported and the request is abandoned with an empty 500.
//!
//! A before-pipeline that turns an origin-form request into anything else is a
//! protocol violation: the response is 400 and the listener stops.

use crate::error::{DispatchError, report_error};
use crate::interceptor::{Stage, snapshot};
use crate::listing::{self, Listing};
use crate::pages::not_found_page;
use crate::reload::{append_reload_script, is_valid_host, run_socket};
use crate::resolver::{EntryKind, Resolution, decode_url_path, is_missing};
use crate::state::SharedState;
use axum::{
    Router,
    body::Body,
    extract::{FromRequestParts, Request, State, ws::WebSocketUpgrade},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::set_header::SetResponseHeaderLayer;

const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Build the axum router serving `state`.
///
/// All requests go to a single fallback handler wrapped in the interceptor
/// middleware. CORS adds `Access-Control-Allow-Origin: *` to every response.
pub fn build_router(state: SharedState) -> Router {
    let cors = state.config.cors;

    let router = Router::new()
        .fallback(handle_request)
        .layer(middleware::from_fn_with_state(state.clone(), run_interceptors))
        .with_state(state);

    if cors {
        router.layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
    } else {
        router
    }
}

/// Before pipeline → dispatch → after pipeline (spawned, result discarded).
async fn run_interceptors(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let original = (!state.interceptors.after.is_empty()).then(|| snapshot(&request));
    let arrived_in_origin_form = is_origin_form(request.uri());

    let request = match state.interceptors.before.run(Stage::Before, request).await {
        Ok(request) => request,
        Err(err) => {
            report_error(&state.config, &err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if arrived_in_origin_form && !is_origin_form(request.uri()) {
        return protocol_violation(
            &state,
            format!(
                "before interceptors produced request target {:?}",
                request.uri().to_string()
            ),
        );
    }

    let response = next.run(request).await;

    if let Some(original) = original {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = state.interceptors.after.run(Stage::After, original).await {
                report_error(&state.config, &err);
            }
        });
    }

    response
}

async fn handle_request(State(state): State<SharedState>, request: Request) -> Response {
    dispatch(&state, request).await
}

/// Dispatch one request and turn every outcome into a response.
pub async fn dispatch(state: &SharedState, request: Request) -> Response {
    let path = decode_url_path(request.uri().path());

    match route(state, request).await {
        Ok(response) => response,
        Err(err) if err.is_not_found() => {
            if !matches!(err, DispatchError::NotFound(_)) {
                report_error(&state.config, &err);
            }
            not_found(&path)
        }
        Err(err @ DispatchError::BadTarget(_)) => {
            report_error(&state.config, &err);
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(err) => {
            report_error(&state.config, &err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn route(state: &SharedState, request: Request) -> Result<Response, DispatchError> {
    if !is_origin_form(request.uri()) {
        return Err(DispatchError::BadTarget(request.uri().to_string()));
    }

    if !state.config.silent {
        tracing::info!("{} {}", request.method(), request.uri());
    }

    if state.config.live_reload() && is_websocket(&request) {
        return upgrade(state, request).await;
    }

    if request.method() == Method::GET && request.uri().path() == "/" {
        let host = reload_host(state, &request);
        return serve_entry_point(state, host).await;
    }

    serve_path(state, request.uri().path()).await
}

/// Whether the request target has an absolute path (`/...`).
pub fn is_origin_form(uri: &Uri) -> bool {
    uri.path().starts_with('/')
}

/// Answer 400 and stop the listener.
fn protocol_violation(state: &SharedState, reason: String) -> Response {
    if !state.config.silent {
        tracing::error!("Protocol violation, shutting down: {}", reason);
    }
    state.trigger_fatal(reason);
    StatusCode::BAD_REQUEST.into_response()
}

/// Whether the request asks for a websocket upgrade.
pub fn is_websocket(request: &Request) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

async fn upgrade(state: &SharedState, request: Request) -> Result<Response, DispatchError> {
    let (mut parts, _body) = request.into_parts();
    let ws = WebSocketUpgrade::from_request_parts(&mut parts, state)
        .await
        .map_err(|rejection| DispatchError::Upgrade(rejection.body_text()))?;

    let events = state.broadcaster.connect()?;
    let state = Arc::clone(state);

    Ok(ws.on_upgrade(move |socket| async move {
        run_socket(socket, events, &state.config).await;
    }))
}

/// `host` is where the injected reload script connects back to.
async fn serve_entry_point(state: &SharedState, host: String) -> Result<Response, DispatchError> {
    let entry = state.config.entry_path();

    match tokio::fs::read(&entry).await {
        Ok(bytes) => {
            let body = if state.config.live_reload() {
                Body::from(append_reload_script(bytes, &host, state.config.secure))
            } else {
                Body::from(bytes)
            };
            Ok(html(body))
        }
        Err(err) => {
            if is_missing(&err) {
                tracing::debug!("No entry point at {}, serving /", entry.display());
            } else {
                report_error(&state.config, &DispatchError::io("/", err));
            }
            serve_path(state, "/").await
        }
    }
}

/// Host the reload script connects back to: the request's `Host` header when
/// it is well formed, `localhost:<port>` otherwise.
fn reload_host(state: &SharedState, request: &Request) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| is_valid_host(host))
        .map(str::to_string)
        .unwrap_or_else(|| format!("localhost:{}", state.config.port))
}

async fn serve_path(state: &SharedState, url_path: &str) -> Result<Response, DispatchError> {
    let resolution = state
        .resolver
        .resolve(url_path)
        .await
        .map_err(|e| DispatchError::io(url_path, e))?;

    match resolution {
        Resolution::NotFound => Err(DispatchError::NotFound(decode_url_path(url_path))),
        Resolution::Found {
            path,
            kind: EntryKind::Directory,
        } => {
            if state.config.listings_enabled() {
                serve_directory(url_path, &path).await
            } else {
                // Hidden so SPA-style routing stays consistent
                Err(DispatchError::NotFound(decode_url_path(url_path)))
            }
        }
        Resolution::Found {
            path,
            kind: EntryKind::File,
        } => serve_file(url_path, &path).await,
    }
}

async fn serve_directory(url_path: &str, dir: &Path) -> Result<Response, DispatchError> {
    let dir_url = listing::dir_url(&decode_url_path(url_path));
    let entries = listing::read_entries(dir, &dir_url)
        .await
        .map_err(|e| DispatchError::io(url_path, e))?;

    Ok(html(Body::from(Listing::new(entries).render(&dir_url))))
}

async fn serve_file(url_path: &str, path: &Path) -> Result<Response, DispatchError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DispatchError::io(url_path, e))?;
    let content_type = mime_guess::from_path(path).first_or_octet_stream();

    // The file handle lives in the body stream and is closed when the
    // response finishes or the connection drops.
    let body = Body::from_stream(ReaderStream::new(file));
    Ok(([(header::CONTENT_TYPE, content_type.to_string())], body).into_response())
}

fn html(body: Body) -> Response {
    ([(header::CONTENT_TYPE, TEXT_HTML)], body).into_response()
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, TEXT_HTML)],
        not_found_page(path),
    )
        .into_response()
}
