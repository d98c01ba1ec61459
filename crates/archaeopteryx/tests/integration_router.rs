//! Integration tests for request dispatch.
//!
//! Requests are driven through the router with `oneshot`, no listener needed.

use archaeopteryx::interceptor::{BoxError, Interceptor};
use archaeopteryx::{InterceptorPipeline, Interceptors, ServerConfig, ServerState, build_router};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode, header};
use http_body_util::BodyExt;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::{Duration, sleep};
use tower::ServiceExt;

fn app(config: ServerConfig) -> Router {
    app_with(config, Interceptors::default())
}

fn app_with(config: ServerConfig, interceptors: Interceptors) -> Router {
    let (state, _fatal) = ServerState::new(config, interceptors);
    build_router(Arc::new(state))
}

async fn send(app: Router, request: Request) -> (StatusCode, HeaderMap, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

async fn get(app: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn site() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(root.join("style.css"), "body {}").unwrap();
    fs::write(root.join("with space.txt"), "spaced").unwrap();
    fs::create_dir(root.join("docs")).unwrap();
    fs::write(root.join("docs/a.txt"), "a").unwrap();
    fs::write(root.join("docs/b.css"), "b").unwrap();
    fs::write(root.join("docs/.b.txt"), "hidden").unwrap();
    fs::create_dir(root.join("docs/img")).unwrap();
    temp
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_root_serves_entry_point_with_reload_script() {
    let temp = site();
    let request = Request::get("/")
        .header(header::HOST, "dev.local:8080")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(app(ServerConfig::new(temp.path())), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type(&headers).starts_with("text/html"));
    assert!(body.starts_with("<h1>home</h1>"));
    assert!(body.contains("<script>"));
    assert!(body.contains("ws://dev.local:8080"));
}

#[tokio::test]
async fn test_root_without_reload_is_untouched() {
    let temp = site();
    let config = ServerConfig {
        disable_reload: true,
        ..ServerConfig::new(temp.path())
    };

    let (status, _, body) = get(app(config), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>home</h1>");
}

#[tokio::test]
async fn test_secure_reload_script_uses_wss() {
    let temp = site();
    let config = ServerConfig {
        secure: true,
        ..ServerConfig::new(temp.path())
    };

    let (_, _, body) = get(app(config), "/").await;
    assert!(body.contains("wss://localhost:8080"));
}

#[tokio::test]
async fn test_custom_entry_point() {
    let temp = site();
    fs::write(temp.path().join("app.html"), "<main>app</main>").unwrap();
    let config = ServerConfig {
        entry_point: "app.html".to_string(),
        disable_reload: true,
        ..ServerConfig::new(temp.path())
    };

    let (_, _, body) = get(app(config), "/").await;
    assert_eq!(body, "<main>app</main>");
}

#[tokio::test]
async fn test_missing_entry_point_falls_back_to_listing() {
    let temp = site();
    fs::remove_file(temp.path().join("index.html")).unwrap();

    let (status, _, body) = get(app(ServerConfig::new(temp.path())), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("archaeopteryx - /"));
    assert!(body.contains(r#"href="/docs""#));
    assert!(!body.contains("<script>"));
}

#[tokio::test]
async fn test_missing_entry_point_without_listings_is_404() {
    let temp = site();
    fs::remove_file(temp.path().join("index.html")).unwrap();
    let config = ServerConfig {
        dont_list: true,
        ..ServerConfig::new(temp.path())
    };

    let (status, _, _) = get(app(config), "/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_get_root_lists_directory() {
    let temp = site();
    let request = Request::post("/").body(Body::empty()).unwrap();

    let (status, _, body) = send(app(ServerConfig::new(temp.path())), request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("archaeopteryx - /"));
    assert!(!body.contains("<h1>home</h1>"));
}

#[tokio::test]
async fn test_file_served_with_content_type() {
    let temp = site();

    let (status, headers, body) = get(app(ServerConfig::new(temp.path())), "/style.css").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "text/css");
    assert_eq!(body, "body {}");
}

#[tokio::test]
async fn test_percent_encoded_path() {
    let temp = site();

    let (status, _, body) =
        get(app(ServerConfig::new(temp.path())), "/with%20space.txt").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "spaced");
}

#[tokio::test]
async fn test_query_string_is_ignored() {
    let temp = site();

    let (status, _, body) = get(app(ServerConfig::new(temp.path())), "/style.css?v=3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "body {}");
}

#[tokio::test]
async fn test_missing_path_is_404_page() {
    let temp = site();

    let (status, headers, body) =
        get(app(ServerConfig::new(temp.path())), "/missing.png").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(content_type(&headers).starts_with("text/html"));
    assert!(body.contains("/missing.png"));
}

#[tokio::test]
async fn test_file_used_as_directory_is_404() {
    let temp = site();

    let (status, _, _) = get(app(ServerConfig::new(temp.path())), "/style.css/nested").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_directory_listing_order_and_links() {
    let temp = site();

    let (status, _, body) = get(app(ServerConfig::new(temp.path())), "/docs").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("archaeopteryx - /docs"));
    assert!(body.contains(r#"href="/docs/img""#));
    assert!(body.contains("img/"));

    let hidden = body.find(r#"href="/docs/.b.txt""#).unwrap();
    let css = body.find(r#"href="/docs/b.css""#).unwrap();
    let txt = body.find(r#"href="/docs/a.txt""#).unwrap();
    assert!(hidden < css && css < txt);
}

#[tokio::test]
async fn test_trailing_slash_lists_same_directory() {
    let temp = site();

    let (status, _, body) = get(app(ServerConfig::new(temp.path())), "/docs/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"href="/docs/a.txt""#));
}

#[tokio::test]
async fn test_dont_list_hides_directories() {
    let temp = site();
    let config = ServerConfig {
        dont_list: true,
        ..ServerConfig::new(temp.path())
    };

    let (status, _, body) = get(app(config.clone()), "/docs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("/docs"));

    // Files inside are still served
    let (status, _, _) = get(app(config), "/docs/a.txt").await;
    assert_eq!(status, StatusCode::OK);
}

#[cfg(unix)]
fn absolute_target() -> (TempDir, String) {
    let outside = TempDir::new().unwrap();
    let file = outside.path().join("outside.txt");
    fs::write(&file, "outside").unwrap();
    let path = file.to_string_lossy().into_owned();
    (outside, path)
}

#[cfg(unix)]
#[tokio::test]
async fn test_absolute_paths_require_opt_in() {
    let temp = site();
    let (_outside, path) = absolute_target();

    let (status, _, _) = get(app(ServerConfig::new(temp.path())), &path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let config = ServerConfig {
        allow_absolute: true,
        ..ServerConfig::new(temp.path())
    };
    let (status, _, body) = get(app(config), &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "outside");
}

#[cfg(unix)]
#[tokio::test]
async fn test_root_relative_match_wins_over_absolute() {
    let temp = site();
    let (_outside, path) = absolute_target();

    // Same path recreated under the served root
    let shadow = temp.path().join(path.trim_start_matches('/'));
    fs::create_dir_all(shadow.parent().unwrap()).unwrap();
    fs::write(&shadow, "inside").unwrap();

    let config = ServerConfig {
        allow_absolute: true,
        ..ServerConfig::new(temp.path())
    };
    let (_, _, body) = get(app(config), &path).await;
    assert_eq!(body, "inside");
}

#[tokio::test]
async fn test_cors_header() {
    let temp = site();

    let (_, headers, _) = get(app(ServerConfig::new(temp.path())), "/style.css").await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let config = ServerConfig {
        cors: true,
        ..ServerConfig::new(temp.path())
    };
    let (_, headers, _) = get(app(config.clone()), "/style.css").await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    // Also on 404s
    let (_, headers, _) = get(app(config), "/missing").await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_upgrade_ignored_when_reload_disabled() {
    let temp = site();
    let config = ServerConfig {
        disable_reload: true,
        ..ServerConfig::new(temp.path())
    };
    let request = Request::get("/style.css")
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(app(config), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "body {}");
}

#[tokio::test]
async fn test_asterisk_target_is_bad_request() {
    let temp = site();
    let config = ServerConfig {
        silent: true,
        ..ServerConfig::new(temp.path())
    };
    let (state, mut fatal) = ServerState::new(config, Interceptors::default());
    let state = Arc::new(state);

    let request = Request::options("*").body(Body::empty()).unwrap();
    let (status, _, _) = send(build_router(state.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Still serving, and nothing asked the listener to stop
    let (status, _, _) = get(build_router(state), "/style.css").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        tokio::time::timeout(Duration::from_millis(100), fatal.wait())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_interceptor_producing_non_path_target_raises_fatal_signal() {
    let temp = site();
    let interceptors = Interceptors::new(
        InterceptorPipeline::new().with(Rewrite { to: "*" }),
        InterceptorPipeline::new(),
    );
    let config = ServerConfig {
        silent: true,
        ..ServerConfig::new(temp.path())
    };
    let (state, mut fatal) = ServerState::new(config, interceptors);

    let (status, _, _) = get(build_router(Arc::new(state)), "/style.css").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let reason = tokio::time::timeout(Duration::from_secs(1), fatal.wait())
        .await
        .unwrap();
    assert!(reason.contains('*'));
}

#[tokio::test]
async fn test_entry_point_bytes_kept_with_reload_script() {
    let temp = TempDir::new().unwrap();
    let document = vec![b'<', b'p', b'>', 0xE9, b'<', b'/', b'p', b'>'];
    fs::write(temp.path().join("index.html"), &document).unwrap();

    let response = app(ServerConfig::new(temp.path()))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    assert!(body.starts_with(&document));
    assert!(body.ends_with(b"</script>"));
}

struct Rewrite {
    to: &'static str,
}

#[async_trait]
impl Interceptor for Rewrite {
    async fn intercept(&self, mut request: Request) -> Result<Request, BoxError> {
        *request.uri_mut() = self.to.parse()?;
        Ok(request)
    }

    fn name(&self) -> &str {
        "rewrite"
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Interceptor for Recorder {
    async fn intercept(&self, request: Request) -> Result<Request, BoxError> {
        self.0.lock().unwrap().push(request.uri().to_string());
        Ok(request)
    }
}

#[tokio::test]
async fn test_before_interceptors_run_in_order() {
    let temp = site();
    let interceptors = Interceptors::new(
        InterceptorPipeline::new()
            .with(Rewrite { to: "/missing" })
            .with(Rewrite { to: "/style.css" }),
        InterceptorPipeline::new(),
    );

    let (status, _, body) = get(
        app_with(ServerConfig::new(temp.path()), interceptors),
        "/anything",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "body {}");
}

#[tokio::test]
async fn test_after_interceptors_see_original_request() {
    let temp = site();
    let recorder = Recorder::default();
    let interceptors = Interceptors::new(
        InterceptorPipeline::new().with(Rewrite { to: "/style.css" }),
        InterceptorPipeline::new().with(recorder.clone()),
    );

    let (status, _, _) = get(
        app_with(ServerConfig::new(temp.path()), interceptors),
        "/alias",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The after pipeline runs detached from the response
    for _ in 0..50 {
        if !recorder.0.lock().unwrap().is_empty() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(*recorder.0.lock().unwrap(), vec!["/alias".to_string()]);
}

#[tokio::test]
async fn test_failing_before_interceptor_abandons_request() {
    let temp = site();
    let recorder = Recorder::default();
    let interceptors = Interceptors::new(
        InterceptorPipeline::new()
            .with(|_request: Request| -> Result<Request, BoxError> { Err("denied".into()) })
            .with(recorder.clone()),
        InterceptorPipeline::new(),
    );
    let config = ServerConfig {
        silent: true,
        ..ServerConfig::new(temp.path())
    };

    let (status, _, body) = get(app_with(config, interceptors), "/style.css").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
    assert!(recorder.0.lock().unwrap().is_empty());
}
