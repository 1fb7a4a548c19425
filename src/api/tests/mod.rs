use super::*;
use crate::downloader::test_helpers::{
    FileBehavior, ScriptedEngine, ScriptedFile, ScriptedHandle, TEST_MAGNET,
    create_test_downloader, create_test_downloader_with,
};
use crate::types::Event;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Build a router over a scripted engine
///
/// Returns the downloader and engine for inspection; keep the temp dir alive
/// for the duration of the test.
async fn test_app(
    engine: ScriptedEngine,
) -> (
    Router,
    Arc<TorrentDownloader>,
    Arc<ScriptedEngine>,
    tempfile::TempDir,
) {
    let (downloader, engine, temp_dir) = create_test_downloader(engine).await;
    let downloader = Arc::new(downloader);
    let config = downloader.get_config();
    (
        create_router(Arc::clone(&downloader), config),
        downloader,
        engine,
        temp_dir,
    )
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown_signal() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_shutdown(downloader, config, async move {
        let _ = stop_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_server_binding_conflict_is_reported() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = (*downloader.get_config()).clone();
    config.server.api.bind_address = occupied.local_addr().unwrap();

    let result = start_api_server(downloader, Arc::new(config)).await;

    assert!(matches!(result, Err(crate::error::Error::Io(_))));
}

#[tokio::test]
async fn test_spawn_api_server_serves_health() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();
    drop(occupied);

    let (downloader, _engine, _temp_dir) = create_test_downloader_with(
        ScriptedEngine::new(ScriptedHandle::never_ready()),
        |config| config.server.api.bind_address = addr,
    )
    .await;
    let downloader = Arc::new(downloader);

    let api_handle = downloader.spawn_api_server();

    // Poll until the listener is up
    let mut connected = false;
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            connected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    api_handle.abort();

    assert!(connected, "API server should accept connections on {addr}");
}

#[tokio::test]
async fn test_cors_enabled() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_specific_cors_origin_is_echoed() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.cors_origins = vec!["http://localhost:3000".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_default_config_router_serves_swagger_and_openapi() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api = crate::config::ApiConfig::default();
    assert!(config.server.api.swagger_ui);
    let app = create_router(downloader, Arc::new(config));

    let response = app.clone().oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get(SWAGGER_DOC_PATH)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/torrents/zip"].is_object());

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_swagger_ui_can_be_disabled() {
    let (_app, downloader, _engine, _temp_dir) =
        test_app(ScriptedEngine::new(ScriptedHandle::never_ready())).await;

    let mut config = (*downloader.get_config()).clone();
    config.server.api.swagger_ui = false;
    let app = create_router(downloader, Arc::new(config));

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
