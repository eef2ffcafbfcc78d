//! End-to-end tests for the dev server: HTTP responses, the WebSocket
//! live-update channel, shutdown ordering and config restarts.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use serial_test::serial;
use spry_cli::CliError;
use spry_cli::dev::{
    ConfigReloader, DevState, FileChange, RetryPolicy, RunningServer, StartOptions, Supervisor,
    router,
};
use spry_config::{ConfigLoader, ConfigSnapshot, Overrides};
use spry_core::builtins::pipeline_for;
use spry_core::{BuildEngine, LiveMessage, PluginDescriptor, ResourceId, SourceRuntime};
use spry_plugin_styles::StylesPlugin;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

const ROOT: &str = "/project";

fn virtual_state(files: &[(&str, &[u8])]) -> spry_cli::dev::SharedState {
    let config = ConfigSnapshot::for_root(ROOT);
    let runtime = SourceRuntime::new(ROOT);
    for (path, content) in files {
        runtime.add_virtual_file(path, content.to_vec());
    }
    let styles = PluginDescriptor::from_plugin(StylesPlugin::default());
    let engine = BuildEngine::new(ROOT, pipeline_for(&config, vec![styles]), Arc::new(runtime));
    DevState::with_engine(config, engine).unwrap()
}

async fn get(state: &spry_cli::dev::SharedState, uri: &str) -> (StatusCode, String, Vec<u8>) {
    let response = router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

fn options() -> StartOptions {
    StartOptions {
        watch: false,
        retry: RetryPolicy::none(),
    }
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        "<html><head></head><body></body></html>",
    )
    .unwrap();
    std::fs::write(dir.path().join("app.js"), "export const a = 1;").unwrap();
    dir
}

fn local_config(root: &Path) -> ConfigSnapshot {
    let mut config = ConfigSnapshot::for_root(root).with_port(0);
    config.host = "127.0.0.1".to_string();
    config
}

/// Status code of a one-shot request on a fresh connection.
async fn status_of(addr: SocketAddr, path: &str) -> u16 {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let head = String::from_utf8_lossy(&response);
    head.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_live(addr: SocketAddr) -> Socket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/__spry_ws__"))
        .await
        .unwrap();
    socket
}

async fn next_json(socket: &mut Socket) -> serde_json::Value {
    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn html_gets_the_client_script() {
    let state = virtual_state(&[("index.html", b"<html><head></head><body>hi</body></html>")]);
    let (status, content_type, body) = get(&state, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/html; charset=utf-8");
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<script type=\"module\" src=\"/__spry_client__.js\"></script>\n</head>"));
}

#[tokio::test]
async fn client_script_is_served() {
    let state = virtual_state(&[]);
    let (status, content_type, body) = get(&state, "/__spry_client__.js").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/javascript");
    let script = String::from_utf8(body).unwrap();
    assert!(script.contains("/__spry_ws__"));
    assert!(script.contains("const url = toUrl(id);"));
}

#[tokio::test]
async fn missing_resources_are_404() {
    let state = virtual_state(&[]);
    let (status, _, body) = get(&state, "/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8(body).unwrap().contains("missing.js"));
}

#[tokio::test]
async fn build_errors_are_500_and_reach_clients() {
    let state = virtual_state(&[("bad.less", b"a {\n  color: @nope;\n}")]);
    let (_client, mut rx) = state.bus.subscribe();

    let (status, _, body) = get(&state, "/bad.less").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body).unwrap().contains("> 2 |   color: @nope;"));

    match rx.try_recv().unwrap() {
        LiveMessage::Error { error, code_frame } => {
            assert!(error.contains("@nope"));
            assert!(code_frame.is_some());
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(!state.engine.cache().contains(&ResourceId::from_request("/bad.less").unwrap()));
}

#[tokio::test]
async fn stylesheets_are_served_as_css() {
    let state = virtual_state(&[("theme.less", b"@fg: #111;\nbody { color: @fg; }")]);
    let (status, content_type, body) = get(&state, "/theme.less").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/css");
    assert_eq!(body, b"body { color: #111; }\n");
}

#[tokio::test]
async fn binary_assets_pass_through() {
    let png: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0x00];
    let state = virtual_state(&[("img/logo.png", png)]);
    let (status, content_type, body) = get(&state, "/img/logo.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/png");
    assert_eq!(body, png);
}

#[tokio::test]
async fn live_socket_greets_and_receives_updates() {
    let dir = project();
    let server = RunningServer::start(local_config(dir.path()), options())
        .await
        .unwrap();
    let mut socket = connect_live(server.local_addr()).await;

    let hello = next_json(&mut socket).await;
    assert_eq!(hello["type"], "info");
    assert_eq!(hello["kind"], "connected");
    assert_eq!(server.bus().client_count(), 1);

    let state = server.state().clone();
    state
        .engine
        .build(&ResourceId::from_request("/app.js").unwrap())
        .await
        .unwrap();
    let invalidation = state.dispatcher.dispatch(&dir.path().join("app.js"));
    assert!(!invalidation.needs_full_reload);

    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "update");
    assert_eq!(update["changes"][0]["id"], "app.js");
    assert_eq!(update["changes"][0]["kind"], "script");

    socket.close(None).await.unwrap();
    server.close().await;
}

#[tokio::test]
async fn close_notifies_then_destroys_then_releases() {
    let dir = project();
    let server = RunningServer::start(local_config(dir.path()), options())
        .await
        .unwrap();
    let addr = server.local_addr();
    let bus = server.bus().clone();

    let mut socket = connect_live(addr).await;
    assert_eq!(next_json(&mut socket).await["kind"], "connected");

    // Keep-alive connection with nothing left to read.
    let mut idle = TcpStream::connect(addr).await.unwrap();
    idle.write_all(b"GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buf = [0u8; 1024];
    let n = idle.read(&mut buf).await.unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 204"));

    let closing = tokio::spawn(server.close());

    let notice = next_json(&mut socket).await;
    assert_eq!(notice["type"], "info");
    assert_eq!(notice["message"], "Server restarting...");
    assert_eq!(notice["kind"], "restart");

    let after = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap();
    assert!(matches!(after, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

    closing.await.unwrap();
    assert!(bus.is_closed());

    let n = tokio::time::timeout(Duration::from_secs(2), idle.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);

    TcpListener::bind(addr).await.unwrap();
}

fn supervisor_loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::new(dir.path()).with_overrides(Overrides {
        host: Some("127.0.0.1".to_string()),
        port: Some(0),
        ..Overrides::default()
    })
}

fn restart_options() -> StartOptions {
    StartOptions {
        watch: false,
        retry: RetryPolicy::new(50, Duration::from_secs(5), Duration::from_millis(20)),
    }
}

#[tokio::test]
#[serial]
async fn restart_keeps_the_port_and_drops_clients() {
    let dir = project();
    std::fs::write(dir.path().join("spry.toml"), "[alias]\n\"~\" = \"src\"\n").unwrap();

    let mut supervisor = Supervisor::start(supervisor_loader(&dir), restart_options())
        .await
        .unwrap();
    let first = supervisor.current().unwrap();
    let port = first.port();
    assert_ne!(port, 0);
    assert!(supervisor.config_files().contains(&dir.path().join("spry.toml")));

    let mut socket = connect_live(first.local_addr()).await;
    assert_eq!(next_json(&mut socket).await["kind"], "connected");
    assert_eq!(first.bus().client_count(), 1);

    std::fs::write(dir.path().join("spry.toml"), "[alias]\n\"~\" = \"lib\"\n").unwrap();
    let second = supervisor.restart().await.unwrap();

    assert_eq!(second.port(), port);
    assert_eq!(second.bus().client_count(), 0);
    assert_eq!(second.config().alias.get("~").map(String::as_str), Some("lib"));
    assert_eq!(next_json(&mut socket).await["kind"], "restart");
    assert_eq!(status_of(second.local_addr(), "/index.html").await, 200);

    supervisor.shutdown().await;
}

#[tokio::test]
#[serial]
async fn broken_config_keeps_the_old_instance() {
    let dir = project();
    std::fs::write(dir.path().join("spry.toml"), "entries = [\"app.js\"]\n").unwrap();

    let mut supervisor = Supervisor::start(supervisor_loader(&dir), restart_options())
        .await
        .unwrap();
    let addr = supervisor.current().unwrap().local_addr();

    std::fs::write(dir.path().join("spry.toml"), "entries = [\n").unwrap();
    let err = supervisor.restart().await.unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
    assert_eq!(status_of(addr, "/app.js").await, 200);

    std::fs::write(dir.path().join("spry.toml"), "[reload]\nfull = [\"[\"]\n").unwrap();
    let err = supervisor.restart().await.unwrap_err();
    assert!(matches!(err, CliError::ReloadPolicy(_)));
    assert_eq!(supervisor.current().unwrap().local_addr(), addr);
    assert_eq!(status_of(addr, "/app.js").await, 200);

    supervisor.shutdown().await;
}

async fn next_change(reloader: &mut ConfigReloader) -> FileChange {
    tokio::time::timeout(Duration::from_secs(5), reloader.changed())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
#[serial]
async fn config_writes_restart_and_source_writes_do_not() {
    let dir = project();
    let config = dir.path().join("spry.toml");
    std::fs::write(&config, "[alias]\n\"~\" = \"src\"\n").unwrap();

    let options = StartOptions {
        watch: true,
        ..restart_options()
    };
    let supervisor = Supervisor::start(supervisor_loader(&dir), options)
        .await
        .unwrap();
    let mut reloader = ConfigReloader::new(supervisor).unwrap();
    let (port, addr) = {
        let server = reloader.supervisor().current().unwrap();
        (server.port(), server.local_addr())
    };
    let mut socket = connect_live(addr).await;
    assert_eq!(next_json(&mut socket).await["kind"], "connected");

    std::fs::write(&config, "[alias]\n\"~\" = \"lib\"\n").unwrap();
    let change = next_change(&mut reloader).await;
    assert!(change.path().ends_with("spry.toml"));
    assert_eq!(reloader.restart().await.unwrap(), port);

    // The source watcher may ask for a reload first; the restart notice
    // must follow.
    loop {
        let message = next_json(&mut socket).await;
        if message["kind"] == "restart" {
            break;
        }
        assert_eq!(message["type"], "reload");
    }

    let state = {
        let server = reloader.supervisor().current().unwrap();
        assert_eq!(server.port(), port);
        assert_eq!(server.bus().client_count(), 0);
        assert_eq!(server.config().alias.get("~").map(String::as_str), Some("lib"));
        server.state().clone()
    };

    let mut socket = connect_live(addr).await;
    assert_eq!(next_json(&mut socket).await["kind"], "connected");
    state
        .engine
        .build(&ResourceId::from_request("/app.js").unwrap())
        .await
        .unwrap();

    std::fs::write(dir.path().join("app.js"), "export const a = 2;").unwrap();
    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "update");
    assert_eq!(update["changes"][0]["id"], "app.js");

    let quiet = tokio::time::timeout(Duration::from_millis(500), reloader.changed()).await;
    assert!(quiet.is_err());
    assert_eq!(reloader.supervisor().current().unwrap().port(), port);

    reloader.shutdown().await;
}

#[tokio::test]
#[serial]
async fn failed_boot_keeps_watching_config_files() {
    unsafe {
        std::env::remove_var("HOST");
        std::env::remove_var("SPRY_HOST");
    }
    let dir = project();
    let config = dir.path().join("spry.toml");
    std::fs::write(&config, "host = \"127.0.0.1\"\n").unwrap();

    let loader = ConfigLoader::new(dir.path()).with_overrides(Overrides {
        port: Some(0),
        ..Overrides::default()
    });
    let supervisor = Supervisor::start(loader, restart_options()).await.unwrap();
    let port = supervisor.current().unwrap().port();
    let mut reloader = ConfigReloader::new(supervisor).unwrap();

    // TEST-NET-3: no local interface owns it, so the bind cannot succeed.
    std::fs::write(&config, "host = \"203.0.113.1\"\n").unwrap();
    next_change(&mut reloader).await;
    let err = reloader.restart().await.unwrap_err();
    assert!(matches!(err, CliError::Bind { .. }));
    assert!(reloader.supervisor().current().is_none());
    assert!(reloader.supervisor().config_files().contains(&config));

    std::fs::write(&config, "host = \"127.0.0.1\"\n").unwrap();
    let change = next_change(&mut reloader).await;
    assert!(change.path().ends_with("spry.toml"));
    assert_eq!(reloader.restart().await.unwrap(), port);

    let addr = reloader.supervisor().current().unwrap().local_addr();
    assert_eq!(status_of(addr, "/index.html").await, 200);

    reloader.shutdown().await;
}

#[tokio::test]
async fn busy_port_is_fatal_at_startup() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dir = project();
    let config = local_config(dir.path()).with_port(taken.local_addr().unwrap().port());

    let err = RunningServer::start(config, options()).await.unwrap_err();
    assert!(err.is_addr_in_use());
}
