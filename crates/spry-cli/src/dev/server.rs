//! HTTP surface of the dev server.
//!
//! Every request outside the two internal routes is answered by the build
//! engine: resolve the URL, build (or reuse) the resource and send it with
//! a content type derived from its extension. HTML responses get the live
//! client injected.

use axum::{
    Router,
    body::Body,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use spry_core::protocol::INFO_KIND_CONNECTED;
use spry_core::{BuildError, LiveMessage, ResourceId};
use tower_http::cors::{Any, CorsLayer};

use crate::dev::SharedState;

/// WebSocket endpoint of the live-update channel.
pub const LIVE_SOCKET_PATH: &str = "/__spry_ws__";
/// Browser side of the live-update channel.
pub const CLIENT_SCRIPT_PATH: &str = "/__spry_client__.js";

const CLIENT_SCRIPT: &str = include_str!("../../assets/client.js");

/// Extensions served as raw bytes instead of going through the pipeline.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "ico", "bmp", "woff", "woff2", "ttf", "otf",
    "eot", "wasm", "mp3", "mp4", "webm", "ogg", "wav", "pdf", "zip",
];

/// Router for one server instance.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(LIVE_SOCKET_PATH, get(live_socket))
        .route(CLIENT_SCRIPT_PATH, get(client_script))
        .route("/favicon.ico", get(favicon))
        .fallback(serve_resource)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn live_socket(State(state): State<SharedState>, ws: WebSocketUpgrade) -> Response {
    let sockets = state.sockets.clone();
    ws.on_upgrade(move |socket| sockets.track_future(run_session(socket, state)))
}

/// One live-update session.
///
/// Queued messages are flushed before a close is honored, so a client sees
/// the restart notice before the socket closes.
async fn run_session(mut socket: WebSocket, state: SharedState) {
    let (client, mut rx) = state.bus.subscribe();

    let hello = LiveMessage::info("connected", Some(INFO_KIND_CONNECTED));
    if socket.send(text(&hello)).await.is_err() {
        state.bus.unsubscribe(client);
        return;
    }

    loop {
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(message) => {
                    if let Err(err) = socket.send(text(&message)).await {
                        tracing::debug!(client, error = %err, "live send failed");
                        break;
                    }
                }
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::debug!(client, error = %err, "live socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.bus.unsubscribe(client);
}

fn text(message: &LiveMessage) -> Message {
    Message::Text(message.to_json().into())
}

async fn client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn serve_resource(State(state): State<SharedState>, uri: Uri) -> Response {
    let mut path = uri.path().to_string();
    if path.ends_with('/') {
        path.push_str("index.html");
    }

    let id = match state.engine.resolve(&path, None).await {
        Ok(id) => id,
        Err(err) => {
            state.reporter.report(&err);
            return error_response(&err);
        }
    };

    if is_binary(&id) {
        return serve_binary(&state, &id).await;
    }

    match state.engine.build(&id).await {
        Ok(entry) => {
            let content_type = determine_content_type(id.as_str());
            let body = if content_type.starts_with("text/html") {
                inject_client_script(&entry.content)
            } else {
                entry.content.clone()
            };
            ok(content_type, Body::from(body))
        }
        Err(err) => {
            state.reporter.report(&err);
            error_response(&err)
        }
    }
}

async fn serve_binary(state: &SharedState, id: &ResourceId) -> Response {
    let path = id.to_path(state.engine.root());
    match state.engine.runtime().read_file(&path).await {
        Ok(bytes) => ok(determine_content_type(id.as_str()), Body::from(bytes)),
        Err(err) => {
            tracing::debug!(%id, error = %err, "asset read failed");
            error_response(&BuildError::not_found(id.as_str()))
        }
    }
}

fn ok(content_type: &'static str, body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Plain-text error page: 404 for resolution failures, 500 otherwise.
fn error_response(err: &BuildError) -> Response {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let mut body = err.summary();
    if let Some(frame) = &err.code_frame {
        body.push_str("\n\n");
        body.push_str(frame);
    }
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

fn is_binary(id: &ResourceId) -> bool {
    id.extension()
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/// Insert the client script tag into an HTML document.
///
/// The tag goes before `</head>`, else before `</body>`, else at the end.
pub fn inject_client_script(html: &str) -> String {
    let tag = format!(r#"<script type="module" src="{CLIENT_SCRIPT_PATH}"></script>"#);
    let at = html.find("</head>").or_else(|| html.rfind("</body>"));
    match at {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len() + 1);
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push('\n');
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}\n{tag}"),
    }
}

/// Content type of a served resource, by extension.
///
/// Resources the pipeline turns into modules (`.ts`, `.json`, ...) are
/// served as JavaScript, and `.less` as CSS.
pub fn determine_content_type(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" | "mts" | "json" => "application/javascript",
        "map" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" | "less" => "text/css",
        "svg" => "image/svg+xml",
        "txt" => "text/plain; charset=utf-8",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
