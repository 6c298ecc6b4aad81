//! Development server and live-reload channel.
//!
//! The output directory is served as static files. HTML responses get a
//! small client script appended that listens on a server-sent-events stream
//! and reloads the page whenever [`LiveReload::notify`] fires.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use regex::Regex;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use futures::{future, Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use crate::{report, slog, slog_debug, slog_warn, Error, Result};

/// SSE endpoint the injected client connects to.
pub const RELOAD_PATH: &str = "/__shoal/reload";

/// Appended to every served HTML page.
pub const CLIENT_SCRIPT: &str = concat!(
    "<script>(function(){",
    "var s=new EventSource('/__shoal/reload');",
    "s.addEventListener('reload',function(){window.location.reload();});",
    "})();</script>"
);

/// Largest HTML body the injector will buffer.
const MAX_HTML_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    /// What triggered the reload, e.g. the watch group that rebuilt.
    pub reason: String,
}

/// Broadcast handle that tells connected browsers to refresh.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadEvent>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Ask every connected browser to reload. Returns how many were listening.
    pub fn notify(&self, reason: &str) -> usize {
        let delivered = self
            .tx
            .send(ReloadEvent {
                reason: reason.to_string(),
            })
            .unwrap_or(0);
        slog_debug!("live reload ({}) -> {} client(s)", reason, delivered);
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

fn closing_body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("static regex"))
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    match closing_body_regex().find_iter(html).last() {
        Some(m) => {
            let mut out = String::with_capacity(html.len() + CLIENT_SCRIPT.len());
            out.push_str(&html[..m.start()]);
            out.push_str(CLIENT_SCRIPT);
            out.push_str(&html[m.start()..]);
            out
        }
        None => format!("{}{}", html, CLIENT_SCRIPT),
    }
}

async fn inject_into_html(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false);
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_HTML_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            slog_warn!("could not buffer HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

#[derive(Clone)]
struct ServerState {
    reload: LiveReload,
    /// Ends open reload streams so graceful shutdown can finish.
    shutdown: CancellationToken,
}

async fn reload_stream(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.reload.subscribe())
        .filter_map(|msg| {
            future::ready(
                msg.ok()
                    .map(|event| Ok(Event::default().event("reload").data(event.reason))),
            )
        })
        .take_until(state.shutdown.cancelled_owned());
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Routes: the reload stream plus static files from `dist`.
///
/// Reload streams close once `shutdown` fires.
pub fn router(dist: PathBuf, reload: LiveReload, shutdown: CancellationToken) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(reload_stream))
        .fallback_service(ServeDir::new(dist))
        .layer(middleware::map_response(inject_into_html))
        .with_state(ServerState { reload, shutdown })
}

/// Serve on an already bound listener until `cancel` fires.
pub async fn serve_on(
    listener: TcpListener,
    dist: PathBuf,
    reload: LiveReload,
    cancel: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router(dist, reload, cancel.clone()))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

/// Bind `localhost:port` and serve `dist` until `cancel` fires.
pub async fn serve(
    dist: PathBuf,
    port: u16,
    reload: LiveReload,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("cannot bind {}: {}", addr, e)))?;
    slog!("dev server listening on {}", addr);
    report::info(&format!(
        "Serving {} at http://localhost:{}",
        dist.display(),
        port
    ));
    serve_on(listener, dist, reload, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn test_inject_before_closing_body() {
        let html = "<html><body><p>fish</p></BODY></html>";
        let out = inject_client(html);
        let script_at = out.find(CLIENT_SCRIPT).unwrap();
        assert!(script_at < out.find("</BODY>").unwrap());
        assert!(out.starts_with("<html><body><p>fish</p>"));
    }

    #[test]
    fn test_inject_without_body_appends() {
        let out = inject_client("<p>minified</p>");
        assert_eq!(out, format!("<p>minified</p>{}", CLIENT_SCRIPT));
    }

    #[test]
    fn test_notify_without_clients() {
        let reload = LiveReload::new();
        assert_eq!(reload.notify("views"), 0);
    }

    #[tokio::test]
    async fn test_notify_reaches_subscribers() {
        let reload = LiveReload::new();
        let mut rx = reload.subscribe();
        assert_eq!(reload.notify("styles"), 1);
        assert_eq!(rx.recv().await.unwrap().reason, "styles");
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_html_with_client_and_assets_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<body>hi</body>").unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/main.css"), "a{color:red}").unwrap();

        let (addr, _reload, cancel, server) = start(dir.path()).await;

        let page = get(addr, "/").await;
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains(CLIENT_SCRIPT));

        let css = get(addr, "/css/main.css").await;
        assert!(css.contains("a{color:red}"));
        assert!(!css.contains("EventSource"));

        let missing = get(addr, "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    type Running = (
        SocketAddr,
        LiveReload,
        CancellationToken,
        tokio::task::JoinHandle<Result<()>>,
    );

    async fn start(dir: &std::path::Path) -> Running {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reload = LiveReload::new();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve_on(
            listener,
            dir.to_path_buf(),
            reload.clone(),
            cancel.clone(),
        ));
        (addr, reload, cancel, server)
    }

    #[tokio::test]
    async fn test_reload_stream_delivers_events() {
        let dir = tempfile::TempDir::new().unwrap();
        let (addr, reload, cancel, server) = start(dir.path()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /__shoal/reload HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).contains("text/event-stream"));

        // The handler subscribes before the headers go out.
        assert_eq!(reload.notify("views"), 1);
        let mut seen = String::new();
        while !seen.contains("data: views") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early");
            seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        assert!(seen.contains("event: reload"));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_with_connected_browser() {
        let dir = tempfile::TempDir::new().unwrap();
        let (addr, _reload, cancel, server) = start(dir.path()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /__shoal/reload HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("server still running with an open reload stream")
            .unwrap()
            .unwrap();

        // The client sees the stream end.
        let mut rest = Vec::new();
        tokio::time::timeout(std::time::Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .expect("reload stream left open")
            .unwrap();
    }
}
