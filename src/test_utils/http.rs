//! Minimal HTTP/1.1 server for exercising the network code.
//!
//! Serves canned responses per path over plain TCP, one request per
//! connection, and counts requests per path. Responses can omit the
//! content length, trickle the body in small writes, or hang up early.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A response the server replays for one path.
#[derive(Clone, Debug)]
pub struct CannedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Send a `Content-Length` header.
    pub content_length: bool,
    /// Write the body in pieces of this size with a short pause between.
    pub chunk_size: Option<usize>,
    /// Close the connection after this many body bytes.
    pub truncate_after: Option<usize>,
}

impl CannedResponse {
    /// `200 OK` with `body`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200, body)
    }

    /// Arbitrary status with `body`.
    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            content_length: true,
            chunk_size: None,
            truncate_after: None,
        }
    }

    /// Omit `Content-Length`; the body ends when the connection closes.
    pub fn without_content_length(mut self) -> Self {
        self.content_length = false;
        self
    }

    /// Write the body `size` bytes at a time.
    pub fn in_chunks(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Announce the full length but hang up after `bytes`.
    pub fn truncated(mut self, bytes: usize) -> Self {
        self.truncate_after = Some(bytes);
        self
    }
}

type Routes = Arc<Mutex<HashMap<String, CannedResponse>>>;
type Hits = Arc<Mutex<HashMap<String, usize>>>;

/// A local HTTP server bound to an ephemeral port.
///
/// Unknown paths answer `404`. The server stops when dropped.
///
/// ```rust,no_run
/// use fkey_updater::test_utils::{CannedResponse, TestHttpServer};
///
/// # async fn example() -> anyhow::Result<()> {
/// let server = TestHttpServer::start().await?;
/// server.route("/VERSION", CannedResponse::ok("v1.3.0\n"));
/// let url = server.url("/VERSION");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TestHttpServer {
    addr: SocketAddr,
    routes: Routes,
    hits: Hits,
    handle: JoinHandle<()>,
}

impl TestHttpServer {
    /// Bind to `127.0.0.1:0` and start serving.
    pub async fn start() -> Result<Self> {
        let listener =
            TcpListener::bind("127.0.0.1:0").await.context("Failed to bind test server")?;
        let addr = listener.local_addr()?;
        let routes: Routes = Arc::default();
        let hits: Hits = Arc::default();

        let handle = {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&hits);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let routes = Arc::clone(&routes);
                    let hits = Arc::clone(&hits);
                    tokio::spawn(async move {
                        let _ = serve(stream, &routes, &hits).await;
                    });
                }
            })
        };

        Ok(Self {
            addr,
            routes,
            hits,
            handle,
        })
    }

    /// Serve `response` for requests to `path`.
    pub fn route(&self, path: &str, response: CannedResponse) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(path.to_string(), response);
        }
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().map(|hits| hits.get(path).copied().unwrap_or(0)).unwrap_or(0)
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: &Routes, hits: &Hits) -> std::io::Result<()> {
    let path = read_request_path(&mut stream).await?;

    if let Ok(mut hits) = hits.lock() {
        *hits.entry(path.clone()).or_insert(0) += 1;
    }
    let response = routes
        .lock()
        .ok()
        .and_then(|routes| routes.get(&path).cloned())
        .unwrap_or_else(|| CannedResponse::status(404, "not found"));

    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
    if response.content_length {
        head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    }
    head.push_str("Content-Type: application/octet-stream\r\nConnection: close\r\n\r\n");
    stream.write_all(head.as_bytes()).await?;

    let body = match response.truncate_after {
        Some(limit) => &response.body[..limit.min(response.body.len())],
        None => &response.body[..],
    };
    match response.chunk_size {
        Some(size) => {
            for piece in body.chunks(size) {
                stream.write_all(piece).await?;
                stream.flush().await?;
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }
        None => stream.write_all(body).await?,
    }

    stream.flush().await?;
    stream.shutdown().await
}

/// Read the request head and return its path without the query string.
async fn read_request_path(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 || buf.len() > 64 * 1024 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head.lines().next().and_then(|line| line.split_whitespace().nth(1)).unwrap_or("/");
    Ok(target.split('?').next().unwrap_or(target).to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
