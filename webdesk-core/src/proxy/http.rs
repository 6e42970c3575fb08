//! Minimal HTTP/1.1 handling for the proxy's listen port.
//!
//! The request head is peeked, not consumed, so a WebSocket upgrade can be
//! handed to the handshake untouched. Everything else is answered as a
//! static file request and the connection is closed.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Result;

/// Largest request head accepted.
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
const PEEK_INTERVAL: Duration = Duration::from_millis(10);
const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

// ── RequestHead ──────────────────────────────────────────────────

/// Request line and headers of one HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Raw request target, query string included.
    pub target: String,
    pub headers: Vec<(String, String)>,
    /// Byte length of the head including the blank line.
    pub len: usize,
}

impl RequestHead {
    /// Parse a complete head. `None` if `buf` holds no terminated,
    /// well-formed head.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let end = find(buf, HEAD_TERMINATOR)? + HEAD_TERMINATOR.len();
        let text = std::str::from_utf8(&buf[..end]).ok()?;
        let mut lines = text.split("\r\n");

        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let target = request_line.next()?.to_string();
        if !request_line.next()?.starts_with("HTTP/") {
            return None;
        }

        let mut headers = Vec::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line.split_once(':')?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        Some(Self {
            method,
            target,
            headers,
            len: end,
        })
    }

    /// First header with this name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    pub fn is_websocket_upgrade(&self) -> bool {
        self.header_has_token("Upgrade", "websocket")
    }

    /// Subprotocols offered in `Sec-WebSocket-Protocol`.
    pub fn subprotocols(&self) -> Vec<&str> {
        self.header("Sec-WebSocket-Protocol")
            .map(|v| v.split(',').map(str::trim).filter(|p| !p.is_empty()).collect())
            .unwrap_or_default()
    }

    /// The path portion of the target, percent-decoded.
    pub fn path(&self) -> String {
        let raw = self.target.split(['?', '#']).next().unwrap_or("/");
        percent_decode(raw)
    }
}

/// Result of peeking at a new connection.
#[derive(Debug)]
pub enum Peeked {
    Head(RequestHead),
    /// The peer closed before sending a full head.
    Closed,
    /// Oversized, malformed, or too slow.
    Invalid,
}

/// Wait until a full request head is buffered on `stream` and parse it
/// without consuming any bytes. A peer that stays silent for
/// [`HEAD_TIMEOUT`] is reported as [`Peeked::Invalid`].
pub async fn peek_head(stream: &TcpStream) -> Result<Peeked> {
    peek_head_within(stream, HEAD_TIMEOUT).await
}

async fn peek_head_within(stream: &TcpStream, limit: Duration) -> Result<Peeked> {
    match tokio::time::timeout(limit, peek_until_complete(stream)).await {
        Ok(peeked) => peeked,
        Err(_) => {
            debug!("no request head within {limit:?}");
            Ok(Peeked::Invalid)
        }
    }
}

async fn peek_until_complete(stream: &TcpStream) -> Result<Peeked> {
    let mut buf = vec![0u8; MAX_HEAD_SIZE];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(Peeked::Closed);
        }
        if find(&buf[..n], HEAD_TERMINATOR).is_some() {
            return Ok(match RequestHead::parse(&buf[..n]) {
                Some(head) => Peeked::Head(head),
                None => Peeked::Invalid,
            });
        }
        if n == buf.len() {
            return Ok(Peeked::Invalid);
        }
        // peek returns immediately while partial data is buffered.
        tokio::time::sleep(PEEK_INTERVAL).await;
    }
}

// ── Static files ─────────────────────────────────────────────────

/// Answer a non-upgrade request from `web_root`. Returns the status sent.
pub async fn serve_static(
    mut stream: TcpStream,
    head: &RequestHead,
    web_root: Option<&Path>,
) -> Result<u16> {
    // Consume the head that was only peeked so far.
    let mut consumed = vec![0u8; head.len];
    stream.read_exact(&mut consumed).await?;

    let (status, content_type, body) = match resolve(head, web_root).await {
        Ok((path, body)) => (200, content_type(&path), body),
        Err(status) => (status, "text/plain; charset=utf-8", reason(status).as_bytes().to_vec()),
    };
    debug!("{} {} -> {status}", head.method, head.target);

    let header = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reason(status),
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    if head.method != "HEAD" {
        stream.write_all(&body).await?;
    }
    stream.shutdown().await?;
    Ok(status)
}

/// Send a bare status response, e.g. for unparsable requests.
pub async fn respond_status(mut stream: TcpStream, status: u16) -> Result<()> {
    let body = reason(status);
    let response = format!(
        "HTTP/1.1 {status} {body}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn resolve(
    head: &RequestHead,
    web_root: Option<&Path>,
) -> std::result::Result<(PathBuf, Vec<u8>), u16> {
    if head.method != "GET" && head.method != "HEAD" {
        return Err(405);
    }
    let root = web_root.ok_or(404u16)?;
    let relative = sanitize(&head.path()).ok_or(403u16)?;

    let mut path = root.join(relative);
    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.push("index.html");
    }
    match tokio::fs::read(&path).await {
        Ok(body) => Ok((path, body)),
        Err(_) => Err(404),
    }
}

/// Map a URL path to a relative filesystem path. `None` if it would
/// escape the web root.
fn sanitize(url_path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for part in Path::new(url_path.trim_start_matches('/')).components() {
        match part {
            Component::Normal(p) => out.push(p),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "jpg" | "jpeg" => "image/jpeg",
        "wasm" => "application/wasm",
        "txt" | "md" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Error",
    }
}

fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &[u8] = b"GET /websockify HTTP/1.1\r\n\
        Host: localhost:6080\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Protocol: binary, base64\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn parses_upgrade_request() {
        let head = RequestHead::parse(UPGRADE).unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.target, "/websockify");
        assert_eq!(head.len, UPGRADE.len());
        assert!(head.is_websocket_upgrade());
        assert_eq!(head.subprotocols(), ["binary", "base64"]);
        assert_eq!(head.header("host"), Some("localhost:6080"));
    }

    #[test]
    fn incomplete_head_is_none() {
        assert!(RequestHead::parse(b"GET / HTTP/1.1\r\nHost: x\r\n").is_none());
        assert!(RequestHead::parse(b"garbage\r\n\r\n").is_none());
    }

    #[test]
    fn plain_get_is_not_upgrade() {
        let head = RequestHead::parse(b"GET /vnc.html?autoconnect=1 HTTP/1.1\r\n\r\n").unwrap();
        assert!(!head.is_websocket_upgrade());
        assert_eq!(head.path(), "/vnc.html");
    }

    #[test]
    fn sanitize_blocks_traversal() {
        assert_eq!(sanitize("/app/ui.js"), Some(PathBuf::from("app/ui.js")));
        assert_eq!(sanitize("/"), Some(PathBuf::new()));
        assert_eq!(sanitize("/./vnc.html"), Some(PathBuf::from("vnc.html")));
        assert!(sanitize("/../etc/passwd").is_none());
        assert!(sanitize("/app/../../secret").is_none());
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("/my%20file.html"), "/my file.html");
        assert_eq!(percent_decode("/bad%zz"), "/bad%zz");
        assert_eq!(percent_decode("/trailing%2"), "/trailing%2");
        assert_eq!(percent_decode("/caf%C3%A9.html"), "/café.html");
    }

    #[tokio::test]
    async fn silent_client_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let limit = Duration::from_millis(200);
        let peeked = tokio::time::timeout(Duration::from_secs(5), peek_head_within(&server, limit))
            .await
            .expect("idle connection outlived the head timeout")
            .unwrap();
        assert!(matches!(peeked, Peeked::Invalid));
    }

    #[tokio::test]
    async fn partial_head_is_not_consumed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        client.write_all(b"GET /vnc.html HTTP/1.1\r\n").await.unwrap();
        let pending = tokio::spawn(async move {
            let peeked = peek_head(&server).await.unwrap();
            (peeked, server)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b"Host: x\r\n\r\n").await.unwrap();

        let (peeked, mut server) = pending.await.unwrap();
        let Peeked::Head(head) = peeked else {
            panic!("expected a head, got {peeked:?}");
        };
        assert_eq!(head.path(), "/vnc.html");
        let mut raw = vec![0u8; head.len];
        server.read_exact(&mut raw).await.unwrap();
        assert!(raw.starts_with(b"GET /vnc.html"));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("vnc.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("core/rfb.js")), "text/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}
