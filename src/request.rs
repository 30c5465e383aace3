//! HTTP/1.1 plumbing for the opening handshake: building the client's
//! `GET` upgrade request by hand (it's a fixed, tiny shape — not worth
//! pulling in a full HTTP client), and parsing the server's view of an
//! incoming request with `httparse`.

use crate::error::Error;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{timeout, Duration};
use url::Url;

const HANDSHAKE_READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_BYTES: usize = 16 * 1024;
const MAX_HEADERS: usize = 32;

/// Builds the client's opening-handshake request line and headers for
/// `ws_url`, plus everything the caller needs to open the underlying TCP
/// connection: `(request, host_with_port, host, use_tls)`.
pub(crate) fn construct_http_request(
    ws_url: &str,
    key: &str,
    subprotocols: &[String],
) -> Result<(String, String, String, bool), Error> {
    let parsed_url = Url::parse(ws_url)?;

    let (default_port, use_tls) = match parsed_url.scheme() {
        "ws" => (80u16, false),
        "wss" => (443u16, true),
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().unwrap_or(default_port);
    let host_with_port = format!("{}:{}", host, port);

    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => String::from(host),
    };

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
        request_path, request_host_field, key,
    );

    if !subprotocols.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Protocol: {}\r\n",
            subprotocols.join(", ")
        ));
    }

    request.push_str("\r\n");

    Ok((request, host_with_port, String::from(host), use_tls))
}

/// A parsed HTTP/1.1 request line plus headers, case-insensitively keyed.
/// Bodies are never expected on a websocket upgrade request, so this doesn't
/// read one.
#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Reads and parses one HTTP request from `reader`. Grows an internal
    /// buffer and re-parses with `httparse` until the header block
    /// completes, times out, or exceeds `MAX_REQUEST_BYTES`.
    pub async fn parse<R: AsyncRead + Unpin>(reader: &mut R) -> Result<HttpRequest, Error> {
        timeout(HANDSHAKE_READ_TIMEOUT, Self::parse_inner(reader)).await?
    }

    async fn parse_inner<R: AsyncRead + Unpin>(reader: &mut R) -> Result<HttpRequest, Error> {
        let mut buf = Vec::with_capacity(1024);
        let mut chunk = [0u8; 512];

        loop {
            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut parsed = httparse::Request::new(&mut headers);

            if let httparse::Status::Complete(_) = parsed.parse(&buf)? {
                let method = parsed
                    .method
                    .ok_or(Error::InvalidHTTPHandshake)?
                    .to_string();
                let path = parsed.path.ok_or(Error::InvalidHTTPHandshake)?.to_string();

                let mut header_map = HashMap::with_capacity(parsed.headers.len());
                for header in parsed.headers.iter() {
                    header_map.insert(
                        header.name.to_lowercase(),
                        String::from_utf8_lossy(header.value).into_owned(),
                    );
                }

                return Ok(HttpRequest {
                    method,
                    path,
                    headers: header_map,
                });
            }

            if buf.len() >= MAX_REQUEST_BYTES {
                return Err(Error::InvalidHTTPHandshake);
            }

            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::IncompleteHTTPRequest);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// The server's handshake response: status code plus case-insensitively
/// keyed headers. Used by the client to validate the upgrade.
#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub status: u16,
    headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub async fn parse<R: AsyncRead + Unpin>(reader: &mut R) -> Result<HttpResponse, Error> {
        timeout(HANDSHAKE_READ_TIMEOUT, Self::parse_inner(reader)).await?
    }

    async fn parse_inner<R: AsyncRead + Unpin>(reader: &mut R) -> Result<HttpResponse, Error> {
        let mut buf = Vec::with_capacity(1024);
        let mut chunk = [0u8; 512];

        loop {
            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
            let mut parsed = httparse::Response::new(&mut headers);

            if let httparse::Status::Complete(_) = parsed.parse(&buf)? {
                let status = parsed.code.ok_or(Error::InvalidHTTPHandshake)?;

                let mut header_map = HashMap::with_capacity(parsed.headers.len());
                for header in parsed.headers.iter() {
                    header_map.insert(
                        header.name.to_lowercase(),
                        String::from_utf8_lossy(header.value).into_owned(),
                    );
                }

                return Ok(HttpResponse {
                    status,
                    headers: header_map,
                });
            }

            if buf.len() >= MAX_REQUEST_BYTES {
                return Err(Error::InvalidHTTPHandshake);
            }

            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::IncompleteHTTPRequest);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_http_request_fills_in_default_ports() {
        let (request, host_with_port, host, use_tls) =
            construct_http_request("ws://example.com/chat?room=1", "dGhlIHNhbXBsZSBub25jZQ==", &[])
                .unwrap();

        assert_eq!(host_with_port, "example.com:80");
        assert_eq!(host, "example.com");
        assert!(!use_tls);
        assert!(request.starts_with("GET /chat?room=1 HTTP/1.1\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn construct_http_request_recognizes_wss_and_explicit_port() {
        let (_, host_with_port, _, use_tls) =
            construct_http_request("wss://example.com:9443/", "key", &[]).unwrap();
        assert_eq!(host_with_port, "example.com:9443");
        assert!(use_tls);
    }

    #[test]
    fn construct_http_request_rejects_non_ws_scheme() {
        assert!(matches!(
            construct_http_request("http://example.com", "key", &[]),
            Err(Error::InvalidSchemeURL)
        ));
    }

    #[test]
    fn construct_http_request_adds_subprotocol_header() {
        let (request, ..) = construct_http_request(
            "ws://example.com",
            "key",
            &["chat".to_string(), "superchat".to_string()],
        )
        .unwrap();
        assert!(request.contains("Sec-WebSocket-Protocol: chat, superchat\r\n"));
    }

    #[tokio::test]
    async fn http_request_parses_headers_case_insensitively() {
        let raw = b"GET /chat HTTP/1.1\r\nHost: example.com\r\nSec-WebSocket-Key: abc\r\n\r\n";
        let mut reader = &raw[..];
        let request = HttpRequest::parse(&mut reader).await.unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/chat");
        assert_eq!(request.header("HOST"), Some("example.com"));
        assert_eq!(request.header("sec-websocket-key"), Some("abc"));
    }

    #[tokio::test]
    async fn http_response_parses_status_and_accept_header() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
        let mut reader = &raw[..];
        let response = HttpResponse::parse(&mut reader).await.unwrap();
        assert_eq!(response.status, 101);
        assert_eq!(
            response.header("sec-websocket-accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
    }
}
