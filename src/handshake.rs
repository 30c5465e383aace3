//! The RFC 6455 opening handshake, for both roles.
//!
//! Server side: parse the client's upgrade request, validate it, answer with
//! a `101 Switching Protocols`. Client side: build the upgrade request,
//! send it, and validate the server's answer — including the accept-key
//! check, which a surprising number of client implementations skip.

use crate::config::{ClientConfig, WebSocketConfig};
use crate::error::Error;
use crate::mask;
use crate::request::{construct_http_request, HttpRequest, HttpResponse};
use crate::split::WSConnection;
use crate::state::Role;
use crate::stream::SocketFlowStream;
use crate::utils::generate_websocket_accept_value;
use pki_types::ServerName;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::{rustls, TlsConnector};

/// Accepts a client connection on an already-open stream, using default
/// websocket settings and no TLS (the stream is handed to us already
/// TLS-terminated if the caller wants TLS — see `server::start_server_with_config`).
pub async fn accept_async(stream: SocketFlowStream) -> Result<WSConnection, Error> {
    accept_async_with_config(stream, WebSocketConfig::default()).await
}

pub async fn accept_async_with_config(
    mut stream: SocketFlowStream,
    config: WebSocketConfig,
) -> Result<WSConnection, Error> {
    let request = HttpRequest::parse(&mut stream).await?;

    if !request
        .header("connection")
        .map(|v| v.to_lowercase().contains("upgrade"))
        .unwrap_or(false)
    {
        return Err(Error::NoConnectionHeaderPresent);
    }
    if !request
        .header("upgrade")
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
    {
        return Err(Error::NoUpgradeHeaderPresent);
    }
    if request.header("host").is_none() {
        return Err(Error::NoHostHeaderPresent);
    }

    let key = request.header("sec-websocket-key").ok_or(Error::NoSecWebsocketKey)?;

    match request.header("sec-websocket-version") {
        Some(version) if version == config.version.to_string() => {}
        Some(version) => return Err(Error::VersionMismatch(version.to_string())),
        None => return Err(Error::VersionMismatch(String::new())),
    }

    let accept_value = generate_websocket_accept_value(key);

    let negotiated_protocol = request
        .header("sec-websocket-protocol")
        .and_then(|requested| negotiate_subprotocol(requested, &config.subprotocols));

    if request.header("sec-websocket-protocol").is_some()
        && !config.subprotocols.is_empty()
        && negotiated_protocol.is_none()
    {
        return Err(Error::ProtocolMismatch(
            request.header("sec-websocket-protocol").unwrap().to_string(),
        ));
    }

    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: {}\r\n",
        accept_value
    );
    if let Some(protocol) = &negotiated_protocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", protocol));
    }
    response.push_str("\r\n");

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(WSConnection::new(stream, Role::Server, config))
}

/// Connects to `ws_url`, performing the TCP (and, for `wss://`, TLS) dial and
/// the opening handshake, using default websocket settings.
pub async fn connect_async(ws_url: &str) -> Result<WSConnection, Error> {
    connect_async_with_config(ws_url, ClientConfig::default()).await
}

pub async fn connect_async_with_config(
    ws_url: &str,
    config: ClientConfig,
) -> Result<WSConnection, Error> {
    let mut rng = mask::new_rng();
    let nonce = mask::random_handshake_nonce(&mut rng);

    let (request, host_with_port, host, use_tls) =
        construct_http_request(ws_url, &nonce, &config.web_socket_config.subprotocols)?;

    let tcp_stream = TcpStream::connect(&host_with_port).await?;

    let mut stream = if use_tls {
        let connector = build_tls_connector(config.ca_file.as_deref()).await?;
        let server_name = ServerName::try_from(host.as_str())?.to_owned();
        let tls_stream = connector.connect(server_name, tcp_stream).await?;
        SocketFlowStream::Secure(tokio_rustls::TlsStream::from(tls_stream))
    } else {
        SocketFlowStream::Plain(tcp_stream)
    };

    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let response = HttpResponse::parse(&mut stream).await?;
    if response.status != 101 {
        return Err(Error::FailedUpgrade(response.status));
    }
    if !response
        .header("upgrade")
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
    {
        return Err(Error::NoUpgradeHeaderPresent);
    }
    if !response
        .header("connection")
        .map(|v| v.to_lowercase().contains("upgrade"))
        .unwrap_or(false)
    {
        return Err(Error::NoConnectionHeaderPresent);
    }

    let expected_accept = generate_websocket_accept_value(&nonce);
    let actual_accept = response
        .header("sec-websocket-accept")
        .ok_or(Error::InvalidAcceptKey)?;
    if actual_accept != expected_accept {
        return Err(Error::InvalidAcceptKey);
    }

    Ok(WSConnection::new(
        stream,
        Role::Client,
        config.web_socket_config,
    ))
}

/// Picks the first of `offered` (our preference order) present in the
/// client's comma-separated `Sec-WebSocket-Protocol` request value.
fn negotiate_subprotocol(requested: &str, offered: &[String]) -> Option<String> {
    let requested: Vec<&str> = requested.split(',').map(str::trim).collect();
    offered
        .iter()
        .find(|candidate| requested.iter().any(|r| r.eq_ignore_ascii_case(candidate)))
        .cloned()
}

async fn build_tls_connector(ca_file: Option<&str>) -> Result<TlsConnector, Error> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_file {
        let mut file = tokio::fs::File::open(path).await?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;
        let mut cursor = Cursor::new(contents);
        for cert in rustls_pemfile::certs(&mut cursor) {
            roots.add(cert?)?;
        }
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_subprotocol_picks_first_offered_match() {
        let offered = vec!["chat".to_string(), "superchat".to_string()];
        assert_eq!(
            negotiate_subprotocol("superchat, chat", &offered),
            Some("chat".to_string())
        );
    }

    #[test]
    fn negotiate_subprotocol_is_case_insensitive() {
        let offered = vec!["Chat".to_string()];
        assert_eq!(
            negotiate_subprotocol("CHAT", &offered),
            Some("Chat".to_string())
        );
    }

    #[test]
    fn negotiate_subprotocol_returns_none_without_overlap() {
        let offered = vec!["chat".to_string()];
        assert_eq!(negotiate_subprotocol("bogus", &offered), None);
    }
}
