use futures::StreamExt;
use log::*;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use ws_core::config::WebSocketConfig;
use ws_core::handshake::accept_async_with_config;
use ws_core::SocketFlowStream;

async fn handle_connection(_: SocketAddr, stream: TcpStream) {
    let config = WebSocketConfig::default();

    match accept_async_with_config(SocketFlowStream::Plain(stream), config).await {
        Ok(connection) => {
            let (mut reader, mut writer) = connection.split();
            while let Some(result) = reader.next().await {
                match result {
                    Ok(message) => {
                        if writer.send_message(message).await.is_err() {
                            error!("Failed to send message");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Received error from the stream: {}", e);
                        break;
                    }
                }
            }
        }
        Err(err) => error!("Error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr = "127.0.0.1:9002";
    let listener = TcpListener::bind(&addr).await.expect("Can't listen");
    info!("Listening on: {}", addr);

    while let Ok((stream, peer)) = listener.accept().await {
        info!("Peer address: {}", peer);
        tokio::spawn(handle_connection(peer, stream));
    }
}
