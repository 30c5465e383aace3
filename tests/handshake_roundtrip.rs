//! End-to-end exercise of the opening handshake and data path over a real
//! loopback TCP connection: no mocked streams, both roles wired up exactly
//! as a caller would use them.

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use ws_core::{
    handshake::{accept_async, connect_async},
    Message, SocketFlowStream,
};

#[tokio::test]
async fn client_and_server_exchange_messages_then_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let connection = accept_async(SocketFlowStream::Plain(socket)).await.unwrap();
        let (mut reader, mut writer) = connection.split();

        let message = reader.next().await.unwrap().unwrap();
        assert_eq!(message, Message::Text("hello from client".to_string()));

        writer
            .send_as_text("hello from server".to_string())
            .await
            .unwrap();
        writer.close_connection().await.unwrap();
    });

    let connection = connect_async(&format!("ws://{}", addr)).await.unwrap();
    let (mut reader, mut writer) = connection.split();

    writer
        .send_as_text("hello from client".to_string())
        .await
        .unwrap();

    let message = reader.next().await.unwrap().unwrap();
    assert_eq!(message, Message::Text("hello from server".to_string()));

    server.await.unwrap();
}

#[tokio::test]
async fn rejects_non_websocket_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        accept_async(SocketFlowStream::Plain(socket)).await
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    use tokio::io::AsyncWriteExt;
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .await
        .unwrap();

    let result = server.await.unwrap();
    assert!(result.is_err());
}
