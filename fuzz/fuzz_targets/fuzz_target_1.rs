#![no_main]

use base64::prelude::*;
use libfuzzer_sys::fuzz_target;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use ws_core::handshake::accept_async;
use ws_core::SocketFlowStream;

fuzz_target!(|data: &[u8]| {
    let runtime = Runtime::new().unwrap();

    let data_vec = Vec::from(data);
    runtime.block_on(async move {
        // Create a local TCP listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn a task to accept the incoming connection and handle fuzz data.
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let handshake = build_fuzzed_handshake(&data_vec);
                let _ = socket.write_all(handshake.as_bytes()).await;
            }
        });

        // Connect to the listener using TcpStream.
        if let Ok(client_stream) = TcpStream::connect(addr).await {
            let stream = SocketFlowStream::Plain(client_stream);

            // Only the handshake parser is under test here; any outcome other
            // than a panic is acceptable.
            let _ = accept_async(stream).await;
        }
    });
});

// Builds a WebSocket handshake request around an attacker-controlled
// Sec-WebSocket-Key, so the fuzzer can explore the header parser's behavior
// on malformed base64, truncated requests, and stray CRLFs.
fn build_fuzzed_handshake(data: &[u8]) -> String {
    let mut handshake = String::from(
        "GET / HTTP/1.1\r\n\
         Host: 127.0.0.1\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n",
    );

    let key = generate_fuzzed_key(data);
    handshake.push_str(&format!("Sec-WebSocket-Key: {}\r\n", key));
    handshake.push_str("Sec-WebSocket-Version: 13\r\n");

    if data.len() % 2 == 0 {
        handshake.push_str("Connection: Fuzzed-Value\r\n");
    }

    handshake.push_str("\r\n");
    handshake
}

fn generate_fuzzed_key(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}
