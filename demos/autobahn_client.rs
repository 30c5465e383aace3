use futures::StreamExt;
use log::*;
use ws_core::config::{ClientConfig, WebSocketConfig};
use ws_core::error::Error;
use ws_core::handshake::connect_async_with_config;

const AGENT: &str = "ws-core";

fn get_config() -> ClientConfig {
    ClientConfig {
        web_socket_config: WebSocketConfig::default(),
        ca_file: None,
    }
}

async fn run_test(case: u32) -> Result<(), Error> {
    let config = get_config();

    info!("Running test case {}", case);
    let case_url = &format!("ws://127.0.0.1:9001/runCase?case={}&agent={}", case, AGENT);
    let connection = connect_async_with_config(case_url, config).await?;
    let (mut reader, mut writer) = connection.split();
    while let Some(msg) = reader.next().await {
        let msg = msg?;
        writer.send_message(msg).await?;
    }

    Ok(())
}

async fn update_reports() -> Result<(), Error> {
    let config = get_config();

    info!("updating reports");
    let connection = connect_async_with_config(
        &format!("ws://127.0.0.1:9001/updateReports?agent={}", AGENT),
        config,
    )
    .await?;
    let (_reader, mut writer) = connection.split();
    info!("closing connection");
    writer.close_connection().await?;
    Ok(())
}

async fn get_case_count() -> Result<u32, Error> {
    let config = get_config();

    let connection = connect_async_with_config("ws://localhost:9001/getCaseCount", config).await?;
    let (mut reader, mut writer) = connection.split();

    // Receive a single message
    let msg = reader.next().await.unwrap()?;
    writer.close_connection().await?;

    let text_message = msg.as_text()?;
    Ok(text_message
        .parse::<u32>()
        .expect("couldn't convert test case to number"))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let total = get_case_count().await.expect("Error getting case count");

    for case in 1..=total {
        if let Err(e) = run_test(case).await {
            error!("Testcase {} failed: {}", case, e)
        }
    }

    update_reports().await.expect("Error updating reports");
}
