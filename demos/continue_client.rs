use log::*;
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use ws_core::handshake::connect_async;

const FRAGMENT_SIZE: usize = 8;

async fn handle_connection(addr: &str) {
    match connect_async(addr).await {
        Ok(connection) => {
            let (_reader, mut writer) = connection.split();
            let my_random_string = generate_random_string();
            info!("Sending random string: {}", my_random_string);
            if writer
                .send_large_data_fragmented(Vec::from(my_random_string), FRAGMENT_SIZE)
                .await
                .is_err()
            {
                error!("Error occurred when sending data in chunks");
            }

            writer.close_connection().await.unwrap();
        }
        Err(err) => error!("Error when performing handshake: {}", err),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("ws://127.0.0.1:9002").await;
}

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
