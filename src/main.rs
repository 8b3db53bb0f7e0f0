//! A minimal demo client: connects to a WebSocket echo endpoint, sends a
//! greeting, and logs whatever comes back until the peer closes.

use std::env;
use std::io;
use ws_core::event::Hooks;
use ws_core::{Client, CloseCode};

#[tokio::main]
pub async fn main() -> io::Result<()> {
    env_logger::init();

    let url = env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9000".to_string());

    let mut hooks = Hooks::default();
    hooks.on_text = Some(Box::new(|text| println!("text: {text}")));
    hooks.on_binary = Some(Box::new(|data| println!("binary: {} bytes", data.len())));
    hooks.on_close = Some(Box::new(|code, reason| {
        println!(
            "closed: {:?} {}",
            code,
            String::from_utf8_lossy(reason)
        )
    }));

    let mut client = match Client::connect(&url, hooks).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("handshake with {url} failed: {err}");
            return Ok(());
        }
    };

    if let Err(err) = client.send_text("hello from ws-core").await {
        eprintln!("failed to send greeting: {err}");
    }

    if let Err(err) = client.run().await {
        eprintln!("connection ended with error: {err}");
    }

    let _ = client.close(CloseCode::NORMAL_CLOSURE, "bye").await;
    Ok(())
}
