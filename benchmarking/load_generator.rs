//! Drives many concurrent client connections against a local echo server
//! and reports average ping round-trip latency. Manual use only -- not
//! part of `cargo test` (spec §10.4).

use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use ws_core::config::ClientConfig;
use ws_core::frame::Frame;
use ws_core::handshake::{build_request, read_response, HandshakeTarget};
use ws_core::mask::generate_sec_key;
use ws_core::reader::FrameReader;
use ws_core::stream::Stream;
use ws_core::transport::Transport;
use ws_core::writer::FrameWriter;

const URL: &str = "ws://127.0.0.1:9000";
const CONNECTION_COUNT: usize = 100;
const MESSAGE_COUNT: usize = 1000;
const MESSAGE_SIZE: usize = 16384;

#[tokio::main]
async fn main() {
    env_logger::init();

    let (tx, mut rx) = mpsc::unbounded_channel();

    for _ in 0..CONNECTION_COUNT {
        let tx = tx.clone();
        tokio::spawn(async move {
            let duration = run_one_connection().await.expect("benchmark connection failed");
            let _ = tx.send(duration);
        });
    }
    drop(tx);

    let mut total_duration = Duration::new(0, 0);
    let mut completed = 0usize;
    while let Some(duration) = rx.recv().await {
        total_duration += duration;
        completed += 1;
    }

    if completed == 0 {
        println!("no connections completed");
        return;
    }
    println!(
        "{completed} connections, average ping latency: {:?}",
        total_duration / completed as u32
    );
}

/// Connects, then sends `MESSAGE_COUNT` pings sequentially, awaiting each
/// pong before sending the next -- the same one-in-flight-at-a-time shape
/// as the original generator, just over the masked Ping/Pong frames this
/// crate actually emits instead of raw payload round-trips.
async fn run_one_connection() -> Result<Duration, ws_core::Error> {
    let target = HandshakeTarget::parse(URL)?;
    let sec_key = generate_sec_key();

    let mut transport = if target.use_tls {
        Transport::connect_tls(&target.host, target.port).await?
    } else {
        Transport::connect_plain(&target.host, target.port).await?
    };

    let request = build_request(&target, &sec_key);
    transport.write_all(request.as_bytes()).await?;
    let config = ClientConfig::default();
    read_response(&mut transport, &sec_key, config.handshake_timeout).await?;

    let mut stream = Stream::new(transport);
    let mut reader = FrameReader::new(config.max_message_size);
    let payload = vec![b'a'; MESSAGE_SIZE];

    let start = Instant::now();
    for _ in 0..MESSAGE_COUNT {
        FrameWriter::new(&mut stream, &config)
            .send_frame(Frame::ping(payload.clone()), true)
            .await?;

        loop {
            let mut got_pong = false;
            stream.feed_bytes(&[], &mut reader, |_frame| got_pong = true)?;
            if got_pong {
                break;
            }
            stream.read_more().await?;
        }
    }

    Ok(start.elapsed() / MESSAGE_COUNT as u32)
}
