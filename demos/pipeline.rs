//! Three-stage pipeline on the in-memory store
//!
//! Run with: cargo run --example pipeline [FRAMES]
//!
//! ```text
//!   ingress/synthetic ──► FrameStore ◄──► transform/marker
//!                             │
//!                             └──► egress/channel ──► printed here
//! ```
//!
//! The ingress writes FRAMES frames (default 20) into session "demo". The
//! transform appends `!` to each one. The egress forwards frames to this
//! process as it finds them; whether a frame shows up marked depends on
//! whether the transform got to it first.
//!
//! Set `RUST_LOG=relais=debug` for lifecycle detail.

use std::time::Duration;

use relais::{PluginConfig, PluginRole, Relay, RelayConfig};

const SESSION: &str = "demo";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let frames: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 20,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relais=info".parse()?)
                .add_directive("pipeline=info".parse()?),
        )
        .init();

    let relay = Relay::start(RelayConfig::default()).await?;
    let mut egress = relay
        .take_egress()
        .ok_or("egress receiver already taken")?;

    relay
        .start_plugin(
            PluginRole::Transform,
            "marker",
            PluginConfig::new()
                .set("marker", b'!')
                .set("session_id", SESSION)
                .set("poll_interval_ms", 20),
        )
        .await?;
    relay
        .start_plugin(
            PluginRole::Egress,
            "channel",
            PluginConfig::new()
                .set("session_id", SESSION)
                .set("poll_interval_ms", 20),
        )
        .await?;
    relay
        .start_plugin(
            PluginRole::Ingress,
            "synthetic",
            PluginConfig::new()
                .set("device_id", "cam0")
                .set("session_id", SESSION)
                .set("fps", 50)
                .set("frame_count", frames)
                .set("codec", "h264"),
        )
        .await?;

    let mut received = 0;
    while received < frames {
        match tokio::time::timeout(Duration::from_secs(5), egress.recv()).await {
            Ok(Some(frame)) => {
                received += 1;
                println!(
                    "frame {:>3}  {:>2} bytes  key={}  payload={:?}",
                    frame.index,
                    frame.size(),
                    frame.key_frame,
                    String::from_utf8_lossy(&frame.data),
                );
            }
            Ok(None) => break,
            Err(_) => {
                eprintln!("timed out waiting for frames");
                break;
            }
        }
    }

    for (name, status) in relay.plugins().statuses() {
        println!(
            "{:<10} running={} started={} error={:?}",
            name, status.running, status.start_time, status.last_error
        );
    }

    relay.shutdown().await?;
    Ok(())
}
