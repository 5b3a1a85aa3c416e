pub mod builders;
pub mod fake_codec;

use std::sync::Once;
use std::time::Duration;

use delegate_stage::packet::Packet;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Receive every packet until all senders are gone (bounded by 5 seconds).
pub async fn drain_packets(rx: &mut mpsc::Receiver<Packet>) -> Vec<Packet> {
    with_timeout(async {
        let mut packets = Vec::new();
        while let Some(p) = rx.recv().await {
            packets.push(p);
        }
        packets
    })
    .await
}
