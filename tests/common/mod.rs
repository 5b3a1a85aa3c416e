#![allow(dead_code)]

pub use delegate_stage_test_utils::builders::{StageConfigBuilder, flags};
pub use delegate_stage_test_utils::fake_codec::{CodecCalls, CountingCodec};
pub use delegate_stage_test_utils::{drain_packets, init_tracing, with_timeout};

use delegate_stage::packet::Packet;
use delegate_stage::stage::StageContext;
use serde_json::Value;
use tokio::sync::mpsc;

/// A stage context wired to a fresh output channel.
pub fn context(name: &str) -> (StageContext, mpsc::Receiver<Packet>) {
    let (tx, rx) = mpsc::channel(64);
    (StageContext::new(name, tx), rx)
}

/// Build a packet from a JSON object literal.
pub fn event(value: Value) -> Packet {
    Packet::new(value.as_object().cloned().expect("event must be a JSON object"))
}
