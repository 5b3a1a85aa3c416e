// src/exec/adapter.rs

use serde_json::Value;

use crate::packet::{Fields, Packet};

/// Turn one decoded record into a packet.
///
/// | record   | packet fields              |
/// |----------|----------------------------|
/// | string   | `message` = the string     |
/// | mapping  | the mapping itself         |
/// | sequence | `data` = the sequence      |
///
/// Any other shape is handed back as `Err` so the caller can log it.
pub fn packet_from_record(record: Value) -> Result<Packet, Value> {
    match record {
        Value::String(message) => Ok(Packet::with_message(message)),
        Value::Object(fields) => Ok(Packet::new(fields)),
        Value::Array(items) => {
            let mut fields = Fields::new();
            fields.insert("data".to_string(), Value::Array(items));
            Ok(Packet::new(fields))
        }
        other => Err(other),
    }
}
