// src/packet/mod.rs

//! The pipeline's uniform event type.
//!
//! A [`Packet`] is a mapping of unique field names to JSON values. The stage
//! receives packets by reference from the engine and hands freshly built
//! packets back through an `mpsc` channel.
//!
//! - [`interpolate`] resolves `${field}` references against a packet's fields.
//! - [`common`] holds the tag/field add-remove envelope applied to every
//!   packet a stage emits.

pub mod common;
pub mod interpolate;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use common::{COMMON_OPTION_KEYS, CommonOptions};
pub use interpolate::{interpolate, lookup, missing_references};

/// Field mapping carried by every packet.
pub type Fields = Map<String, Value>;

/// A single event flowing through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packet {
    fields: Fields,
}

impl Packet {
    pub fn new(fields: Fields) -> Self {
        Self { fields }
    }

    /// Convenience: a packet with a single `message` field.
    pub fn with_message(message: impl Into<String>) -> Self {
        let mut fields = Fields::new();
        fields.insert("message".to_string(), Value::String(message.into()));
        Self { fields }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// The `message` field, if present and a string.
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }
}

impl From<Fields> for Packet {
    fn from(fields: Fields) -> Self {
        Self::new(fields)
    }
}
