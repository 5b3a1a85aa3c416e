// src/codec/mod.rs

//! Record codecs used on the delegate's pipes.
//!
//! A [`Codec`] is a factory: it wraps the delegate's stdin in an [`Encoder`]
//! and its stdout in a [`Decoder`]. Framing is the codec's business:
//!
//! - [`json`]: consecutive JSON values separated by any whitespace.
//! - [`line`]: one record per newline-terminated line.
//!
//! Codecs are looked up by name with [`from_name`]. Unknown names resolve to
//! `None`, which the stage treats as "this direction is unused".

pub mod json;
pub mod line;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::errors::Result;
use crate::packet::Fields;

pub use json::JsonCodec;
pub use line::LineCodec;

/// Boxed future returned by the codec traits so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Owned byte source handed to a decoder (usually a child's stdout).
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Borrowed byte sink handed to an encoder (usually a child's stdin).
pub type DynWriter<'w> = &'w mut (dyn AsyncWrite + Send + Unpin);

pub trait Codec: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn new_encoder<'w>(&self, writer: DynWriter<'w>) -> Box<dyn Encoder + 'w>;

    fn new_decoder(&self, reader: BoxReader) -> Box<dyn Decoder>;
}

pub trait Encoder: Send {
    /// Serialize one record onto the underlying writer.
    fn encode<'a>(&'a mut self, fields: &'a Fields) -> BoxFuture<'a, Result<()>>;
}

pub trait Decoder: Send {
    /// Decode the next record.
    ///
    /// `Ok(None)` signals a clean end of stream.
    fn decode(&mut self) -> BoxFuture<'_, Result<Option<Value>>>;
}

/// Resolve a codec by its configured name (`"json"`, `"line"`).
pub fn from_name(name: &str) -> Option<Arc<dyn Codec>> {
    match name.trim().to_lowercase().as_str() {
        "json" => Some(Arc::new(JsonCodec)),
        "line" => Some(Arc::new(LineCodec::default())),
        _ => None,
    }
}
