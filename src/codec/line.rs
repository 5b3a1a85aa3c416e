// src/codec/line.rs

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{BoxFuture, BoxReader, Codec, Decoder, DynWriter, Encoder};
use crate::errors::{Result, StageError};
use crate::packet::{Fields, interpolate, missing_references};

pub const DEFAULT_LINE_FORMAT: &str = "${message}";

/// Plain text lines.
///
/// The encoder renders `format` against the record's fields; the stage adds
/// the newline. The decoder yields each line as a string.
#[derive(Debug, Clone)]
pub struct LineCodec {
    format: String,
}

impl LineCodec {
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::with_format(DEFAULT_LINE_FORMAT)
    }
}

impl Codec for LineCodec {
    fn name(&self) -> &str {
        "line"
    }

    fn new_encoder<'w>(&self, writer: DynWriter<'w>) -> Box<dyn Encoder + 'w> {
        Box::new(LineEncoder {
            writer,
            format: self.format.clone(),
        })
    }

    fn new_decoder(&self, reader: BoxReader) -> Box<dyn Decoder> {
        Box::new(LineDecoder {
            reader: BufReader::new(reader),
            line: String::new(),
        })
    }
}

pub struct LineEncoder<'w> {
    writer: DynWriter<'w>,
    format: String,
}

impl Encoder for LineEncoder<'_> {
    fn encode<'a>(&'a mut self, fields: &'a Fields) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let missing = missing_references(&self.format, fields);
            if !missing.is_empty() {
                return Err(StageError::Encode(format!(
                    "line format '{}' references missing field(s): {}",
                    self.format,
                    missing.join(", ")
                )));
            }
            let rendered = interpolate(&self.format, fields);
            self.writer.write_all(rendered.as_bytes()).await?;
            Ok(())
        })
    }
}

pub struct LineDecoder {
    reader: BufReader<BoxReader>,
    line: String,
}

impl LineDecoder {
    async fn next_line(&mut self) -> Result<Option<Value>> {
        self.line.clear();
        let n = self
            .reader
            .read_line(&mut self.line)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => StageError::Decode(e.to_string()),
                _ => StageError::IoError(e),
            })?;
        if n == 0 {
            return Ok(None);
        }

        let line = self.line.trim_end_matches(['\n', '\r']);
        Ok(Some(Value::String(line.to_string())))
    }
}

impl Decoder for LineDecoder {
    fn decode(&mut self) -> BoxFuture<'_, Result<Option<Value>>> {
        Box::pin(self.next_line())
    }
}
