// src/codec/json.rs

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{BoxFuture, BoxReader, Codec, Decoder, DynWriter, Encoder};
use crate::errors::{Result, StageError};
use crate::packet::Fields;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn new_encoder<'w>(&self, writer: DynWriter<'w>) -> Box<dyn Encoder + 'w> {
        Box::new(JsonEncoder { writer })
    }

    fn new_decoder(&self, reader: BoxReader) -> Box<dyn Decoder> {
        Box::new(JsonDecoder::new(reader))
    }
}

/// Writes each record as compact JSON, without a terminator.
pub struct JsonEncoder<'w> {
    writer: DynWriter<'w>,
}

impl Encoder for JsonEncoder<'_> {
    fn encode<'a>(&'a mut self, fields: &'a Fields) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let bytes = serde_json::to_vec(fields).map_err(|e| StageError::Encode(e.to_string()))?;
            self.writer.write_all(&bytes).await?;
            Ok(())
        })
    }
}

/// Incremental decoder for a stream of whitespace-separated JSON values.
///
/// Incoming bytes are scanned once to find where the next value ends; only
/// that complete slice is handed to `serde_json`. A value still incomplete
/// when the stream ends is a decode error.
pub struct JsonDecoder {
    reader: BoxReader,
    buf: Vec<u8>,
    scan: Scan,
    eof: bool,
}

/// Progress through the value at the front of the buffer.
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonDecoder {
    pub fn new(reader: BoxReader) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            scan: Scan::default(),
            eof: false,
        }
    }

    async fn next_value(&mut self) -> Result<Option<Value>> {
        loop {
            if self.scan.pos == 0 {
                let leading = self
                    .buf
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(self.buf.len());
                self.buf.drain(..leading);
            }

            if !self.buf.is_empty() {
                if let Some(end) = self.value_end() {
                    return self.take_value(end).map(Some);
                }
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(StageError::Decode(format!(
                    "stream ended inside a JSON value ({} trailing bytes)",
                    self.buf.len()
                )));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// Continue scanning from where the last call stopped; the exclusive end
    /// of the front value once it is complete.
    fn value_end(&mut self) -> Option<usize> {
        match self.buf[0] {
            b'{' | b'[' | b'"' => self.scan_structured(),
            _ => self.scan_scalar(),
        }
    }

    fn scan_structured(&mut self) -> Option<usize> {
        let scan = &mut self.scan;
        for (i, &b) in self.buf.iter().enumerate().skip(scan.pos) {
            if scan.in_string {
                if scan.escaped {
                    scan.escaped = false;
                } else if b == b'\\' {
                    scan.escaped = true;
                } else if b == b'"' {
                    scan.in_string = false;
                    if scan.depth == 0 {
                        return Some(i + 1);
                    }
                }
                continue;
            }
            match b {
                b'"' => scan.in_string = true,
                b'{' | b'[' => scan.depth += 1,
                b'}' | b']' => {
                    scan.depth = scan.depth.saturating_sub(1);
                    if scan.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        scan.pos = self.buf.len();
        None
    }

    /// Numbers and literals end at whitespace, a structural byte, or the end
    /// of the stream.
    fn scan_scalar(&mut self) -> Option<usize> {
        let end = self.buf[self.scan.pos..]
            .iter()
            .position(|b| b.is_ascii_whitespace() || b"{}[],\"".contains(b))
            .map(|offset| self.scan.pos + offset);
        match end {
            Some(end) => Some(end),
            None if self.eof => Some(self.buf.len()),
            None => {
                self.scan.pos = self.buf.len();
                None
            }
        }
    }

    fn take_value(&mut self, end: usize) -> Result<Value> {
        self.scan = Scan::default();
        let parsed = serde_json::from_slice::<Value>(&self.buf[..end]);
        self.buf.drain(..end);
        parsed.map_err(|e| StageError::Decode(e.to_string()))
    }
}

impl Decoder for JsonDecoder {
    fn decode(&mut self) -> BoxFuture<'_, Result<Option<Value>>> {
        Box::pin(self.next_value())
    }
}
