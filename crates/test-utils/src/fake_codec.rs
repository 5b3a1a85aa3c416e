use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use delegate_stage::codec::{
    BoxFuture, BoxReader, Codec, Decoder, DynWriter, Encoder, JsonCodec,
};
use delegate_stage::errors::Result;
use delegate_stage::packet::Fields;
use serde_json::Value;

/// Counters shared between a [`CountingCodec`] and the test.
#[derive(Debug, Default)]
pub struct CodecCalls {
    pub decoders: AtomicUsize,
    pub decodes: AtomicUsize,
    pub encodes: AtomicUsize,
}

impl CodecCalls {
    pub fn decoders(&self) -> usize {
        self.decoders.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

/// A JSON codec that records how often it is used.
#[derive(Debug, Default)]
pub struct CountingCodec {
    calls: Arc<CodecCalls>,
}

impl CountingCodec {
    pub fn new() -> (Arc<Self>, Arc<CodecCalls>) {
        let calls = Arc::new(CodecCalls::default());
        let codec = Arc::new(Self {
            calls: Arc::clone(&calls),
        });
        (codec, calls)
    }
}

impl Codec for CountingCodec {
    fn name(&self) -> &str {
        "counting-json"
    }

    fn new_encoder<'w>(&self, writer: DynWriter<'w>) -> Box<dyn Encoder + 'w> {
        Box::new(CountingEncoder {
            inner: JsonCodec.new_encoder(writer),
            calls: Arc::clone(&self.calls),
        })
    }

    fn new_decoder(&self, reader: BoxReader) -> Box<dyn Decoder> {
        self.calls.decoders.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingDecoder {
            inner: JsonCodec.new_decoder(reader),
            calls: Arc::clone(&self.calls),
        })
    }
}

struct CountingEncoder<'w> {
    inner: Box<dyn Encoder + 'w>,
    calls: Arc<CodecCalls>,
}

impl Encoder for CountingEncoder<'_> {
    fn encode<'a>(&'a mut self, fields: &'a Fields) -> BoxFuture<'a, Result<()>> {
        self.calls.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(fields)
    }
}

struct CountingDecoder {
    inner: Box<dyn Decoder>,
    calls: Arc<CodecCalls>,
}

impl Decoder for CountingDecoder {
    fn decode(&mut self) -> BoxFuture<'_, Result<Option<Value>>> {
        self.calls.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode()
    }
}
