// src/exec/output.rs

//! Background readers attached to a delegate's stdout and stderr.

use std::io::ErrorKind;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::codec::Decoder;
use crate::errors::Result;
use crate::exec::adapter::packet_from_record;
use crate::packet::CommonOptions;
use crate::stage::StageContext;

/// Drain stderr into the stage's log, one record per line.
///
/// Exactly one of these runs per delegate process. It keeps reading until
/// end of stream; invalid UTF-8 is logged lossily.
pub fn spawn_stderr_drain(stderr: ChildStderr, stage: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    warn!(stage = %stage, "stderr: {}", line.trim_end_matches(['\r', '\n']));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(stage = %stage, error = %e, "reading delegate stderr failed");
                    break;
                }
            }
        }
        debug!(stage = %stage, "stderr drain ended");
    })
}

/// Run [`read_and_send`] on its own task.
///
/// The task resolves to the number of packets forwarded, or the decode error
/// that ended it (already logged).
pub fn spawn_output_reader(
    mut decoder: Box<dyn Decoder>,
    ctx: StageContext,
    common: CommonOptions,
) -> JoinHandle<Result<usize>> {
    tokio::spawn(async move { read_and_send(decoder.as_mut(), &ctx, &common).await })
}

/// Decode records until end of stream and forward them as packets.
///
/// - clean end of stream: `Ok(count)`;
/// - decode error: logged, returned, nothing more is read;
/// - unrecognized record shape: logged and skipped;
/// - receiver gone: stops quietly.
pub async fn read_and_send(
    decoder: &mut dyn Decoder,
    ctx: &StageContext,
    common: &CommonOptions,
) -> Result<usize> {
    let mut forwarded = 0usize;

    loop {
        let record = match decoder.decode().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(stage = %ctx.name, forwarded, "delegate output reached end of stream");
                break;
            }
            Err(e) => {
                error!(
                    stage = %ctx.name,
                    error = %e,
                    "decoding delegate output failed; no further output will be read"
                );
                return Err(e);
            }
        };

        let mut packet = match packet_from_record(record) {
            Ok(packet) => packet,
            Err(other) => {
                error!(stage = %ctx.name, record = %other, "unrecognized record structure; skipping");
                continue;
            }
        };

        common.apply(packet.fields_mut());

        if !ctx.send(packet).await {
            debug!(stage = %ctx.name, "downstream receiver closed; output reader stopping");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, JsonCodec};
    use serde_json::json;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    fn decoder(input: &str) -> Box<dyn Decoder> {
        JsonCodec.new_decoder(Box::new(Cursor::new(input.as_bytes().to_vec())))
    }

    #[tokio::test]
    async fn forwards_records_and_skips_unrecognized_shapes() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = StageContext::new("t", tx);
        let common = CommonOptions {
            add_tag: vec!["delegated".to_string()],
            ..Default::default()
        };

        let mut dec = decoder("{\"a\":1}\n42\n\"hi\"\n[1,2]\n");
        let forwarded = read_and_send(dec.as_mut(), &ctx, &common).await.unwrap();
        assert_eq!(forwarded, 3);
        drop(ctx);

        let mut got = Vec::new();
        while let Some(p) = rx.recv().await {
            got.push(p);
        }
        assert_eq!(got[0].get("a"), Some(&json!(1)));
        assert_eq!(got[1].message(), Some("hi"));
        assert_eq!(got[2].get("data"), Some(&json!([1, 2])));
        assert!(got.iter().all(|p| p.get("tags") == Some(&json!(["delegated"]))));
    }

    #[tokio::test]
    async fn decode_error_ends_the_loop() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = StageContext::new("t", tx);

        let mut dec = decoder("{\"ok\":true}\n{oops}\n{\"never\":1}\n");
        let result = read_and_send(dec.as_mut(), &ctx, &CommonOptions::default()).await;
        assert!(result.is_err());
        drop(ctx);

        assert_eq!(rx.recv().await.unwrap().get("ok"), Some(&json!(true)));
        assert!(rx.recv().await.is_none());
    }
}
