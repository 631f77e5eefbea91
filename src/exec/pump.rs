// src/exec/pump.rs

//! Background tasks moving bytes between child pipes.

use std::io::Write;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::output::StreamSink;
use crate::process::input::Feed;

const CHUNK_SIZE: usize = 8 * 1024;

/// Drain `reader` into `sink` until EOF.
///
/// When `relay` is set (pipeline stage with a downstream consumer), every
/// chunk is also written to the next stage's stdin, which is closed when the
/// stream ends. If the downstream stage stops reading, the pump stops too and
/// drops `reader`, so the upstream child sees a broken pipe on its next write.
pub(crate) fn spawn_pump<R>(
    mut reader: R,
    mut sink: StreamSink,
    mut relay: Option<ChildStdin>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "read from child stream failed; treating as EOF");
                    break;
                }
            };
            let chunk = &buf[..n];

            let _ = sink.write_all(chunk);

            let relayed = match relay.as_mut() {
                Some(stdin) => stdin.write_all(chunk).await,
                None => Ok(()),
            };
            if let Err(e) = relayed {
                debug!(error = %e, "downstream stage stopped reading; closing upstream stream");
                relay = None;
                break;
            }
        }

        drop(reader);
        sink.close();

        if let Some(mut stdin) = relay {
            let _ = stdin.shutdown().await;
        }
    })
}

/// Write `feed` into the child's stdin, then close it.
pub(crate) fn spawn_feeder(feed: Feed, mut stdin: ChildStdin) -> JoinHandle<()> {
    tokio::spawn(async move {
        let res = match feed {
            Feed::Bytes(bytes) => stdin.write_all(&bytes).await,
            Feed::Reader(mut reader) => tokio::io::copy(&mut reader, &mut stdin).await.map(|_| ()),
        };
        if let Err(e) = res {
            debug!(error = %e, "stdin feed ended early");
        }
        let _ = stdin.shutdown().await;
    })
}
