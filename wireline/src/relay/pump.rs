use crate::common::sync::StopCanary;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Copy bytes from `source` to `destination` until EOF, an I/O failure, an
/// idle-read window with no data, or the shared stop flag trips.
///
/// Every non-empty read is flushed in full before the next read. Errors never
/// escape: they end this direction only and are reported through logs. On
/// exit the destination's write side is shut down so the peer observes
/// half-close. Returns the number of bytes copied.
pub async fn pump<R, W>(
    tag: &str,
    mut source: R,
    mut destination: W,
    stop: StopCanary,
    buffer_size: usize,
    idle_timeout: Duration,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(buffer_size);
    let mut copied: u64 = 0;
    while stop.running() {
        match tokio::time::timeout(idle_timeout, source.read_buf(&mut buf)).await {
            Ok(Ok(0)) => {
                // CLOSE_WAIT
                break;
            }
            Ok(Ok(size)) => {
                if let Err(err) = destination.write_all(&buf).await {
                    tracing::warn!("[{}] write to destination failed: {}", tag, err);
                    break;
                }
                copied += size as u64;
                buf.clear();
            }
            Ok(Err(err)) => {
                tracing::warn!("[{}] read from source failed: {}", tag, err);
                break;
            }
            Err(_) => {
                tracing::warn!(
                    "[{}] no data for {}s, dropping direction",
                    tag,
                    idle_timeout.as_secs()
                );
                break;
            }
        }
    }
    let _ = destination.shutdown().await;
    copied
}
