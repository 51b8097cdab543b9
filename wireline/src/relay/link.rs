use crate::common::sync::StopCanary;
use crate::config::SocketTuning;
use crate::network::tune_stream;
use crate::relay::{pump, ShutdownCoordinator};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;

/// Lifecycle phase of one relayed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LinkPhase {
    /// Upstream dial in progress.
    Connecting = 0,
    /// Both pumps active.
    Relaying = 1,
    /// One pump finished; the other is draining toward exit.
    Draining = 2,
    /// Both pumps exited and both endpoints closed. Terminal.
    Closed = 3,
}

impl LinkPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LinkPhase::Connecting,
            1 => LinkPhase::Relaying,
            2 => LinkPhase::Draining,
            _ => LinkPhase::Closed,
        }
    }
}

/// Shared, monotonically advancing view of a link's phase.
#[derive(Clone, Debug, Default)]
pub struct LinkStatus(Arc<AtomicU8>);

impl LinkStatus {
    pub fn phase(&self) -> LinkPhase {
        LinkPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Phases only move forward; a stale caller cannot regress the state.
    pub fn advance(&self, phase: LinkPhase) {
        self.0.fetch_max(phase as u8, Ordering::AcqRel);
    }
}

/// One relayed connection: exclusive owner of both endpoints from
/// establishment to teardown.
///
/// Ownership of the four split halves moves into the two pump tasks, so each
/// socket is closed exactly once, when its second half drops. `run` resolves
/// only after both pumps have observably stopped and both endpoints are
/// closed.
pub struct RelayLink {
    id: u64,
    downstream: TcpStream,
    upstream: TcpStream,
    tuning: SocketTuning,
    status: LinkStatus,
}

impl RelayLink {
    /// Takes ownership of a connected pair and applies the socket profile.
    /// Tuning failures are logged and the link proceeds untuned.
    pub fn establish(
        id: u64,
        downstream: TcpStream,
        upstream: TcpStream,
        tuning: SocketTuning,
        status: LinkStatus,
    ) -> Self {
        for (name, stream) in [("downstream", &downstream), ("upstream", &upstream)] {
            if let Err(err) = tune_stream(stream, tuning.buffer_size) {
                tracing::warn!("[Relay {}] tuning {} failed: {}", id, name, err);
            }
        }
        Self {
            id,
            downstream,
            upstream,
            tuning,
            status,
        }
    }

    /// Relay until either side closes or fails, then tear down both
    /// endpoints. Returns bytes copied (client-to-target, target-to-client).
    pub async fn run(self) -> (u64, u64) {
        let RelayLink {
            id,
            downstream,
            upstream,
            tuning,
            status,
        } = self;
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let (down_read, down_write) = downstream.into_split();
        let (up_read, up_write) = upstream.into_split();

        status.advance(LinkPhase::Relaying);
        tracing::debug!("[Relay {}] relaying", id);

        let uplink = tokio::spawn(Self::direction(
            "uplink",
            id,
            down_read,
            up_write,
            coordinator.clone(),
            coordinator.stop_flag(),
            tuning,
            status.clone(),
        ));
        let downlink = tokio::spawn(Self::direction(
            "downlink",
            id,
            up_read,
            down_write,
            coordinator.clone(),
            coordinator.stop_flag(),
            tuning,
            status.clone(),
        ));

        coordinator.join().await;
        // Both pumps have signalled; their halves are already dropped, so
        // both sockets are fully closed once the handles resolve.
        let up_bytes = uplink.await.unwrap_or(0);
        let down_bytes = downlink.await.unwrap_or(0);
        status.advance(LinkPhase::Closed);
        tracing::info!(
            "[Relay {}] closed: {} B up, {} B down",
            id,
            up_bytes,
            down_bytes
        );
        (up_bytes, down_bytes)
    }

    #[allow(clippy::too_many_arguments)]
    async fn direction<R, W>(
        tag: &'static str,
        id: u64,
        source: R,
        destination: W,
        coordinator: Arc<ShutdownCoordinator>,
        stop: StopCanary,
        tuning: SocketTuning,
        status: LinkStatus,
    ) -> u64
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let copied = pump(
            tag,
            source,
            destination,
            stop,
            tuning.buffer_size,
            tuning.idle_timeout,
        )
        .await;
        status.advance(LinkPhase::Draining);
        tracing::debug!("[Relay {}] {} done after {} B", id, tag, copied);
        coordinator.signal_done();
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TUNING: SocketTuning = SocketTuning {
        buffer_size: 8192,
        idle_timeout: Duration::from_secs(30),
    };

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accepted, connected) = tokio::join!(listener.accept(), connect);
        let (accepted, _) = accepted.unwrap();
        (accepted, connected.unwrap())
    }

    #[tokio::test]
    async fn test_half_close_delivers_all_bytes() {
        let (down_end, mut client) = tcp_pair().await;
        let (up_end, mut target) = tcp_pair().await;
        let status = LinkStatus::default();
        let link = RelayLink::establish(1, down_end, up_end, TUNING, status.clone());
        let handle = tokio::spawn(link.run());

        let payload = vec![0xA5u8; 10_000];
        client.write_all(&payload).await.unwrap();
        client.shutdown().await.unwrap();

        // the full payload arrives upstream, followed by the half-close
        let mut received = Vec::new();
        target.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);
        assert!(status.phase() >= LinkPhase::Relaying);

        drop(target);
        let (up_bytes, down_bytes) = handle.await.unwrap();
        assert_eq!(up_bytes, 10_000);
        assert_eq!(down_bytes, 0);
        assert_eq!(status.phase(), LinkPhase::Closed);

        // downstream is fully closed as well
        let mut tail = Vec::new();
        client.read_to_end(&mut tail).await.unwrap();
        assert!(tail.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_roundtrip_larger_than_buffer() {
        let (down_end, client) = tcp_pair().await;
        let (up_end, target) = tcp_pair().await;
        let link = RelayLink::establish(2, down_end, up_end, TUNING, LinkStatus::default());
        let handle = tokio::spawn(link.run());

        let up_payload: Vec<u8> = (0..64 * 1024 + 7).map(|_| fastrand::u8(..)).collect();
        let down_payload: Vec<u8> = (0..32 * 1024 + 3).map(|_| fastrand::u8(..)).collect();
        let up_len = up_payload.len() as u64;
        let down_len = down_payload.len() as u64;

        // drive all four stream halves concurrently so both directions carry
        // traffic while the link is fully open
        let (mut client_read, mut client_write) = client.into_split();
        let (mut target_read, mut target_write) = target.into_split();
        let up_expected = up_payload.clone();
        let down_expected = down_payload.clone();
        let t_cw = tokio::spawn(async move {
            client_write.write_all(&up_payload).await.unwrap();
            client_write
        });
        let t_tw = tokio::spawn(async move {
            target_write.write_all(&down_payload).await.unwrap();
            target_write
        });
        let t_cr = tokio::spawn(async move {
            let mut buf = vec![0u8; down_expected.len()];
            client_read.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, down_expected);
            client_read
        });
        let t_tr = tokio::spawn(async move {
            let mut buf = vec![0u8; up_expected.len()];
            target_read.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, up_expected);
            target_read
        });

        let client_write = t_cw.await.unwrap();
        let target_write = t_tw.await.unwrap();
        let client_read = t_cr.await.unwrap();
        let target_read = t_tr.await.unwrap();

        // both payloads delivered; now close both ends and tear down
        drop((client_read, client_write));
        drop((target_read, target_write));
        let (up_bytes, down_bytes) = handle.await.unwrap();
        assert_eq!(up_bytes, up_len);
        assert_eq!(down_bytes, down_len);
    }

    #[tokio::test]
    async fn test_upstream_reset_closes_downstream_promptly() {
        let (down_end, mut client) = tcp_pair().await;
        let (up_end, target) = tcp_pair().await;
        let status = LinkStatus::default();
        let link = RelayLink::establish(3, down_end, up_end, TUNING, status.clone());
        let handle = tokio::spawn(link.run());

        client.write_all(b"hello").await.unwrap();
        // abort the upstream with an RST rather than an orderly FIN
        target.set_linger(Some(Duration::ZERO)).unwrap();
        drop(target);

        // downstream observes closure well inside the idle window
        let mut buf = Vec::new();
        let outcome =
            tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut buf)).await;
        assert!(outcome.is_ok(), "downstream hung after upstream reset");

        drop(client);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.phase(), LinkPhase::Closed);
    }

    #[tokio::test]
    async fn test_simultaneous_close_stress() {
        for i in 0..50 {
            let (down_end, client) = tcp_pair().await;
            let (up_end, target) = tcp_pair().await;
            let status = LinkStatus::default();
            let link = RelayLink::establish(100 + i, down_end, up_end, TUNING, status.clone());
            let handle = tokio::spawn(link.run());
            // both endpoints vanish at once; teardown must still run exactly
            // once and resolve
            drop(client);
            drop(target);
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(status.phase(), LinkPhase::Closed);
        }
    }
}
