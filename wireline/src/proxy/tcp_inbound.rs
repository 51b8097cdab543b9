use crate::config::{RelayConfig, SocketTuning};
use crate::network::Egress;
use crate::proxy::RelayError;
use crate::relay::{LinkPhase, LinkStatus, RelayLink};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// Accepts downstream connections and pairs each with a fresh upstream dial.
pub struct TcpInbound {
    listener: TcpListener,
    egress: Arc<Egress>,
    tuning: SocketTuning,
    conn_permits: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl TcpInbound {
    pub async fn bind(config: &RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| RelayError::Bind(config.listen, e))?;
        Ok(Self {
            listener,
            egress: Arc::new(Egress::new(config.target.clone())),
            tuning: config.tuning,
            conn_permits: Arc::new(Semaphore::new(config.max_connections)),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) {
        match self.local_addr() {
            Ok(addr) => tracing::info!(
                "[Inbound] listening on {}, relaying to {}",
                addr,
                self.egress.target()
            ),
            Err(_) => tracing::info!("[Inbound] relaying to {}", self.egress.target()),
        }
        loop {
            // At the connection cap, stop accepting until a link closes.
            let Ok(permit) = self.conn_permits.clone().acquire_owned().await else {
                return;
            };
            match self.listener.accept().await {
                Ok((stream, src_addr)) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let egress = self.egress.clone();
                    let tuning = self.tuning;
                    let status = LinkStatus::default();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(err) =
                            Self::serve_connection(id, stream, src_addr, egress, tuning, status)
                                .await
                        {
                            tracing::warn!("[Relay {}] {}", id, err);
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!("[Inbound] accept failed: {}", err);
                }
            }
        }
    }

    /// Per-connection entry point. Only dial failures surface; everything
    /// after RELAYING begins is terminal-but-local to the link.
    async fn serve_connection(
        id: u64,
        downstream: TcpStream,
        src_addr: SocketAddr,
        egress: Arc<Egress>,
        tuning: SocketTuning,
        status: LinkStatus,
    ) -> Result<(), RelayError> {
        tracing::debug!("[Relay {}] accepted {}", id, src_addr);
        let upstream = match egress.dial().await {
            Ok(stream) => stream,
            Err(err) => {
                // the accepted socket is dropped here without ever being read
                status.advance(LinkPhase::Closed);
                return Err(RelayError::Dial(egress.target().clone(), err));
            }
        };
        RelayLink::establish(id, downstream, upstream, tuning, status)
            .run()
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::NetworkAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_config(listen: SocketAddr, target: NetworkAddr) -> RelayConfig {
        RelayConfig {
            listen,
            target,
            tuning: SocketTuning {
                buffer_size: 8192,
                idle_timeout: Duration::from_secs(30),
            },
            max_connections: 16,
        }
    }

    async fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let (mut read, mut write) = stream.split();
                    let _ = tokio::io::copy(&mut read, &mut write).await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_end_to_end_echo_through_relay() {
        let echo_addr = spawn_echo_server().await;
        let config = test_config(
            "127.0.0.1:0".parse().unwrap(),
            NetworkAddr::Raw(echo_addr),
        );
        let inbound = TcpInbound::bind(&config).await.unwrap();
        let relay_addr = inbound.local_addr().unwrap();
        tokio::spawn(inbound.run());

        // two clients at once, payload larger than the copy buffer
        let mut tasks = Vec::new();
        for seed in 0..2u8 {
            tasks.push(tokio::spawn(async move {
                let mut client = TcpStream::connect(relay_addr).await.unwrap();
                let payload: Vec<u8> =
                    (0..40_000).map(|i| (i as u8).wrapping_add(seed)).collect();
                client.write_all(&payload).await.unwrap();

                let mut echoed = vec![0u8; payload.len()];
                client.read_exact(&mut echoed).await.unwrap();
                assert_eq!(echoed, payload);
            }));
        }
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(10), task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_dial_failure_closes_downstream() {
        // a port with nothing behind it
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accepted, connected) = tokio::join!(listener.accept(), connect);
        let (downstream, src_addr) = accepted.unwrap();
        let mut client = connected.unwrap();

        let status = LinkStatus::default();
        let egress = Arc::new(Egress::new(NetworkAddr::Raw(dead_addr)));
        let result = TcpInbound::serve_connection(
            0,
            downstream,
            src_addr,
            egress,
            SocketTuning {
                buffer_size: 8192,
                idle_timeout: Duration::from_secs(30),
            },
            status.clone(),
        )
        .await;

        assert!(matches!(result, Err(RelayError::Dial(_, _))));
        assert_eq!(status.phase(), LinkPhase::Closed);
        // downstream was dropped unread; the client sees EOF
        let mut buf = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
