use crate::proxy::NetworkAddr;
use socket2::SockRef;
use std::io::Result;
use tokio::net::TcpStream;

/// Outbound side of the relay: dials the fixed upstream target.
pub struct Egress {
    target: NetworkAddr,
}

impl Egress {
    pub fn new(target: NetworkAddr) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &NetworkAddr {
        &self.target
    }

    /// Dial the upstream once. Failures are the caller's to report; there is
    /// no retry.
    pub async fn dial(&self) -> Result<TcpStream> {
        match &self.target {
            NetworkAddr::Raw(addr) => TcpStream::connect(*addr).await,
            NetworkAddr::DomainName { domain_name, port } => {
                TcpStream::connect((domain_name.as_str(), *port)).await
            }
        }
    }
}

/// Apply the low-latency profile to one endpoint: Nagle off, send/receive
/// buffers clamped to the relay's copy window.
pub fn tune_stream(stream: &TcpStream, buffer_size: usize) -> Result<()> {
    let socket = SockRef::from(stream);
    socket.set_nodelay(true)?;
    socket.set_recv_buffer_size(buffer_size)?;
    socket.set_send_buffer_size(buffer_size)?;
    Ok(())
}
