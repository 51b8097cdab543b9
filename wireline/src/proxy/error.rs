use crate::proxy::NetworkAddr;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("Failed to dial {0}: {1}")]
    Dial(NetworkAddr, #[source] std::io::Error),
}
