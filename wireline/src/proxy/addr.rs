use std::fmt::{Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

/// Domain name with port or pure socket address.
///
/// Domain names are resolved at dial time, once per connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkAddr {
    Raw(SocketAddr),
    DomainName { domain_name: String, port: u16 },
}

impl NetworkAddr {
    pub fn port(&self) -> u16 {
        match self {
            NetworkAddr::Raw(addr) => addr.port(),
            NetworkAddr::DomainName { port, .. } => *port,
        }
    }
}

impl Display for NetworkAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkAddr::Raw(addr) => write!(f, "{}", addr),
            NetworkAddr::DomainName { domain_name, port } => {
                write!(f, "{}:{}", domain_name, port)
            }
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("expected <host>:<port>, got {0:?}")]
pub struct AddrParseError(String);

impl FromStr for NetworkAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Covers bracketed IPv6 literals as well.
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(NetworkAddr::Raw(addr));
        }
        let (left, right) = s.rsplit_once(':').ok_or_else(|| AddrParseError(s.into()))?;
        let port = right
            .parse::<u16>()
            .map_err(|_| AddrParseError(s.into()))?;
        if left.is_empty() || left.parse::<IpAddr>().is_ok() {
            // a bare IP without brackets that SocketAddr refused
            return Err(AddrParseError(s.into()));
        }
        Ok(NetworkAddr::DomainName {
            domain_name: left.to_string(),
            port,
        })
    }
}
