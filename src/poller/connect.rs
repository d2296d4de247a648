use crate::config::Instance;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream, UnixStream};
use tokio::time::timeout;

/// An open transport to one daemon. Scoped to a single poll cycle; tokio
/// shuts the socket down when it is dropped.
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Connection {
    pub async fn writable(&self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.writable().await,
            Self::Unix(s) => s.writable().await,
        }
    }

    pub fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.try_write(buf),
            Self::Unix(s) => s.try_write(buf),
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf).await,
            Self::Unix(s) => s.read(buf).await,
        }
    }
}

#[derive(Debug)]
pub enum ConnectError {
    /// The daemon's UNIX socket could not be opened or connected.
    Socket(io::Error),
    /// host:port did not resolve to any usable address.
    Resolution(String),
    /// No resolved candidate accepted a connection.
    NoRoute,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(e) => write!(f, "unix socket: {e}"),
            Self::Resolution(e) => write!(f, "resolution failed: {e}"),
            Self::NoRoute => write!(f, "could not connect to daemon"),
        }
    }
}

impl std::error::Error for ConnectError {}

/// Opens a transport to the instance's daemon. The socket path, when
/// configured, takes precedence over host/port. Resolution happens fresh
/// every cycle; the daemon or DNS may have moved since the last one.
pub async fn connect(
    instance: &Instance,
    connect_timeout: Duration,
) -> Result<Connection, ConnectError> {
    if let Some(path) = instance.socket() {
        return match timeout(connect_timeout, UnixStream::connect(path)).await {
            Ok(Ok(s)) => Ok(Connection::Unix(s)),
            Ok(Err(e)) => Err(ConnectError::Socket(e)),
            Err(_) => Err(ConnectError::Socket(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timed out",
            ))),
        };
    }

    // address family restricted to IPv4
    let candidates: Vec<SocketAddr> = match lookup_host(instance.address()).await {
        Ok(addrs) => addrs.filter(|a| a.is_ipv4()).collect(),
        Err(e) => return Err(ConnectError::Resolution(e.to_string())),
    };

    if candidates.is_empty() {
        return Err(ConnectError::Resolution(format!(
            "no IPv4 addresses for {}",
            instance.address()
        )));
    }

    // try candidates in resolver order; first successful connect wins
    for addr in candidates {
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(s)) => return Ok(Connection::Tcp(s)),
            Ok(Err(_)) | Err(_) => continue,
        }
    }

    Err(ConnectError::NoRoute)
}
