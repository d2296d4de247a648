use super::connect::Connection;
use std::fmt;
use std::io::{self, ErrorKind};
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Fixed response buffer capacity. Typical `stats` output is around 2 KiB;
/// anything larger is truncated rather than rejected.
pub const BUFFER_SIZE: usize = 4096;

pub const STATS_REQUEST: &[u8] = b"stats\r\n";

/// Non-fatal conditions encountered while reading a response. The cycle
/// proceeds to parsing with whatever data was collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The buffer filled before the terminator line was seen.
    Truncated,
    /// The deadline expired after some data had already been read.
    ReadTimeout,
}

/// The raw bytes of one `stats` response. Belongs to exactly one poll
/// cycle and is discarded after parsing.
pub struct RawResponse {
    data: Vec<u8>,
    warnings: Vec<Warning>,
}

impl RawResponse {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

#[derive(Debug)]
pub enum QueryError {
    /// The request could not be written in one non-blocking send.
    SendIncomplete,
    /// Waiting for socket readiness failed.
    WaitFailed(io::Error),
    /// No data arrived before the deadline.
    ResponseTimeout,
    /// Reading from the socket failed.
    Recv(io::Error),
    /// The peer closed the connection before sending anything.
    PeerClosedEarly,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendIncomplete => write!(f, "could not send stats command"),
            Self::WaitFailed(e) => write!(f, "wait for response failed: {e}"),
            Self::ResponseTimeout => write!(f, "timed out waiting for response"),
            Self::Recv(e) => write!(f, "error reading from socket: {e}"),
            Self::PeerClosedEarly => write!(f, "peer unexpectedly shut down the socket"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Sends `stats\r\n` and collects the response. The whole read phase
/// shares one deadline, normally the collection interval, so a cycle can
/// never outlast its scheduling slot.
pub async fn query(
    connection: &mut Connection,
    deadline: Duration,
) -> Result<RawResponse, QueryError> {
    // single short write; a partial send is a protocol failure, not
    // something to retry
    loop {
        connection.writable().await.map_err(QueryError::WaitFailed)?;

        match connection.try_write(STATS_REQUEST) {
            Ok(n) if n == STATS_REQUEST.len() => break,
            Ok(_) => return Err(QueryError::SendIncomplete),
            Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(_) => return Err(QueryError::SendIncomplete),
        }
    }

    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut fill = 0;
    let mut warnings = Vec::new();
    let start = Instant::now();

    loop {
        let remaining = match deadline.checked_sub(start.elapsed()) {
            Some(d) if !d.is_zero() => d,
            _ => {
                if fill == 0 {
                    return Err(QueryError::ResponseTimeout);
                }
                warnings.push(Warning::ReadTimeout);
                break;
            }
        };

        match timeout(remaining, connection.read(&mut buf[fill..])).await {
            Ok(Ok(0)) => {
                if fill == 0 {
                    return Err(QueryError::PeerClosedEarly);
                }
                // peer closed after partial data; parse what we have
                break;
            }
            Ok(Ok(n)) => {
                fill += n;

                // no length prefix, so check for the terminator after
                // every read
                if is_complete(&buf[..fill]) {
                    break;
                }

                if fill == BUFFER_SIZE {
                    warnings.push(Warning::Truncated);
                    break;
                }
            }
            Ok(Err(e)) => return Err(QueryError::Recv(e)),
            Err(_) => {
                if fill == 0 {
                    return Err(QueryError::ResponseTimeout);
                }
                warnings.push(Warning::ReadTimeout);
                break;
            }
        }
    }

    buf.truncate(fill);

    Ok(RawResponse {
        data: buf,
        warnings,
    })
}

/// A response is complete once its last line, ignoring trailing CR/LF, is
/// the terminator `END`.
fn is_complete(data: &[u8]) -> bool {
    let mut end = data.len();
    while end > 0 && (data[end - 1] == b'\r' || data[end - 1] == b'\n') {
        end -= 1;
    }

    let data = &data[..end];

    data.ends_with(b"END") && (end == 3 || matches!(data[end - 4], b'\r' | b'\n'))
}
