//! Login probes: one attempt against one target, classified into an
//! [`Outcome`].
//!
//! Probes never return `Err` and never panic on network trouble. Timeouts,
//! refusals and resets become `Failure(Network)`; an explicit rejection from
//! the service becomes `Failure(Rejected)` or `Failure(InvalidCredential)`;
//! anything the probe cannot make sense of is a `ProbeError`.
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::api::StructuredApiProbe;
use crate::credential::{Credential, Target};
use crate::handshake::{HandshakeProbe, HandshakeSettings};

/// Why an attempt did not log in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("network")]
    Network(io::ErrorKind),
    #[error("no banner")]
    NoBanner,
    #[error("rejected")]
    Rejected,
    #[error("invalid credential")]
    InvalidCredential,
}

/// Result of a single login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureReason),
    ProbeError(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure(reason) => write!(f, "failure ({reason})"),
            Outcome::ProbeError(detail) => write!(f, "probe error ({detail})"),
        }
    }
}

/// One login procedure. Each call opens and closes its own connection.
pub trait LoginProbe: Send + Sync {
    /// Protocol name written to the audit log.
    fn name(&self) -> &'static str;

    fn attempt(&self, target: &Target, credential: &Credential, timeout: Duration) -> Outcome;
}

/// Which front-end to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Handshake,
    StructuredApi,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Handshake => "handshake",
            Method::StructuredApi => "structured-api",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Method::Handshake => 8291,
            Method::StructuredApi => 8728,
        }
    }

    pub fn default_timeout(self) -> Duration {
        match self {
            Method::Handshake => Duration::from_secs(3),
            Method::StructuredApi => Duration::from_secs(5),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the probe for `method`.
pub fn build_probe(method: Method, handshake: HandshakeSettings) -> Box<dyn LoginProbe> {
    match method {
        Method::Handshake => Box::new(HandshakeProbe::new(handshake)),
        Method::StructuredApi => Box::new(StructuredApiProbe::new()),
    }
}

/// Connect with `timeout`, trying every resolved address, and apply the same
/// timeout to reads and writes.
pub(crate) fn connect(target: &Target, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = target.authority().to_socket_addrs()?.collect();
    let mut last_err = io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("{} did not resolve", target.host),
    );
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Map a transport error onto an outcome. Connection-level trouble is an
/// ordinary failed attempt; anything else is surfaced as a probe error.
pub(crate) fn classify_io(err: &io::Error) -> Outcome {
    use io::ErrorKind::*;
    match err.kind() {
        TimedOut | WouldBlock | ConnectionRefused | ConnectionReset | ConnectionAborted
        | BrokenPipe | UnexpectedEof | NotConnected | AddrNotAvailable => {
            Outcome::Failure(FailureReason::Network(err.kind()))
        }
        _ => Outcome::ProbeError(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_render_short_labels() {
        assert_eq!(FailureReason::NoBanner.to_string(), "no banner");
        assert_eq!(
            FailureReason::Network(io::ErrorKind::TimedOut).to_string(),
            "network"
        );
        assert_eq!(
            Outcome::Failure(FailureReason::InvalidCredential).to_string(),
            "failure (invalid credential)"
        );
    }

    #[test]
    fn method_defaults() {
        assert_eq!(Method::Handshake.default_port(), 8291);
        assert_eq!(Method::StructuredApi.default_port(), 8728);
        assert_eq!(Method::StructuredApi.default_timeout(), Duration::from_secs(5));
        assert_eq!(Method::StructuredApi.to_string(), "structured-api");
    }

    #[test]
    fn refused_and_timed_out_are_network_failures() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            classify_io(&refused),
            Outcome::Failure(FailureReason::Network(io::ErrorKind::ConnectionRefused))
        );
        let other = io::Error::other("boom");
        assert!(matches!(classify_io(&other), Outcome::ProbeError(_)));
    }

    #[test]
    fn connect_applies_timeout_to_reads() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = connect(&Target::new("127.0.0.1", port), Duration::from_millis(300)).unwrap();
        assert_eq!(stream.read_timeout().unwrap(), Some(Duration::from_millis(300)));
        assert_eq!(stream.write_timeout().unwrap(), Some(Duration::from_millis(300)));
    }
}
