//! Raw handshake login over a stream socket.
//!
//! Exchange: connect, send one probe byte, read the banner and require a
//! service marker, send `username:password`, wait for the settle delay (the
//! protocol has no reply framing), read the reply and look for a login
//! confirmation marker. Marker matching is case-insensitive.
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

use log::trace;

use crate::credential::{Credential, Target};
use crate::probe::{FailureReason, LoginProbe, Outcome, connect};

const READ_BUFFER_BYTES: usize = 1024;

/// Tunables of the handshake exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSettings {
    pub probe_byte: u8,
    pub banner_markers: Vec<String>,
    pub success_markers: Vec<String>,
    pub settle_delay: Duration,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            probe_byte: 0x00,
            banner_markers: vec!["welcome".to_string(), "winbox".to_string()],
            success_markers: vec!["logged in".to_string(), "success".to_string()],
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl HandshakeSettings {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandshakeProbe {
    settings: HandshakeSettings,
}

impl HandshakeProbe {
    pub fn new(settings: HandshakeSettings) -> Self {
        Self { settings }
    }

    fn exchange(&self, stream: &mut TcpStream, credential: &Credential) -> io::Result<Outcome> {
        let mut buf = [0u8; READ_BUFFER_BYTES];

        stream.write_all(&[self.settings.probe_byte])?;
        let n = stream.read(&mut buf)?;
        if !contains_marker(&buf[..n], &self.settings.banner_markers) {
            return Ok(Outcome::Failure(FailureReason::NoBanner));
        }

        stream.write_all(credential.to_string().as_bytes())?;
        thread::sleep(self.settings.settle_delay);
        let n = stream.read(&mut buf)?;
        trace!("handshake reply: {:?}", String::from_utf8_lossy(&buf[..n]));
        if contains_marker(&buf[..n], &self.settings.success_markers) {
            Ok(Outcome::Success)
        } else {
            Ok(Outcome::Failure(FailureReason::Rejected))
        }
    }
}

impl LoginProbe for HandshakeProbe {
    fn name(&self) -> &'static str {
        "handshake"
    }

    fn attempt(&self, target: &Target, credential: &Credential, timeout: Duration) -> Outcome {
        let mut stream = match connect(target, timeout) {
            Ok(s) => s,
            Err(e) => return Outcome::Failure(FailureReason::Network(e.kind())),
        };
        let outcome = self
            .exchange(&mut stream, credential)
            .unwrap_or_else(|e| Outcome::Failure(FailureReason::Network(e.kind())));
        let _ = stream.shutdown(Shutdown::Both);
        outcome
    }
}

fn contains_marker(haystack: &[u8], markers: &[String]) -> bool {
    let lowered = haystack.to_ascii_lowercase();
    markers.iter().any(|m| {
        let needle = m.as_bytes().to_ascii_lowercase();
        !needle.is_empty() && memchr::memmem::find(&lowered, &needle).is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn fast() -> HandshakeSettings {
        HandshakeSettings::default().with_settle_delay(Duration::from_millis(5))
    }

    /// Serve one connection: answer the probe byte with `banner`, then answer
    /// the credential with `ok` when it equals `accept`, otherwise `denied`.
    fn serve_once(banner: &'static [u8], accept: &'static str) -> Target {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            let mut buf = [0u8; 256];
            let _ = s.read(&mut buf).unwrap();
            s.write_all(banner).unwrap();
            let n = s.read(&mut buf).unwrap_or(0);
            let reply: &[u8] = if &buf[..n] == accept.as_bytes() {
                b"User LOGGED IN"
            } else {
                b"denied"
            };
            let _ = s.write_all(reply);
        });
        Target::new("127.0.0.1", port)
    }

    #[test]
    fn marker_match_ignores_case() {
        let markers = vec!["winbox".to_string()];
        assert!(contains_marker(b"Hello WinBox v6", &markers));
        assert!(!contains_marker(b"ssh-2.0", &markers));
        assert!(!contains_marker(b"", &markers));
    }

    #[test]
    fn accepted_credential_is_success() {
        let target = serve_once(b"Welcome", "admin:secret");
        let probe = HandshakeProbe::new(fast());
        let outcome = probe.attempt(
            &target,
            &Credential::new("admin", "secret"),
            Duration::from_secs(2),
        );
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let target = serve_once(b"winbox ready", "admin:secret");
        let probe = HandshakeProbe::new(fast());
        let outcome = probe.attempt(
            &target,
            &Credential::new("admin", "nope"),
            Duration::from_secs(2),
        );
        assert_eq!(outcome, Outcome::Failure(FailureReason::Rejected));
    }

    #[test]
    fn missing_banner_stops_before_credentials() {
        let target = serve_once(b"SSH-2.0-OpenSSH", "admin:secret");
        let probe = HandshakeProbe::new(fast());
        let outcome = probe.attempt(
            &target,
            &Credential::new("admin", "secret"),
            Duration::from_secs(2),
        );
        assert_eq!(outcome, Outcome::Failure(FailureReason::NoBanner));
    }

    #[test]
    fn stream_is_closed_after_missing_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            s.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            let mut buf = [0u8; 256];
            let _ = s.read(&mut buf).unwrap();
            s.write_all(b"SSH-2.0-OpenSSH").unwrap();
            tx.send(s.read(&mut buf).map_err(|e| e.kind())).unwrap();
        });

        let outcome = HandshakeProbe::new(fast()).attempt(
            &Target::new("127.0.0.1", port),
            &Credential::new("admin", "secret"),
            Duration::from_secs(2),
        );
        assert_eq!(outcome, Outcome::Failure(FailureReason::NoBanner));
        // No credentials were sent and the peer sees end of stream.
        assert_eq!(rx.recv().unwrap(), Ok(0));
    }

    #[test]
    fn closed_port_is_network_failure() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let probe = HandshakeProbe::new(fast());
        let outcome = probe.attempt(
            &Target::new("127.0.0.1", port),
            &Credential::new("a", "b"),
            Duration::from_millis(500),
        );
        assert!(matches!(
            outcome,
            Outcome::Failure(FailureReason::Network(_))
        ));
    }
}
