//! Validated run settings.
//!
//! Everything that can fail before a round starts is checked here: word
//! lists are loaded, the port list is parsed and the worker count is
//! validated. Any problem is a [`ConfigError`], which aborts the run before
//! the audit file is created or a worker is spawned.
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::handshake::HandshakeSettings;
use crate::io::load_wordlist;
use crate::probe::Method;

pub const DEFAULT_THREADS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("wordlist file not found: {}", .0.display())]
    WordlistMissing(PathBuf),
    #[error("could not read wordlist {}: {source}", .path.display())]
    WordlistUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("wordlist has no entries: {}", .0.display())]
    EmptyWordlist(PathBuf),
    #[error("specify a username (-u) or a username wordlist (-U)")]
    NoUsernames,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("thread count must be at least 1")]
    ZeroThreads,
    #[error("timeout must be a positive number of seconds")]
    InvalidTimeout,
    #[error("could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Where usernames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSource {
    Single(String),
    List(PathBuf),
}

/// Settings for a whole run, with word lists already loaded.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub host: String,
    pub method: Method,
    pub ports: Vec<u16>,
    pub usernames: Vec<String>,
    pub passwords: Vec<String>,
    pub threads: usize,
    pub timeout: Duration,
    pub handshake: HandshakeSettings,
}

impl RunConfig {
    /// Build a config from raw inputs, loading the word lists. `--user` wins
    /// over `--userlist`; ports default to the method's well-known port.
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        host: &str,
        method: Method,
        ports: Option<&str>,
        users: Option<UserSource>,
        passlist: &Path,
        threads: usize,
        timeout_secs: Option<f64>,
        handshake: HandshakeSettings,
        mmap_threshold: u64,
    ) -> Result<Self, ConfigError> {
        if threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        let timeout = match timeout_secs {
            Some(secs) => parse_timeout(secs)?,
            None => method.default_timeout(),
        };
        let ports = match ports {
            Some(list) => parse_ports(list)?,
            None => vec![method.default_port()],
        };
        let passwords = load_wordlist(passlist, mmap_threshold)?;
        let usernames = match users.ok_or(ConfigError::NoUsernames)? {
            UserSource::Single(name) => vec![name],
            UserSource::List(path) => load_wordlist(path, mmap_threshold)?,
        };
        Ok(Self {
            host: host.to_string(),
            method,
            ports,
            usernames,
            passwords,
            threads,
            timeout,
            handshake,
        })
    }
}

/// Seconds to a non-zero [`Duration`]. Values that overflow or round down to
/// zero are rejected along with negatives and NaN.
fn parse_timeout(secs: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        _ => Err(ConfigError::InvalidTimeout),
    }
}

/// Parse a comma-separated port list such as `8291, 8729`.
pub fn parse_ports(list: &str) -> Result<Vec<u16>, ConfigError> {
    let ports = list
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.parse::<u16>() {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::InvalidPort(p.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ports.is_empty() {
        return Err(ConfigError::InvalidPort(list.to_string()));
    }
    Ok(ports)
}
