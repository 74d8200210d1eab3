//! Credential data model and the shared cross-product cursor that hands out
//! username/password pairs to workers.
//!
//! A [`CredentialSpace`] enumerates `usernames × passwords` in username-major
//! order: every password for the first username, then every password for the
//! second, and so on. The cursor is a single two-dimensional index behind one
//! lock, so concurrent callers of [`CredentialSpace::next`] each receive a
//! distinct pair and every pair is delivered exactly once per round.
use std::fmt;
use std::sync::Mutex;

/// A username/password pair under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.password)
    }
}

/// Host and port probed during one round.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form accepted by `ToSocketAddrs`. IPv6 literals are
    /// bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    user: usize,
    pass: usize,
}

/// Thread-safe, resumable enumeration of the username × password product.
#[derive(Debug)]
pub struct CredentialSpace<'a> {
    usernames: &'a [String],
    passwords: &'a [String],
    cursor: Mutex<Cursor>,
}

impl<'a> CredentialSpace<'a> {
    pub fn new(usernames: &'a [String], passwords: &'a [String]) -> Self {
        Self {
            usernames,
            passwords,
            cursor: Mutex::new(Cursor::default()),
        }
    }

    /// Number of pairs in the full product.
    pub fn len(&self) -> usize {
        self.usernames.len().saturating_mul(self.passwords.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand out the next pair, or `None` once the product is exhausted.
    ///
    /// The password index advances first; when it reaches the end of the
    /// password list it wraps to zero and the username index advances.
    pub fn next(&self) -> Option<Credential> {
        let mut cursor = self.lock();
        if self.passwords.is_empty() || cursor.user >= self.usernames.len() {
            return None;
        }
        let credential = Credential::new(
            self.usernames[cursor.user].as_str(),
            self.passwords[cursor.pass].as_str(),
        );
        cursor.pass += 1;
        if cursor.pass == self.passwords.len() {
            cursor.pass = 0;
            cursor.user += 1;
        }
        Some(credential)
    }

    /// Count of pairs already handed out.
    pub fn delivered(&self) -> usize {
        let cursor = self.lock();
        if self.passwords.is_empty() {
            return 0;
        }
        (cursor.user * self.passwords.len() + cursor.pass).min(self.len())
    }

    /// Rewind the cursor to the first pair.
    pub fn restart(&self) {
        *self.lock() = Cursor::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Cursor> {
        // The cursor is a pair of plain indices, always left consistent, so a
        // poisoned lock still holds a usable value.
        self.cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
