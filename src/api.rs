//! Login probe for the structured management API.
//!
//! One session per attempt: `/login` with the credential as `=name=` and
//! `=password=` attributes, then a single read-only `/system/identity/print`.
//! The session is shut down when [`ApiSession`] drops, so every exit path
//! closes it.
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use log::debug;

use crate::credential::{Credential, Target};
use crate::probe::{FailureReason, LoginProbe, Outcome, classify_io, connect};
use crate::sentence::{Reply, Sentence, WireError, read_sentence, write_sentence};

const INVALID_LOGIN_MARKER: &str = "invalid user name or password";

/// Most `!re` sentences accepted for one command.
pub const MAX_REPLY_SENTENCES: usize = 1024;

/// Failure inside a session, before it is mapped to an [`Outcome`].
#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Remote(String),
    #[error("{0}")]
    Unexpected(String),
}

struct ApiSession {
    stream: TcpStream,
}

impl ApiSession {
    fn open(target: &Target, timeout: Duration) -> std::io::Result<Self> {
        Ok(Self {
            stream: connect(target, timeout)?,
        })
    }

    /// Send one command and collect reply sentences up to `!done`.
    fn call(&mut self, words: &[&str]) -> Result<Vec<Sentence>, SessionError> {
        write_sentence(&mut self.stream, words).map_err(WireError::from)?;
        let mut replies = Vec::new();
        loop {
            let sentence = read_sentence(&mut self.stream)?;
            match sentence.reply() {
                Reply::Done => return Ok(replies),
                Reply::Re if replies.len() >= MAX_REPLY_SENTENCES => {
                    return Err(SessionError::Unexpected(format!(
                        "more than {MAX_REPLY_SENTENCES} reply sentences"
                    )));
                }
                Reply::Re => replies.push(sentence),
                Reply::Trap => return Err(classify_trap(sentence.message())),
                Reply::Fatal => return Err(SessionError::Remote(sentence.message())),
                Reply::Other => {
                    return Err(SessionError::Unexpected(format!(
                        "unexpected reply {:?}",
                        sentence.words.first()
                    )));
                }
            }
        }
    }

    fn login(&mut self, credential: &Credential) -> Result<(), SessionError> {
        let name = format!("=name={}", credential.username);
        let password = format!("=password={}", credential.password);
        self.call(&["/login", &name, &password])?;
        Ok(())
    }

    fn identity(&mut self) -> Result<Option<String>, SessionError> {
        let replies = self.call(&["/system/identity/print"])?;
        Ok(replies
            .iter()
            .flat_map(|s| s.attributes())
            .find(|(_, v)| !v.is_empty())
            .map(|(_, v)| v.to_string()))
    }
}

impl Drop for ApiSession {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn classify_trap(message: String) -> SessionError {
    if message.to_lowercase().contains(INVALID_LOGIN_MARKER) {
        SessionError::Rejected(message)
    } else {
        SessionError::Remote(message)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredApiProbe;

impl StructuredApiProbe {
    pub fn new() -> Self {
        Self
    }
}

impl LoginProbe for StructuredApiProbe {
    fn name(&self) -> &'static str {
        "structured-api"
    }

    fn attempt(&self, target: &Target, credential: &Credential, timeout: Duration) -> Outcome {
        let mut session = match ApiSession::open(target, timeout) {
            Ok(s) => s,
            Err(e) => return classify_io(&e),
        };
        let result = session.login(credential).and_then(|()| session.identity());
        drop(session);

        match result {
            Ok(Some(identity)) => {
                debug!("{target} identity {identity:?} for {}", credential.username);
                Outcome::Success
            }
            Ok(None) => Outcome::ProbeError("empty identity reply".to_string()),
            Err(SessionError::Rejected(_)) => Outcome::Failure(FailureReason::InvalidCredential),
            Err(SessionError::Wire(WireError::Io(e))) => classify_io(&e),
            Err(e) => Outcome::ProbeError(e.to_string()),
        }
    }
}
