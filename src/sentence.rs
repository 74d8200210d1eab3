//! Wire codec of the structured management API.
//!
//! A sentence is a sequence of words terminated by an empty word. Each word
//! is prefixed by its length in a 1 to 5 byte variable encoding:
//!
//! | length            | prefix                          |
//! |-------------------|---------------------------------|
//! | `< 0x80`          | 1 byte                          |
//! | `< 0x4000`        | 2 bytes, `len \| 0x8000`        |
//! | `< 0x20_0000`     | 3 bytes, `len \| 0xC0_0000`     |
//! | `< 0x1000_0000`   | 4 bytes, `len \| 0xE000_0000`   |
//! | otherwise         | `0xF0` then 4 bytes             |
use std::io::{self, Read, Write};

/// Words larger than this are treated as a framing error rather than
/// allocated.
pub const MAX_WORD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("reserved length prefix byte 0x{0:02x}")]
    ControlByte(u8),
    #[error("word of {0} bytes exceeds limit")]
    WordTooLong(usize),
    #[error("empty sentence")]
    EmptySentence,
}

/// Append the length prefix for a word of `len` bytes.
pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    let n = len as u32;
    if len < 0x80 {
        out.push(n as u8);
    } else if len < 0x4000 {
        out.extend_from_slice(&((n | 0x8000) as u16).to_be_bytes());
    } else if len < 0x20_0000 {
        out.extend_from_slice(&(n | 0xC0_0000).to_be_bytes()[1..]);
    } else if len < 0x1000_0000 {
        out.extend_from_slice(&(n | 0xE000_0000).to_be_bytes());
    } else {
        out.push(0xF0);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

/// Read one length prefix.
pub fn read_length<R: Read>(r: &mut R) -> Result<usize, WireError> {
    let first = read_u8(r)?;
    let (extra, head) = match first {
        b if b & 0x80 == 0x00 => (0, b as u32),
        b if b & 0xC0 == 0x80 => (1, (b & 0x3F) as u32),
        b if b & 0xE0 == 0xC0 => (2, (b & 0x1F) as u32),
        b if b & 0xF0 == 0xE0 => (3, (b & 0x0F) as u32),
        0xF0 => (4, 0),
        b => return Err(WireError::ControlByte(b)),
    };
    let mut len = head;
    for _ in 0..extra {
        len = (len << 8) | read_u8(r)? as u32;
    }
    Ok(len as usize)
}

fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

/// Encode `words` as one sentence, including the terminating empty word.
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for w in words {
        let bytes = w.as_ref().as_bytes();
        encode_length(bytes.len(), &mut out);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    out
}

pub fn write_sentence<W: Write, S: AsRef<str>>(w: &mut W, words: &[S]) -> io::Result<()> {
    w.write_all(&encode_sentence(words))?;
    w.flush()
}

/// Read words up to and including the terminating empty word.
pub fn read_sentence<R: Read>(r: &mut R) -> Result<Sentence, WireError> {
    let mut words = Vec::new();
    loop {
        let len = read_length(r)?;
        if len == 0 {
            break;
        }
        if len > MAX_WORD_BYTES {
            return Err(WireError::WordTooLong(len));
        }
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        words.push(String::from_utf8_lossy(&buf).into_owned());
    }
    if words.is_empty() {
        return Err(WireError::EmptySentence);
    }
    Ok(Sentence { words })
}

/// Kind of reply, taken from the first word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Done,
    Re,
    Trap,
    Fatal,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub words: Vec<String>,
}

impl Sentence {
    pub fn reply(&self) -> Reply {
        match self.words.first().map(String::as_str) {
            Some("!done") => Reply::Done,
            Some("!re") => Reply::Re,
            Some("!trap") => Reply::Trap,
            Some("!fatal") => Reply::Fatal,
            _ => Reply::Other,
        }
    }

    /// `=key=value` attribute words, in order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.words.iter().skip(1).filter_map(|w| {
            let rest = w.strip_prefix('=')?;
            Some(rest.split_once('=').unwrap_or((rest, "")))
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Error text carried by a `!trap` or `!fatal`. `!fatal` puts it in a
    /// bare word instead of a `=message=` attribute.
    pub fn message(&self) -> String {
        if let Some(m) = self.attribute("message") {
            return m.to_string();
        }
        self.words
            .iter()
            .skip(1)
            .filter(|w| !w.starts_with('=') && !w.starts_with('.'))
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
