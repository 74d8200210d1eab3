//! Word-list loading.
//!
//! Lists are plain text, one entry per line. Surrounding whitespace is
//! trimmed, blank lines are skipped, CRLF endings are accepted and bytes that
//! are not UTF-8 are dropped rather than failing the whole file. Large files
//! are read through a memory map.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use memmap2::Mmap;

use crate::config::ConfigError;

/// Threshold in bytes above which we attempt to use mmap for reading.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

/// Decide whether to use mmap based on file size and threshold.
pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

/// Iterate lines through a buffered reader.
pub fn iter_lines_bufread<P: AsRef<Path>>(path: P) -> io::Result<LineIter> {
    let reader = BufReader::new(File::open(path)?);
    Ok(Box::new(
        reader
            .split(b'\n')
            .map(|chunk| chunk.map(|bytes| line_from_bytes(&bytes))),
    ))
}

/// Iterate lines over a memory map of the file.
pub fn iter_lines_mmap<P: AsRef<Path>>(path: P) -> io::Result<LineIter> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and word lists are not expected to be
    // truncated while loading.
    let mmap = unsafe { Mmap::map(&file) }?;
    Ok(Box::new(MmapLines { mmap, pos: 0 }))
}

struct MmapLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MmapLines {
    type Item = io::Result<String>;
    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        if let Some(off) = memchr::memchr(b'\n', &data[self.pos..]) {
            let end = self.pos + off;
            self.pos = end + 1;
            Some(Ok(line_from_bytes(&data[start..end])))
        } else {
            // Last line without trailing newline
            self.pos = data.len();
            Some(Ok(line_from_bytes(&data[start..])))
        }
    }
}

fn line_from_bytes(bytes: &[u8]) -> String {
    let slice = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    slice.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Choose mmap or bufread and return an iterator over lines.
pub fn iter_lines_auto<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> io::Result<LineIter> {
    let meta = std::fs::metadata(&path)?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        iter_lines_mmap(path)
    } else {
        iter_lines_bufread(path)
    }
}

/// Load a word list. A missing file, a read failure, or a list with no
/// non-blank entries is a [`ConfigError`].
pub fn load_wordlist<P: AsRef<Path>>(
    path: P,
    threshold_bytes: u64,
) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ConfigError::WordlistMissing(path.to_path_buf()));
    }
    let unreadable = |source| ConfigError::WordlistUnreadable {
        path: path.to_path_buf(),
        source,
    };
    let mut words = Vec::new();
    for line in iter_lines_auto(path, threshold_bytes).map_err(unreadable)? {
        let line = line.map_err(unreadable)?;
        let word = line.trim();
        if !word.is_empty() {
            words.push(word.to_string());
        }
    }
    if words.is_empty() {
        return Err(ConfigError::EmptyWordlist(path.to_path_buf()));
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn skips_blank_lines_and_trims() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("pw.txt");
        std::fs::write(&p, "admin\r\n\n  root \n\t\nsupport").unwrap();
        let words = load_wordlist(&p, DEFAULT_MMAP_THRESHOLD_BYTES).unwrap();
        assert_eq!(words, vec!["admin", "root", "support"]);
    }

    #[test]
    fn mmap_and_bufread_agree() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("pw.txt");
        std::fs::write(&p, b"one\ntw\xffo\r\nthree\n").unwrap();
        let mapped = load_wordlist(&p, 1).unwrap();
        let buffered = load_wordlist(&p, u64::MAX).unwrap();
        assert_eq!(mapped, buffered);
        assert_eq!(mapped.len(), 3);
        assert_eq!(mapped[1], "two");
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = load_wordlist(dir.path().join("nope.txt"), 0).unwrap_err();
        assert!(matches!(err, ConfigError::WordlistMissing(_)));
    }

    #[test]
    fn blank_file_is_config_error() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("empty.txt");
        std::fs::write(&p, "\n \n").unwrap();
        assert!(matches!(
            load_wordlist(&p, u64::MAX),
            Err(ConfigError::EmptyWordlist(_))
        ));
    }
}
