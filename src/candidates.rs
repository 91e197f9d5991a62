//! Candidate password suppliers.
//!
//! A supplier writes candidates one at a time into a caller-owned buffer so
//! the search loop allocates nothing per candidate. Both suppliers can be
//! positioned at a candidate taken from a checkpoint; the next candidate
//! they produce is then that same one.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::encryption::algorithms::MAX_PASSWORD_LEN;
use crate::error::{Error, Result};

/// Default brute-force alphabet.
pub const DEFAULT_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A source of candidate passwords.
pub trait CandidateSupplier: Send {
    /// Write the next candidate into `buf` (replacing its contents).
    ///
    /// Returns `Ok(false)` once the supply is exhausted.
    fn next_into(&mut self, buf: &mut Vec<u8>) -> Result<bool>;

    /// Position the supplier so the next candidate is `candidate`.
    fn resume_at(&mut self, candidate: &[u8]) -> Result<()>;
}

/// Candidates read one per line from a word list.
///
/// Line terminators (LF or CRLF) are stripped; empty
/// lines stand for the empty password.
pub struct Wordlist<R> {
    reader: R,
    pending: Option<Vec<u8>>,
    line: u64,
}

impl Wordlist<BufReader<File>> {
    /// Open a word list file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead + Send> Wordlist<R> {
    /// Read candidates from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
            line: 0,
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.line
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();
        if self.reader.read_until(b'\n', buf)? == 0 {
            return Ok(false);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        self.line += 1;
        Ok(true)
    }
}

impl<R: BufRead + Send> CandidateSupplier for Wordlist<R> {
    fn next_into(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        if let Some(pending) = self.pending.take() {
            *buf = pending;
            return Ok(true);
        }
        self.read_line(buf)
    }

    /// Skip to the first line whose leading 32 bytes equal `candidate`.
    ///
    /// Checkpoints store candidates truncated to 32 bytes, so when several
    /// longer lines share those 32 bytes the search restarts at the earliest
    /// of them and the lines in between are tested again.
    fn resume_at(&mut self, candidate: &[u8]) -> Result<()> {
        let mut buf = Vec::new();
        while self.read_line(&mut buf)? {
            // Stored candidates are truncated to 32 bytes
            if buf[..buf.len().min(MAX_PASSWORD_LEN)] == *candidate {
                log::debug!("Word list resumed at line {}", self.line);
                self.pending = Some(buf);
                return Ok(());
            }
        }
        Err(Error::Checkpoint(format!(
            "'{}' does not occur in the word list",
            String::from_utf8_lossy(candidate)
        )))
    }
}

/// Every string over a charset with length in `min_len..=max_len`, shorter
/// strings first, each length in charset order with the last position
/// changing fastest.
#[derive(Debug, Clone)]
pub struct BruteForce {
    charset: Vec<u8>,
    min_len: usize,
    max_len: usize,
    indices: Vec<usize>,
    exhausted: bool,
}

impl BruteForce {
    /// Create a generator. Duplicate charset bytes are removed.
    ///
    /// # Panics
    ///
    /// Panics if `charset` is empty or `min_len > max_len`.
    pub fn new(charset: &[u8], min_len: usize, max_len: usize) -> Self {
        assert!(min_len <= max_len, "min_len {} > max_len {}", min_len, max_len);
        let mut unique = Vec::with_capacity(charset.len());
        for &c in charset {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        assert!(!unique.is_empty(), "empty charset");
        Self {
            charset: unique,
            min_len,
            max_len: max_len.min(MAX_PASSWORD_LEN),
            indices: vec![0; min_len],
            exhausted: min_len > MAX_PASSWORD_LEN,
        }
    }

    /// Number of candidates in the whole space, if it fits in a `u128`.
    pub fn space_size(&self) -> Option<u128> {
        let base = self.charset.len() as u128;
        (self.min_len..=self.max_len).try_fold(0u128, |acc, len| {
            base.checked_pow(u32::try_from(len).ok()?).and_then(|n| acc.checked_add(n))
        })
    }

    fn advance(&mut self) {
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.charset.len() {
                return;
            }
            self.indices[pos] = 0;
        }
        // Every position wrapped: move on to the next length
        if self.indices.len() < self.max_len {
            self.indices.push(0);
            self.indices.iter_mut().for_each(|i| *i = 0);
        } else {
            self.exhausted = true;
        }
    }
}

impl CandidateSupplier for BruteForce {
    fn next_into(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        buf.clear();
        buf.extend(self.indices.iter().map(|&i| self.charset[i]));
        self.advance();
        Ok(true)
    }

    fn resume_at(&mut self, candidate: &[u8]) -> Result<()> {
        if candidate.len() < self.min_len || candidate.len() > self.max_len {
            return Err(Error::Checkpoint(format!(
                "candidate of length {} outside the brute-force range",
                candidate.len()
            )));
        }
        let indices = candidate
            .iter()
            .map(|c| self.charset.iter().position(|x| x == c))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                Error::Checkpoint(format!(
                    "'{}' uses characters outside the charset",
                    String::from_utf8_lossy(candidate)
                ))
            })?;
        self.indices = indices;
        self.exhausted = false;
        Ok(())
    }
}
