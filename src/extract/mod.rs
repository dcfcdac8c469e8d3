//! Turning binary oracle verdicts into the secret.
//!
//! - [`length`]: sequential scan for the first out-of-bounds index.
//! - [`charset`]: per-index boundary search over a fixed alphabet.
//! - [`buffer`]: the secret buffer with one write-once slot per interior index.
//! - [`session`]: one length pass, then one worker per interior index.

pub mod buffer;
pub mod charset;
pub mod length;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use thiserror::Error;

use crate::oracle::OracleError;

pub use buffer::{SecretBuffer, Slot};
pub use charset::{crosses_at, discover_byte};
pub use length::{discover_length, DEFAULT_MAX_LENGTH};
pub use session::{ExtractOptions, Extraction, Session};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("length probe 0 rejected: the fragment cannot reach the protected file")]
    NoSecret,
    #[error("no length probe rejected up to {0}")]
    LengthUnbounded(usize),
    #[error("secret length {0} leaves no room for both delimiters")]
    TooShort(usize),
    #[error("no alphabet candidate crosses at index {index}")]
    AlphabetExhausted { index: usize },
    #[error("index {index} crosses at both {first:?} and {second:?}")]
    AmbiguousCrossing {
        index: usize,
        first: char,
        second: char,
    },
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
    #[error("slot {0} was never filled")]
    SlotUnfilled(usize),
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const PUNCTUATION: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Candidate bytes, scanned in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet(Arc<[u8]>);

impl Alphabet {
    /// Lowercase, uppercase, digits, then punctuation.
    pub fn printable() -> Self {
        let bytes: Vec<u8> = [ASCII_LETTERS, DIGITS, PUNCTUATION].concat();
        Self(Arc::from(bytes))
    }

    /// Candidates must be printable ASCII and unique, so every one has a
    /// successor and the scan order is unambiguous.
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, ExtractError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(ExtractError::InvalidAlphabet("alphabet is empty".into()));
        }
        let mut seen = [false; 256];
        for &b in bytes {
            if !b.is_ascii_graphic() {
                return Err(ExtractError::InvalidAlphabet(format!(
                    "byte {b:#04x} is not printable ASCII"
                )));
            }
            if seen[b as usize] {
                return Err(ExtractError::InvalidAlphabet(format!(
                    "duplicate candidate {:?}",
                    char::from(b)
                )));
            }
            seen[b as usize] = true;
        }
        Ok(Self(Arc::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::printable()
    }
}
