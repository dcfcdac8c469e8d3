//! Wire contract shared by the judge and the extractor.
//!
//! One exchange per connection: the judge writes [`PROMPT`], the client answers
//! with a single base64 line, the judge replies [`ACCEPT_REPLY`] or
//! [`REJECT_REPLY`] and closes the stream.
//!
//! Two transforms are part of the contract:
//! - [`escape_fragment`] (client side) rewrites `{`, `}` and `#` into the C
//!   digraphs `<%`, `%>` and `%:` so the fragment keeps its own blocks and
//!   directives.
//! - [`strip_structural`] (judge side) deletes every raw `{`, `}` and `#` from the
//!   decoded text before it is embedded, so free client text can never reshape
//!   the compilation skeleton.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Prompt byte written by the judge once per connection.
pub const PROMPT: u8 = b'>';

/// Terminates the client's request line.
pub const TERMINATOR: u8 = b'\n';

/// Reply for a clean compilation.
pub const ACCEPT_REPLY: &[u8] = b"OK";

/// Reply for a failed compilation, diagnostics, or timeout.
pub const REJECT_REPLY: &[u8] = b"Not OK";

/// Longest reply a well-behaved judge can send.
pub const MAX_REPLY_LEN: usize = REJECT_REPLY.len();

/// Characters removed at the trust boundary.
pub const STRUCTURAL_CHARS: [char; 3] = ['{', '}', '#'];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("request exceeds {0} bytes")]
    RequestTooLarge(usize),
    #[error("connection closed before request terminator")]
    MissingTerminator,
}

/// Outcome of one oracle query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    pub fn is_accept(self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// Literal bytes the judge writes for this verdict.
    pub fn reply(self) -> &'static [u8] {
        match self {
            Verdict::Accept => ACCEPT_REPLY,
            Verdict::Reject => REJECT_REPLY,
        }
    }
}

/// A judge reply as seen by the client.
///
/// `ProtocolViolation` is not a third verdict: callers turn it into a fatal
/// error for the probe that received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Accept,
    Reject,
    ProtocolViolation(Vec<u8>),
}

impl Reply {
    pub fn parse(raw: &[u8]) -> Self {
        match raw.trim_ascii() {
            ACCEPT_REPLY => Reply::Accept,
            REJECT_REPLY => Reply::Reject,
            _ => Reply::ProtocolViolation(raw.to_vec()),
        }
    }

    /// True once `buf` holds everything a valid reply could contain.
    ///
    /// Both literals end in `OK`; anything reaching [`MAX_REPLY_LEN`] without a
    /// match can no longer become valid.
    pub fn is_complete(buf: &[u8]) -> bool {
        buf.ends_with(ACCEPT_REPLY) || buf.len() >= MAX_REPLY_LEN
    }

    pub fn into_verdict(self) -> Result<Verdict, Vec<u8>> {
        match self {
            Reply::Accept => Ok(Verdict::Accept),
            Reply::Reject => Ok(Verdict::Reject),
            Reply::ProtocolViolation(raw) => Err(raw),
        }
    }
}

/// Rewrite block delimiters and the directive introducer into C digraphs.
pub fn escape_fragment(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + fragment.len() / 8);
    for ch in fragment.chars() {
        match ch {
            '{' => out.push_str("<%"),
            '}' => out.push_str("%>"),
            '#' => out.push_str("%:"),
            other => out.push(other),
        }
    }
    out
}

/// Build the request line for a fragment: escaped, base64 encoded, terminated.
pub fn encode_request(fragment: &str) -> Vec<u8> {
    let mut line = STANDARD.encode(escape_fragment(fragment)).into_bytes();
    line.push(TERMINATOR);
    line
}

/// Decode a request line (terminator and surrounding whitespace tolerated).
pub fn decode_request(line: &[u8]) -> Result<String, ProtocolError> {
    let raw = STANDARD.decode(line.trim_ascii())?;
    Ok(String::from_utf8(raw)?)
}

/// Remove every structural character; returns the cleaned text and how many
/// characters were dropped.
pub fn strip_structural(text: &str) -> (String, usize) {
    let cleaned: String = text
        .chars()
        .filter(|c| !STRUCTURAL_CHARS.contains(c))
        .collect();
    let stripped = text.chars().count() - cleaned.chars().count();
    (cleaned, stripped)
}
