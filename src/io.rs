use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::protocol::ProtocolError;

/// Read chunk size for request lines.
pub const LINE_CHUNK_SIZE: usize = 4096;

pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

/// Check if an error represents an expected connection close.
pub fn is_expected_close_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}

/// Read a single line terminated by `delim`, bounded by `max_len` bytes.
///
/// The returned line excludes the delimiter. The protocol carries exactly one
/// line per connection, so bytes after the delimiter are discarded.
pub async fn read_line_bounded<R: AsyncRead + Unpin>(
    reader: &mut R,
    delim: u8,
    max_len: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut line = Vec::new();
    let mut chunk = vec![0u8; LINE_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProtocolError::MissingTerminator);
        }
        if let Some(pos) = chunk[..n].iter().position(|b| *b == delim) {
            line.extend_from_slice(&chunk[..pos]);
            if line.len() > max_len {
                return Err(ProtocolError::RequestTooLarge(max_len));
            }
            return Ok(line);
        }
        line.extend_from_slice(&chunk[..n]);
        if line.len() > max_len {
            return Err(ProtocolError::RequestTooLarge(max_len));
        }
    }
}
