//! Client side of the judge protocol.
//!
//! [`Oracle`] is the seam the extraction engine talks to. [`TcpOracle`] opens a
//! fresh connection per probe so concurrent workers never share a stream.

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::payload::Probe;
use crate::protocol::{encode_request, Reply, Verdict, MAX_REPLY_LEN, PROMPT};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected prompt byte {0:#04x}")]
    BadPrompt(u8),
    #[error("protocol violation: judge replied {0:?}")]
    ProtocolViolation(String),
}

/// Answers "does this fragment compile cleanly?".
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn ask(&self, probe: &Probe) -> Result<Verdict, OracleError>;
}

/// Oracle backed by a remote judge reached over TCP.
#[derive(Debug, Clone)]
pub struct TcpOracle {
    addr: String,
}

impl TcpOracle {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Oracle for TcpOracle {
    async fn ask(&self, probe: &Probe) -> Result<Verdict, OracleError> {
        let mut stream = TcpStream::connect(self.addr.as_str()).await?;
        stream.set_nodelay(true)?;
        let verdict = exchange(&mut stream, &probe.source).await?;
        tracing::debug!(probe = %probe.kind, ?verdict, "probe answered");
        Ok(verdict)
    }
}

/// Run one prompt/request/reply exchange over an already open stream.
///
/// The reply read is bounded by [`MAX_REPLY_LEN`]: a judge that streams
/// garbage or closes early yields [`OracleError::ProtocolViolation`] instead of
/// blocking.
pub async fn exchange<S>(stream: &mut S, fragment: &str) -> Result<Verdict, OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut prompt = [0u8; 1];
    stream.read_exact(&mut prompt).await?;
    if prompt[0] != PROMPT {
        return Err(OracleError::BadPrompt(prompt[0]));
    }

    stream.write_all(&encode_request(fragment)).await?;
    stream.flush().await?;

    let mut reply = Vec::with_capacity(MAX_REPLY_LEN);
    let mut chunk = [0u8; MAX_REPLY_LEN];
    while !Reply::is_complete(&reply) {
        let want = MAX_REPLY_LEN - reply.len();
        let n = stream.read(&mut chunk[..want]).await?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&chunk[..n]);
    }

    Reply::parse(&reply).into_verdict().map_err(|raw| {
        OracleError::ProtocolViolation(String::from_utf8_lossy(&raw).into_owned())
    })
}
