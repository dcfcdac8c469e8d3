//! The judge: compiles client fragments inside a fixed skeleton and answers
//! with a single verdict.
//!
//! Each connection walks `AwaitPayload -> Compile -> Respond -> Closed`. The
//! only state shared between connections is the read-only compiler config and
//! the relaxed telemetry counters.

pub mod compiler;

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::io::{is_expected_close_error, read_line_bounded, IoStream};
use crate::protocol::{decode_request, strip_structural, ProtocolError, Verdict, PROMPT, TERMINATOR};
use crate::telemetry;

pub use compiler::{ClangCompiler, CompileOutcome, Compiler, DEFAULT_COMPILE_TIMEOUT};

/// Default cap on the base64 request line.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;

const SKELETON_HEAD: &str = "int main(void) {";
const SKELETON_TAIL: &str = "}";

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("bad request: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitPayload,
    Compile,
    Respond,
    Closed,
}

/// Sanitize client text and wrap it in the skeleton.
///
/// Returns the translation unit and the number of structural characters that
/// were stripped from the client text.
pub fn build_unit(fragment: &str) -> (String, usize) {
    let (cleaned, stripped) = strip_structural(fragment);
    let mut unit = String::with_capacity(SKELETON_HEAD.len() + cleaned.len() + SKELETON_TAIL.len());
    unit.push_str(SKELETON_HEAD);
    unit.push_str(&cleaned);
    unit.push_str(SKELETON_TAIL);
    (unit, stripped)
}

pub struct Judge {
    compiler: Arc<dyn Compiler>,
    max_request_bytes: usize,
}

impl Judge {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    pub fn with_max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max;
        self
    }

    /// Sanitize, compile and classify one decoded fragment.
    pub async fn judge(&self, fragment: &str) -> Verdict {
        let (unit, stripped) = build_unit(fragment);
        if stripped > 0 {
            tracing::warn!(stripped, "stripped structural characters from request");
            telemetry::record_stripped(stripped);
        }

        match self.compiler.compile(&unit).await {
            Ok(CompileOutcome::TimedOut) => {
                tracing::warn!("compilation timed out, answering reject");
                telemetry::record_compile_timeout();
                Verdict::Reject
            }
            Ok(outcome) => outcome.verdict(),
            Err(e) => {
                tracing::error!(error = %e, "failed to run compiler, answering reject");
                Verdict::Reject
            }
        }
    }

    /// Serve a single connection to completion.
    ///
    /// A request that cannot be read or decoded closes the connection without
    /// a verdict; the client sees that as a protocol violation.
    pub async fn serve_stream<S: IoStream>(&self, mut stream: S) -> Result<Verdict, JudgeError> {
        let _guard = telemetry::ConnectionGuard::new();
        let result = self.exchange(&mut stream).await;

        tracing::debug!(state = ?ConnectionState::Closed, "connection state");
        if let Err(e) = stream.shutdown().await {
            if !is_expected_close_error(&e) {
                tracing::debug!(error = %e, "shutdown failed");
            }
        }

        if let Err(JudgeError::Protocol(ref e)) = result {
            tracing::warn!(error = %e, "dropping bad request");
            telemetry::record_bad_request();
        }
        result
    }

    async fn exchange<S: IoStream>(&self, stream: &mut S) -> Result<Verdict, JudgeError> {
        tracing::debug!(state = ?ConnectionState::AwaitPayload, "connection state");
        stream.write_all(&[PROMPT]).await?;
        stream.flush().await?;
        let line = read_line_bounded(stream, TERMINATOR, self.max_request_bytes).await?;
        let fragment = decode_request(&line)?;
        telemetry::record_request();

        tracing::debug!(state = ?ConnectionState::Compile, bytes = fragment.len(), "connection state");
        let verdict = self.judge(&fragment).await;
        telemetry::record_verdict(verdict);

        tracing::debug!(state = ?ConnectionState::Respond, ?verdict, "connection state");
        stream.write_all(verdict.reply()).await?;
        stream.flush().await?;
        Ok(verdict)
    }
}
