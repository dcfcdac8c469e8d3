//! In-process oracles for exercising the extraction engine.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::oracle::{Oracle, OracleError};
use crate::payload::{Probe, ProbeKind};
use crate::protocol::Verdict;

/// Answers probes the way the compiler would for a given string literal.
pub(crate) struct SimulatedOracle {
    literal: Vec<u8>,
    asked: AtomicUsize,
}

impl SimulatedOracle {
    pub(crate) fn new(literal: impl AsRef<[u8]>) -> Self {
        Self {
            literal: literal.as_ref().to_vec(),
            asked: AtomicUsize::new(0),
        }
    }

    /// The literal the preprocessor sees once `prefix` is expanded away.
    pub(crate) fn from_protected(prefix: &str, contents: &str) -> Self {
        Self::new(contents.trim_end().strip_prefix(prefix).unwrap_or(contents))
    }

    pub(crate) fn asked(&self) -> usize {
        self.asked.load(Ordering::Relaxed)
    }

    pub(crate) fn evaluate(&self, kind: ProbeKind) -> Verdict {
        let len = self.literal.len();
        let accept = match kind {
            // The terminator makes `len` itself addressable.
            ProbeKind::Length { size } => size <= len,
            ProbeKind::Boundary { threshold, index } => {
                let byte = match index.cmp(&len) {
                    std::cmp::Ordering::Less => self.literal[index],
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => return Verdict::Reject,
                };
                byte < threshold
            }
        };
        if accept {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }
}

#[async_trait]
impl Oracle for SimulatedOracle {
    async fn ask(&self, probe: &Probe) -> Result<Verdict, OracleError> {
        self.asked.fetch_add(1, Ordering::Relaxed);
        Ok(self.evaluate(probe.kind))
    }
}

/// Wraps a simulated oracle and fails every boundary probe for one index.
pub(crate) struct ViolatingOracle {
    pub(crate) inner: SimulatedOracle,
    pub(crate) index: usize,
}

#[async_trait]
impl Oracle for ViolatingOracle {
    async fn ask(&self, probe: &Probe) -> Result<Verdict, OracleError> {
        match probe.kind {
            ProbeKind::Boundary { index, .. } if index == self.index => {
                Err(OracleError::ProtocolViolation("WAT".into()))
            }
            _ => self.inner.ask(probe).await,
        }
    }
}

/// Plants a second crossing at `ghost` for one index.
pub(crate) struct InconsistentOracle {
    pub(crate) inner: SimulatedOracle,
    pub(crate) index: usize,
    pub(crate) ghost: u8,
}

#[async_trait]
impl Oracle for InconsistentOracle {
    async fn ask(&self, probe: &Probe) -> Result<Verdict, OracleError> {
        match probe.kind {
            ProbeKind::Boundary { threshold, index } if index == self.index => {
                if threshold == self.ghost {
                    Ok(Verdict::Reject)
                } else if threshold == self.ghost + 1 {
                    Ok(Verdict::Accept)
                } else {
                    self.inner.ask(probe).await
                }
            }
            _ => self.inner.ask(probe).await,
        }
    }
}
