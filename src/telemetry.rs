use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::Verdict;

static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);
static REQUESTS: AtomicU64 = AtomicU64::new(0);
static VERDICTS_ACCEPT: AtomicU64 = AtomicU64::new(0);
static VERDICTS_REJECT: AtomicU64 = AtomicU64::new(0);
static COMPILE_TIMEOUTS: AtomicU64 = AtomicU64::new(0);
static BAD_REQUESTS: AtomicU64 = AtomicU64::new(0);
static STRIPPED_CHARS: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JudgeSnapshot {
    pub active_connections: u64,
    pub requests: u64,
    pub verdicts_accept: u64,
    pub verdicts_reject: u64,
    pub compile_timeouts: u64,
    pub bad_requests: u64,
    pub stripped_chars: u64,
}

impl JudgeSnapshot {
    pub fn delta(self, prev: Self) -> Self {
        Self {
            active_connections: self
                .active_connections
                .saturating_sub(prev.active_connections),
            requests: self.requests.saturating_sub(prev.requests),
            verdicts_accept: self.verdicts_accept.saturating_sub(prev.verdicts_accept),
            verdicts_reject: self.verdicts_reject.saturating_sub(prev.verdicts_reject),
            compile_timeouts: self.compile_timeouts.saturating_sub(prev.compile_timeouts),
            bad_requests: self.bad_requests.saturating_sub(prev.bad_requests),
            stripped_chars: self.stripped_chars.saturating_sub(prev.stripped_chars),
        }
    }
}

pub(crate) fn record_request() {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_verdict(verdict: Verdict) {
    tracing::trace!(?verdict, "record_verdict");
    match verdict {
        Verdict::Accept => VERDICTS_ACCEPT.fetch_add(1, Ordering::Relaxed),
        Verdict::Reject => VERDICTS_REJECT.fetch_add(1, Ordering::Relaxed),
    };
}

pub(crate) fn record_compile_timeout() {
    COMPILE_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_bad_request() {
    BAD_REQUESTS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_stripped(count: usize) {
    if count == 0 {
        return;
    }
    STRIPPED_CHARS.fetch_add(count as u64, Ordering::Relaxed);
}

pub fn record_connection_open() {
    tracing::trace!("record_connection_open");
    ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_connection_close() {
    tracing::trace!("record_connection_close");
    ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed);
}

/// RAII guard for tracking an active connection.
pub struct ConnectionGuard;

impl ConnectionGuard {
    pub fn new() -> Self {
        record_connection_open();
        Self
    }
}

impl Default for ConnectionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        record_connection_close();
    }
}

pub fn judge_snapshot() -> JudgeSnapshot {
    JudgeSnapshot {
        active_connections: ACTIVE_CONNECTIONS.load(Ordering::Relaxed),
        requests: REQUESTS.load(Ordering::Relaxed),
        verdicts_accept: VERDICTS_ACCEPT.load(Ordering::Relaxed),
        verdicts_reject: VERDICTS_REJECT.load(Ordering::Relaxed),
        compile_timeouts: COMPILE_TIMEOUTS.load(Ordering::Relaxed),
        bad_requests: BAD_REQUESTS.load(Ordering::Relaxed),
        stripped_chars: STRIPPED_CHARS.load(Ordering::Relaxed),
    }
}
