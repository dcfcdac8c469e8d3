//! Runtime components for the spawnable judge server.
//!
//! The `judge` binary and the integration tests share this code path.

mod judge;

pub use judge::{JudgeConfig, JudgeHandle};
