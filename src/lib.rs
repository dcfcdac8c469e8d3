//! Compile-time array-bounds oracle.
//!
//! The judge compiles a client fragment with warnings as errors and answers
//! with one bit. The extractor turns those bits into the protected literal.

pub mod config;
pub mod extract;
pub mod io;
pub mod judge;
pub mod oracle;
pub mod payload;
pub mod protocol;
pub mod runtime;
pub mod telemetry;
