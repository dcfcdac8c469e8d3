use crate::oracle::Oracle;
use crate::payload::PayloadCache;
use crate::protocol::Verdict;

use super::ExtractError;

/// Default upper bound on the secret length.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Find the length of the secret literal.
///
/// A literal of visible length `L` has `L + 1` addressable bytes because of its
/// NUL terminator: probes `0..=L` accept and `L + 1` is the first reject, so
/// the length is one less than the first rejected index.
pub async fn discover_length(
    oracle: &dyn Oracle,
    payloads: &PayloadCache,
    max_length: usize,
) -> Result<usize, ExtractError> {
    for size in 0..=max_length.saturating_add(1) {
        let verdict = oracle.ask(&payloads.length(size)).await?;
        tracing::debug!(size, ?verdict, "length probe");
        if verdict == Verdict::Reject {
            if size == 0 {
                return Err(ExtractError::NoSecret);
            }
            let length = size - 1;
            tracing::info!(length, "secret length found");
            return Ok(length);
        }
    }
    Err(ExtractError::LengthUnbounded(max_length))
}
