use crate::oracle::Oracle;
use crate::payload::PayloadCache;

use super::{Alphabet, ExtractError};

/// Does the secret byte at `index` equal `candidate`?
///
/// The boundary probe answers `secret[index] < threshold` and is monotonic in
/// the threshold, so `candidate` is the byte iff the probe rejects at
/// `candidate` and accepts at `candidate + 1`. When the first probe already
/// accepts the byte is below `candidate` and the second probe is skipped.
pub async fn crosses_at(
    oracle: &dyn Oracle,
    payloads: &PayloadCache,
    candidate: u8,
    index: usize,
) -> Result<bool, ExtractError> {
    let Some(successor) = candidate.checked_add(1) else {
        return Ok(false);
    };
    if oracle.ask(&payloads.boundary(candidate, index)).await?.is_accept() {
        return Ok(false);
    }
    Ok(oracle
        .ask(&payloads.boundary(successor, index))
        .await?
        .is_accept())
}

/// Recover the byte at `index` by scanning `alphabet` in order.
///
/// With `strict` set, the whole alphabet is scanned and a second crossing is
/// reported as [`ExtractError::AmbiguousCrossing`]; otherwise the first
/// crossing wins.
pub async fn discover_byte(
    oracle: &dyn Oracle,
    payloads: &PayloadCache,
    alphabet: &Alphabet,
    index: usize,
    strict: bool,
) -> Result<u8, ExtractError> {
    let mut found: Option<u8> = None;
    for &candidate in alphabet.as_bytes() {
        if !crosses_at(oracle, payloads, candidate, index).await? {
            continue;
        }
        tracing::debug!(index, candidate = %char::from(candidate), "crossing");
        match found {
            None if strict => found = Some(candidate),
            None => return Ok(candidate),
            Some(first) => {
                return Err(ExtractError::AmbiguousCrossing {
                    index,
                    first: char::from(first),
                    second: char::from(candidate),
                })
            }
        }
    }
    found.ok_or(ExtractError::AlphabetExhausted { index })
}
