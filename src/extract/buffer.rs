use tokio::sync::oneshot;

use super::ExtractError;

/// Opening delimiter, always at index 0.
pub const OPEN_DELIMITER: u8 = b'{';
/// Closing delimiter, always at the last index.
pub const CLOSE_DELIMITER: u8 = b'}';

/// The secret being assembled.
///
/// Interior indices are handed out as [`Slot`]s, one per index. A slot is
/// move-only and consumed by [`Slot::fill`], so each index has exactly one
/// writer and no lock guards the buffer.
#[derive(Debug)]
pub struct SecretBuffer {
    bytes: Vec<u8>,
    pending: Vec<(usize, oneshot::Receiver<u8>)>,
}

/// Exclusive, write-once right to one interior index.
#[derive(Debug)]
pub struct Slot {
    index: usize,
    tx: oneshot::Sender<u8>,
}

impl Slot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn fill(self, byte: u8) {
        // The buffer outlives every worker; a closed receiver means the session
        // was abandoned and the byte has nowhere to go.
        let _ = self.tx.send(byte);
    }
}

impl SecretBuffer {
    /// Lay out a buffer of `len` bytes with both delimiters in place and one
    /// slot per interior index.
    pub fn partition(len: usize) -> Result<(Self, Vec<Slot>), ExtractError> {
        if len < 2 {
            return Err(ExtractError::TooShort(len));
        }
        let mut bytes = vec![0u8; len];
        bytes[0] = OPEN_DELIMITER;
        bytes[len - 1] = CLOSE_DELIMITER;

        let (pending, slots) = (1..len - 1)
            .map(|index| {
                let (tx, rx) = oneshot::channel();
                ((index, rx), Slot { index, tx })
            })
            .unzip();

        Ok((Self { bytes, pending }, slots))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Collect every slot. Call only after all workers have finished.
    pub fn into_secret(mut self) -> Result<Vec<u8>, ExtractError> {
        for (index, mut rx) in self.pending {
            self.bytes[index] = rx.try_recv().map_err(|_| ExtractError::SlotUnfilled(index))?;
        }
        Ok(self.bytes)
    }
}
