use super::poll::PollId;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// One counter per poll option, in option order.
pub type VoteCounts = Vec<u32>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No vote counts exist for poll {0}")]
    UnknownPoll(PollId),
    #[error("Option {index} is outside the {len} counters of poll {poll_id}")]
    OptionOutOfRange {
        poll_id: PollId,
        index: usize,
        len: usize,
    },
}

/// Storage behind the vote ledger. Counters only ever grow until the entry is
/// removed, and `get` hands out copies so callers can't touch shared state.
pub trait LedgerStore {
    fn get(&self, poll_id: &PollId) -> Option<VoteCounts>;

    /// Creates an all-zero entry if none exists. Returns `true` when it did.
    fn ensure_initialized(&mut self, poll_id: &PollId, option_count: usize) -> bool;

    fn increment(&mut self, poll_id: &PollId, option_index: usize) -> Result<VoteCounts, LedgerError>;

    fn remove(&mut self, poll_id: &PollId) -> Option<VoteCounts>;
}

#[derive(Default, Debug)]
pub struct InMemoryLedger {
    entries: HashMap<PollId, VoteCounts>,
}

impl LedgerStore for InMemoryLedger {
    fn get(&self, poll_id: &PollId) -> Option<VoteCounts> {
        self.entries.get(poll_id).cloned()
    }

    fn ensure_initialized(&mut self, poll_id: &PollId, option_count: usize) -> bool {
        match self.entries.get(poll_id) {
            Some(existing) => {
                if existing.len() != option_count {
                    // Existing entry wins; a stale link may show a different option list
                    warn!(
                        poll_id = poll_id.as_str(),
                        existing = existing.len(),
                        requested = option_count,
                        "Vote counts already exist with a different option count"
                    );
                }
                false
            }
            None => {
                self.entries.insert(poll_id.clone(), vec![0; option_count]);
                true
            }
        }
    }

    fn increment(&mut self, poll_id: &PollId, option_index: usize) -> Result<VoteCounts, LedgerError> {
        let counts = self
            .entries
            .get_mut(poll_id)
            .ok_or_else(|| LedgerError::UnknownPoll(poll_id.clone()))?;
        let len = counts.len();
        let counter = counts
            .get_mut(option_index)
            .ok_or_else(|| LedgerError::OptionOutOfRange {
                poll_id: poll_id.clone(),
                index: option_index,
                len,
            })?;
        *counter += 1;
        Ok(counts.clone())
    }

    fn remove(&mut self, poll_id: &PollId) -> Option<VoteCounts> {
        self.entries.remove(poll_id)
    }
}
