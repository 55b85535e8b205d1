//! Per-participant voting flow.
//!
//! ```text
//! Selecting --submit--> Submitting --ok--> Voted
//!     |  ^                  |
//!     |  +-----failed-------+
//!     +--expired, nothing selected--> Expired
//! NotFound (no usable poll definition)
//! ```
//!
//! The machine never touches the ledger itself; it only says when a vote may
//! be sent and for which option.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Selecting,
    Submitting,
    Voted,
    Expired,
    NotFound,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        match self {
            SessionState::Voted | SessionState::Expired | SessionState::NotFound => true,
            SessionState::Selecting | SessionState::Submitting => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Option {index} does not exist, the poll has {count} options")]
    NoSuchOption { index: usize, count: usize },
    #[error("Voting has ended")]
    Expired,
    #[error("A vote was already recorded in this session")]
    AlreadyVoted,
    #[error("A vote is being submitted")]
    Busy,
    #[error("Poll not found")]
    NotFound,
}

#[derive(Debug, Clone)]
pub struct VotingSession {
    state: SessionState,
    selected: Option<usize>,
    has_voted: bool,
    expired: bool,
    option_count: usize,
}

impl VotingSession {
    pub fn new(option_count: usize) -> Self {
        Self {
            state: SessionState::Selecting,
            selected: None,
            has_voted: false,
            expired: false,
            option_count,
        }
    }

    pub fn not_found() -> Self {
        Self {
            state: SessionState::NotFound,
            ..Self::new(0)
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn select(&mut self, index: usize) -> Result<(), SessionError> {
        match self.state {
            SessionState::NotFound => return Err(SessionError::NotFound),
            SessionState::Voted => return Err(SessionError::AlreadyVoted),
            SessionState::Expired => return Err(SessionError::Expired),
            SessionState::Submitting => return Err(SessionError::Busy),
            SessionState::Selecting => {}
        }
        if self.expired {
            return Err(SessionError::Expired);
        }
        if index >= self.option_count {
            return Err(SessionError::NoSuchOption {
                index,
                count: self.option_count,
            });
        }
        self.selected = Some(index);
        Ok(())
    }

    /// Moves to `Submitting` and returns the option to record, or `None` when
    /// the submit must be ignored (nothing selected, expired, voted, in flight).
    pub fn begin_submit(&mut self) -> Option<usize> {
        if self.state != SessionState::Selecting || self.expired || self.has_voted {
            return None;
        }
        let index = self.selected?;
        self.state = SessionState::Submitting;
        Some(index)
    }

    pub fn submit_succeeded(&mut self) {
        if self.state == SessionState::Submitting {
            self.has_voted = true;
            self.state = SessionState::Voted;
        }
    }

    /// The ledger could not be reached. Voting may be retried unless time ran out meanwhile.
    pub fn submit_failed(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = if self.expired {
                SessionState::Expired
            } else {
                SessionState::Selecting
            };
        }
    }

    /// Applies the one-way expiry edge. Returns the option to auto-submit
    /// when a selection exists and no vote has been recorded yet.
    pub fn expire(&mut self) -> Option<usize> {
        if self.expired {
            return None;
        }
        self.expired = true;
        match self.state {
            SessionState::Selecting => match self.selected {
                Some(index) => {
                    self.state = SessionState::Submitting;
                    Some(index)
                }
                None => {
                    self.state = SessionState::Expired;
                    None
                }
            },
            // An in-flight submit finishes on its own
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_records_selection_once() {
        let mut session = VotingSession::new(2);
        assert_eq!(session.begin_submit(), None);
        session.select(0).unwrap();
        session.select(1).unwrap();
        assert_eq!(session.begin_submit(), Some(1));
        assert_eq!(session.state(), SessionState::Submitting);
        // Double click while in flight
        assert_eq!(session.begin_submit(), None);
        assert_eq!(session.select(0), Err(SessionError::Busy));
        session.submit_succeeded();
        assert_eq!(session.state(), SessionState::Voted);
        assert!(session.has_voted());
        assert_eq!(session.begin_submit(), None);
        assert_eq!(session.select(0), Err(SessionError::AlreadyVoted));
        assert_eq!(session.expire(), None);
        assert_eq!(session.state(), SessionState::Voted);
    }

    #[test]
    fn failed_submit_can_be_retried() {
        let mut session = VotingSession::new(2);
        session.select(0).unwrap();
        assert_eq!(session.begin_submit(), Some(0));
        session.submit_failed();
        assert_eq!(session.state(), SessionState::Selecting);
        assert!(!session.has_voted());
        assert_eq!(session.begin_submit(), Some(0));
    }

    #[test]
    fn expiry_without_selection_is_terminal() {
        let mut session = VotingSession::new(2);
        assert_eq!(session.expire(), None);
        assert_eq!(session.state(), SessionState::Expired);
        assert!(session.state().is_terminal());
        assert_eq!(session.select(0), Err(SessionError::Expired));
        assert_eq!(session.begin_submit(), None);
    }

    #[test]
    fn expiry_with_selection_auto_submits() {
        let mut session = VotingSession::new(3);
        session.select(2).unwrap();
        assert_eq!(session.expire(), Some(2));
        assert_eq!(session.state(), SessionState::Submitting);
        assert_eq!(session.expire(), None);
        // A manual submit racing the auto submit is ignored
        assert_eq!(session.begin_submit(), None);
        session.submit_succeeded();
        assert_eq!(session.state(), SessionState::Voted);
    }

    #[test]
    fn expiry_during_submit_lets_it_finish() {
        let mut session = VotingSession::new(2);
        session.select(1).unwrap();
        session.begin_submit();
        assert_eq!(session.expire(), None);
        assert_eq!(session.state(), SessionState::Submitting);
        session.submit_failed();
        assert_eq!(session.state(), SessionState::Expired);
    }

    #[test]
    fn rejects_unknown_option_and_missing_poll() {
        let mut session = VotingSession::new(2);
        assert_eq!(
            session.select(5),
            Err(SessionError::NoSuchOption { index: 5, count: 2 })
        );
        let mut missing = VotingSession::not_found();
        assert_eq!(missing.select(0), Err(SessionError::NotFound));
        assert_eq!(missing.begin_submit(), None);
        assert_eq!(missing.expire(), None);
        assert_eq!(missing.state(), SessionState::NotFound);
    }
}
