use crate::managers::{ledger::VoteCounts, poll::PollId};
use actix::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod broadcast;
pub mod ledger;
pub mod mirror;
pub mod observer;
pub mod poll;
pub mod session;
pub mod sync;
pub mod timer;

/// One independent observer of the ledger, e.g. a connected browser tab.
#[derive(Clone, Hash, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_string(&self) -> String {
        self.0.to_hyphenated().to_string()
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hyphenated())
    }
}

/// In-process notification sent after every recorded vote.
#[derive(Message, Clone, Debug, PartialEq, Eq, Serialize)]
#[rtype(result = "()")]
#[serde(rename_all = "camelCase")]
pub struct VoteUpdate {
    pub poll_id: PollId,
    pub vote_counts: VoteCounts,
    pub option_index: Option<usize>,
    pub timestamp: i64,
}
