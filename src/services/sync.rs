//! Sync bus: every recorded vote is pushed through all registered transports.
//! None of them is trusted alone; observers also poll the ledger, so a failed
//! transport costs at most one polling interval.

use super::{mirror::MirrorWrite, ContextId, VoteUpdate};
use crate::managers::mirror::{LastVote, MirrorEntry};
use actix::prelude::*;
use color_eyre::eyre::{eyre, Report, WrapErr};
use tracing::{debug, warn};

/// Vote update plus the bits transports need that are not part of the payload.
pub struct Publication<'a> {
    pub update: &'a VoteUpdate,
    pub origin: &'a ContextId,
    pub option_name: Option<&'a str>,
}

pub trait Transport {
    fn name(&self) -> &'static str;
    fn publish(&self, publication: &Publication<'_>) -> Result<(), Report>;
}

/// Same-process notification through the broadcast actor.
pub struct InProcessTransport {
    broadcast: Recipient<VoteUpdate>,
}

impl InProcessTransport {
    pub fn new(broadcast: Recipient<VoteUpdate>) -> Self {
        Self { broadcast }
    }
}

impl Transport for InProcessTransport {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn publish(&self, publication: &Publication<'_>) -> Result<(), Report> {
        self.broadcast
            .do_send(publication.update.clone())
            .map_err(|err| eyre!("broadcast mailbox unavailable: {}", err))
    }
}

/// Writes the snapshot to the persisted mirror; the mirror wakes other contexts.
pub struct MirrorTransport {
    mirror: Recipient<MirrorWrite>,
}

impl MirrorTransport {
    pub fn new(mirror: Recipient<MirrorWrite>) -> Self {
        Self { mirror }
    }
}

impl Transport for MirrorTransport {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn publish(&self, publication: &Publication<'_>) -> Result<(), Report> {
        let update = publication.update;
        let last_vote = match (update.option_index, publication.option_name) {
            (Some(option_index), Some(name)) => Some(LastVote {
                option_index,
                option_name: name.to_owned(),
            }),
            _ => None,
        };
        let entry = MirrorEntry {
            vote_counts: update.vote_counts.clone(),
            timestamp: update.timestamp,
            last_vote,
        };
        let value = serde_json::to_string(&entry).wrap_err("serializing mirror entry")?;
        self.mirror
            .do_send(MirrorWrite {
                key: update.poll_id.mirror_key(),
                value,
                origin: publication.origin.clone(),
            })
            .map_err(|err| eyre!("mirror mailbox unavailable: {}", err))
    }
}

#[derive(Default)]
pub struct SyncBus {
    transports: Vec<Box<dyn Transport>>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.register(transport);
        self
    }

    pub fn register(&mut self, transport: Box<dyn Transport>) {
        self.transports.push(transport);
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Returns how many transports accepted the update. Failures are logged only.
    pub fn publish(&self, publication: &Publication<'_>) -> usize {
        let mut delivered = 0;
        for transport in &self.transports {
            match transport.publish(publication) {
                Ok(()) => {
                    debug!(transport = transport.name(), "Vote update published");
                    delivered += 1;
                }
                Err(err) => {
                    warn!(
                        transport = transport.name(),
                        poll_id = publication.update.poll_id.as_str(),
                        "Failed to publish vote update: {:?}",
                        err
                    );
                }
            }
        }
        delivered
    }
}
