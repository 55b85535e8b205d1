use super::{
    broadcast::BroadcastActor,
    mirror::MirrorActor,
    sync::{InProcessTransport, MirrorTransport, Publication, SyncBus},
    ContextId, VoteUpdate,
};
use crate::managers::{
    ledger::{InMemoryLedger, LedgerError, LedgerStore, VoteCounts},
    poll::PollId,
};
use crate::message_handler_with_span;
use crate::span::SpanHandler;
use actix::prelude::*;
use actix_interop::FutureInterop;
use chrono::Utc;
use tracing::{debug, info, warn, Span};

/// Creates the all-zero entry for a poll if no observer has yet.
#[derive(Message, Clone, Debug)]
#[rtype(result = "bool")]
pub struct EnsureInitialized {
    pub poll_id: PollId,
    pub option_count: usize,
}

/// Adds exactly one vote and fans the new snapshot out over the sync bus.
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<VoteCounts, LedgerError>")]
pub struct RecordVote {
    pub poll_id: PollId,
    pub option_index: usize,
    /// Used to rebuild a missing entry before counting.
    pub option_count: usize,
    pub option_name: Option<String>,
    pub origin: ContextId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<VoteCounts>")]
pub struct Snapshot(pub PollId);

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<VoteCounts>")]
pub struct Discard(pub PollId);

/// Owner of the vote ledger. Every context goes through this actor, so the
/// store sees one message at a time and needs no locking.
pub struct LedgerActor {
    store: Box<dyn LedgerStore>,
    bus: SyncBus,
}

impl LedgerActor {
    pub fn new(store: Box<dyn LedgerStore>, bus: SyncBus) -> Self {
        Self { store, bus }
    }

    /// Publishes through the broadcast and mirror services of the running system.
    pub fn with_default_transports(store: Box<dyn LedgerStore>) -> Self {
        let bus = SyncBus::new()
            .with_transport(Box::new(InProcessTransport::new(
                BroadcastActor::from_registry().recipient(),
            )))
            .with_transport(Box::new(MirrorTransport::new(
                MirrorActor::from_registry().recipient(),
            )));
        Self::new(store, bus)
    }

    fn record(&mut self, msg: RecordVote) -> Result<VoteCounts, LedgerError> {
        let RecordVote {
            poll_id,
            option_index,
            option_count,
            option_name,
            origin,
        } = msg;
        if self.store.get(&poll_id).is_none() {
            warn!(
                poll_id = poll_id.as_str(),
                "Vote for a poll without counts, initializing"
            );
            self.store.ensure_initialized(&poll_id, option_count);
        }
        let counts = self.store.increment(&poll_id, option_index)?;
        info!(
            poll_id = poll_id.as_str(),
            option_index,
            total = counts.iter().sum::<u32>(),
            "Vote recorded"
        );
        let update = VoteUpdate {
            poll_id,
            vote_counts: counts.clone(),
            option_index: Some(option_index),
            timestamp: Utc::now().timestamp_millis(),
        };
        let delivered = self.bus.publish(&Publication {
            update: &update,
            origin: &origin,
            option_name: option_name.as_deref(),
        });
        debug!(delivered, transports = self.bus.len(), "Vote update fanned out");
        Ok(counts)
    }
}

impl Default for LedgerActor {
    fn default() -> Self {
        Self::with_default_transports(Box::new(InMemoryLedger::default()))
    }
}

impl Actor for LedgerActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(transports = self.bus.len(), "Ledger actor started");
    }
}

impl Handler<EnsureInitialized> for LedgerActor {
    type Result = bool;

    fn handle(&mut self, msg: EnsureInitialized, _ctx: &mut Context<Self>) -> Self::Result {
        let created = self.store.ensure_initialized(&msg.poll_id, msg.option_count);
        if created {
            debug!(poll_id = msg.poll_id.as_str(), options = msg.option_count, "Initialized vote counts");
        } else {
            debug!(poll_id = msg.poll_id.as_str(), "Using existing vote counts");
        }
        created
    }
}

message_handler_with_span! {
    impl SpanHandler<RecordVote> for LedgerActor {
        type Result = ResponseActFuture<Self, <RecordVote as Message>::Result>;

        fn handle(&mut self, msg: RecordVote, _ctx: &mut Context<Self>, _span: Span) -> Self::Result {
            debug!("Ledger handling RecordVote");
            let result = self.record(msg);
            async move { result }.interop_actor_boxed(self)
        }
    }
}

impl Handler<Snapshot> for LedgerActor {
    type Result = Option<VoteCounts>;

    fn handle(&mut self, msg: Snapshot, _ctx: &mut Context<Self>) -> Self::Result {
        self.store.get(&msg.0)
    }
}

impl Handler<Discard> for LedgerActor {
    type Result = Option<VoteCounts>;

    fn handle(&mut self, msg: Discard, _ctx: &mut Context<Self>) -> Self::Result {
        let removed = self.store.remove(&msg.0);
        info!(poll_id = msg.0.as_str(), existed = removed.is_some(), "Discarded vote counts");
        removed
    }
}

impl SystemService for LedgerActor {}
impl Supervised for LedgerActor {}
