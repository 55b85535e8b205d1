use super::{
    broadcast::{BroadcastActor, Subscribe, Unsubscribe},
    ledger::{LedgerActor, Snapshot},
    mirror::{MirrorActor, MirrorChanged, Unwatch, Watch},
    ContextId, VoteUpdate,
};
use crate::managers::{
    ledger::VoteCounts,
    mirror::MirrorEntry,
    poll::{PollId, PollRecord},
    results::PollResults,
};
use actix::prelude::*;
use actix_interop::{with_ctx, FutureInterop};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Emitted whenever an observer sees a new snapshot of its poll.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct ResultsChanged {
    pub poll_id: PollId,
    pub vote_counts: VoteCounts,
    pub results: PollResults,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct StopObserving;

/// Live results view of one poll for one context. Listens on the broadcast and
/// mirror channels and re-reads the ledger on a fixed interval as a fallback.
pub struct ObserverActor {
    context: ContextId,
    record: PollRecord,
    sink: Recipient<ResultsChanged>,
    sync_interval: Duration,
    seen: Option<VoteCounts>,
    /// Bumped when the poll's counts are removed.
    resets: u64,
}

impl ObserverActor {
    pub fn new(
        context: ContextId,
        record: PollRecord,
        sink: Recipient<ResultsChanged>,
        sync_interval: Duration,
    ) -> Self {
        Self {
            context,
            record,
            sink,
            sync_interval,
            seen: None,
            resets: 0,
        }
    }

    fn apply(&mut self, counts: VoteCounts, source: &'static str) {
        if let Some(seen) = &self.seen {
            if *seen == counts {
                return;
            }
            if is_behind(&counts, seen) {
                debug!(source, "Ignoring stale vote counts");
                return;
            }
        }
        debug!(source, counts = ?counts, "Vote counts updated");
        let results = PollResults::tally(self.record.options(), &counts);
        self.seen = Some(counts.clone());
        let changed = ResultsChanged {
            poll_id: self.record.id().clone(),
            vote_counts: counts,
            results,
        };
        if let Err(err) = self.sink.do_send(changed) {
            warn!("Results sink unavailable: {}", err);
        }
    }

    fn refresh(&mut self, ctx: &mut Context<Self>) {
        let poll_id = self.record.id().clone();
        let resets = self.resets;
        ctx.spawn(
            async move {
                match LedgerActor::from_registry().send(Snapshot(poll_id)).await {
                    Ok(Some(counts)) => with_ctx(|act: &mut ObserverActor, _| {
                        // Drop reads started before a reset
                        if act.resets == resets {
                            act.apply(counts, "ledger");
                        }
                    }),
                    Ok(None) => debug!("No vote counts for poll yet"),
                    Err(err) => warn!("Ledger unreachable during sync: {}", err),
                }
            }
            .interop_actor(self),
        );
    }
}

/// Every counter at or below what was already shown, i.e. an older snapshot.
fn is_behind(candidate: &[u32], seen: &[u32]) -> bool {
    candidate.len() == seen.len() && candidate.iter().zip(seen).all(|(new, old)| new <= old)
}

impl Actor for ObserverActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let poll_id = self.record.id().clone();
        info!(
            poll_id = poll_id.as_str(),
            context = self.context.as_string().as_str(),
            "Observing poll"
        );
        BroadcastActor::from_registry().do_send(Subscribe {
            poll_id: poll_id.clone(),
            context: self.context.clone(),
            recipient: ctx.address().recipient(),
        });
        MirrorActor::from_registry().do_send(Watch {
            key: poll_id.mirror_key(),
            context: self.context.clone(),
            recipient: ctx.address().recipient(),
        });
        self.refresh(ctx);
        ctx.run_interval(self.sync_interval, |act, ctx| act.refresh(ctx));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let poll_id = self.record.id().clone();
        debug!(poll_id = poll_id.as_str(), "Observer stopped");
        MirrorActor::from_registry().do_send(Unwatch {
            key: poll_id.mirror_key(),
            context: self.context.clone(),
        });
        BroadcastActor::from_registry().do_send(Unsubscribe {
            poll_id,
            context: self.context.clone(),
        });
    }
}

impl Handler<VoteUpdate> for ObserverActor {
    type Result = ();

    fn handle(&mut self, msg: VoteUpdate, _ctx: &mut Context<Self>) -> Self::Result {
        if &msg.poll_id != self.record.id() {
            return;
        }
        self.apply(msg.vote_counts, "broadcast");
    }
}

impl Handler<MirrorChanged> for ObserverActor {
    type Result = ();

    fn handle(&mut self, msg: MirrorChanged, _ctx: &mut Context<Self>) -> Self::Result {
        if msg.key != self.record.id().mirror_key() {
            return;
        }
        let value = match msg.new_value {
            Some(value) => value,
            None => {
                // A reset starts the counts over, older snapshots are no longer stale
                debug!(key = msg.key.as_str(), "Mirror entry removed");
                self.seen = None;
                self.resets += 1;
                return;
            }
        };
        match serde_json::from_str::<MirrorEntry>(&value) {
            Ok(entry) => self.apply(entry.vote_counts, "mirror"),
            Err(err) => error!(key = msg.key.as_str(), "Unreadable mirror entry: {}", err),
        }
    }
}

impl Handler<StopObserving> for ObserverActor {
    type Result = ();

    fn handle(&mut self, _msg: StopObserving, ctx: &mut Context<Self>) -> Self::Result {
        ctx.stop();
    }
}
