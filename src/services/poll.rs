use super::{
    ledger::{Discard, EnsureInitialized, LedgerActor, Snapshot},
    mirror::{MirrorActor, MirrorRemove},
    timer::{CountdownActor, StopCountdown, SubscribeTicks, Tick},
};
use crate::managers::{
    link::{encode_link, qr_image_url},
    poll::{PollDraft, PollId, PollRecord},
    timer::{Clock, SystemClock},
};
use actix::prelude::*;
use actix_interop::FutureInterop;
use color_eyre::eyre::{Report, WrapErr};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct PollConfig {
    /// Origin share links point at.
    pub public_url: String,
    /// QR image service, the encoded link is appended.
    pub qr_endpoint: String,
    pub clock: Arc<dyn Clock>,
    pub tick_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8080".to_owned(),
            qr_endpoint: "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=".to_owned(),
            clock: Arc::new(SystemClock),
            tick_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    Voting,
    Results,
}

#[derive(Clone)]
pub struct CreatedPoll {
    pub record: PollRecord,
    pub share_link: String,
    pub qr_url: String,
    pub countdown: Addr<CountdownActor>,
}

/// Mints a poll and starts its countdown. `replaces` is the organizer's
/// previous poll, which is discarded first.
#[derive(Message)]
#[rtype(result = "Result<CreatedPoll, Report>")]
pub struct CreatePoll {
    pub draft: PollDraft,
    pub replaces: Option<PollId>,
}

/// Cancels the countdown and throws the poll's counts away, ledger and mirror alike.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct ResetPoll(pub PollId);

/// The organizer went away. Stops the countdown but keeps the counts, so
/// participants still on the link can vote.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct ReleasePoll(pub PollId);

#[derive(Message)]
#[rtype(result = "Option<PollPhase>")]
pub struct PhaseOf(pub PollId);

struct ActivePoll {
    countdown: Addr<CountdownActor>,
    phase: PollPhase,
}

/// Organizer side of the poll lifecycle: voting until the countdown expires,
/// then results until reset.
pub struct PollService {
    config: PollConfig,
    active: HashMap<PollId, ActivePoll>,
}

impl PollService {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
        }
    }

    fn cancel_countdown(&mut self, poll_id: &PollId) -> bool {
        match self.active.remove(poll_id) {
            Some(active) => {
                debug!(poll_id = poll_id.as_str(), "Cancelling countdown");
                active.countdown.do_send(StopCountdown);
                true
            }
            None => false,
        }
    }

    /// Stops the countdown and drops the counts from the ledger and the mirror.
    fn discard(&mut self, poll_id: &PollId) -> bool {
        let was_active = self.cancel_countdown(poll_id);
        LedgerActor::from_registry().do_send(Discard(poll_id.clone()));
        MirrorActor::from_registry().do_send(MirrorRemove {
            key: poll_id.mirror_key(),
            origin: None,
        });
        was_active
    }

    fn create(&mut self, msg: CreatePoll, ctx: &mut Context<Self>) -> Result<CreatedPoll, Report> {
        if let Some(previous) = &msg.replaces {
            self.discard(previous);
        }
        let record = PollRecord::create(msg.draft, self.config.clock.now())?;
        let share_link = encode_link(&self.config.public_url, &record).wrap_err("encoding share link")?;
        let qr_url = qr_image_url(&self.config.qr_endpoint, &share_link);

        LedgerActor::from_registry().do_send(EnsureInitialized {
            poll_id: record.id().clone(),
            option_count: record.option_count(),
        });
        let countdown =
            CountdownActor::new(&record, self.config.clock.clone(), self.config.tick_interval).start();
        countdown.do_send(SubscribeTicks(ctx.address().recipient()));
        info!(
            poll_id = record.id().as_str(),
            duration = record.duration_seconds(),
            options = record.option_count(),
            "Starting new poll"
        );
        self.active.insert(
            record.id().clone(),
            ActivePoll {
                countdown: countdown.clone(),
                phase: PollPhase::Voting,
            },
        );
        Ok(CreatedPoll {
            record,
            share_link,
            qr_url,
            countdown,
        })
    }
}

impl Default for PollService {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

impl Actor for PollService {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Poll service started");
    }
}

#[instrument]
async fn log_final_counts(poll_id: PollId) {
    match LedgerActor::from_registry().send(Snapshot(poll_id)).await {
        Ok(Some(counts)) => info!(counts = ?counts, "Final vote counts"),
        Ok(None) => warn!("Poll ended without vote counts"),
        Err(err) => warn!("Ledger unreachable at poll end: {}", err),
    }
}

impl Handler<CreatePoll> for PollService {
    type Result = Result<CreatedPoll, Report>;

    fn handle(&mut self, msg: CreatePoll, ctx: &mut Context<Self>) -> Self::Result {
        self.create(msg, ctx)
    }
}

impl Handler<Tick> for PollService {
    type Result = ();

    fn handle(&mut self, msg: Tick, ctx: &mut Context<Self>) -> Self::Result {
        if !msg.state.expired {
            return;
        }
        let active = match self.active.get_mut(&msg.poll_id) {
            Some(active) => active,
            None => return,
        };
        if active.phase == PollPhase::Results {
            return;
        }
        active.phase = PollPhase::Results;
        info!(poll_id = msg.poll_id.as_str(), "Poll ended, switching to results");
        ctx.spawn(log_final_counts(msg.poll_id).interop_actor(self));
    }
}

impl Handler<ResetPoll> for PollService {
    type Result = bool;

    fn handle(&mut self, msg: ResetPoll, _ctx: &mut Context<Self>) -> Self::Result {
        let ResetPoll(poll_id) = msg;
        info!(poll_id = poll_id.as_str(), "Resetting poll");
        self.discard(&poll_id)
    }
}

impl Handler<ReleasePoll> for PollService {
    type Result = bool;

    fn handle(&mut self, msg: ReleasePoll, _ctx: &mut Context<Self>) -> Self::Result {
        let ReleasePoll(poll_id) = msg;
        let released = self.cancel_countdown(&poll_id);
        if released {
            info!(poll_id = poll_id.as_str(), "Organizer left, releasing poll");
        }
        released
    }
}

impl Handler<PhaseOf> for PollService {
    type Result = Option<PollPhase>;

    fn handle(&mut self, msg: PhaseOf, _ctx: &mut Context<Self>) -> Self::Result {
        self.active.get(&msg.0).map(|active| active.phase)
    }
}

impl SystemService for PollService {}
impl Supervised for PollService {}
