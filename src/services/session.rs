use super::{
    ledger::{EnsureInitialized, LedgerActor, RecordVote},
    timer::{CountdownActor, StopCountdown, SubscribeTicks, Tick},
    ContextId,
};
use crate::managers::{
    ledger::{LedgerError, VoteCounts},
    link::decode_link,
    poll::PollRecord,
    session::{SessionError, SessionState, VotingSession},
    timer::{Clock, SystemClock, TimerState},
};
use crate::span::SpanMessage;
use actix::prelude::*;
use actix_interop::{with_ctx, FutureInterop};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};
use tracing_futures::Instrument;

#[derive(Clone)]
pub struct SessionConfig {
    pub clock: Arc<dyn Clock>,
    pub tick_interval: Duration,
    /// Pause before a manual submit reaches the ledger, smoothing the UI transition.
    pub submit_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            tick_interval: Duration::from_secs(1),
            submit_delay: Duration::from_millis(200),
        }
    }
}

/// Everything a participant view needs to render.
#[derive(Message, Clone, Debug, PartialEq)]
#[rtype(result = "()")]
pub enum SessionEvent {
    Opened(PollRecord),
    NotFound { reason: String },
    Timer(TimerState),
    Selected { option_index: usize },
    Submitting { option_index: usize, automatic: bool },
    Voted {
        option_index: usize,
        option_name: String,
        vote_counts: VoteCounts,
    },
    SubmitFailed { reason: String, retry: bool },
    Expired,
}

#[derive(Message)]
#[rtype(result = "Result<(), SessionError>")]
pub struct Select(pub usize);

#[derive(Message)]
#[rtype(result = "()")]
pub struct SubmitVote;

#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub selected: Option<usize>,
    pub has_voted: bool,
}

#[derive(Message)]
#[rtype(result = "SessionStatus")]
pub struct CurrentSession;

/// One participant's voting flow. Owns its countdown and releases it when the
/// session reaches a terminal state or stops.
pub struct SessionActor {
    context: ContextId,
    record: Option<PollRecord>,
    missing_reason: String,
    machine: VotingSession,
    sink: Recipient<SessionEvent>,
    config: SessionConfig,
    countdown: Option<Addr<CountdownActor>>,
}

impl SessionActor {
    pub fn new(
        context: ContextId,
        record: PollRecord,
        sink: Recipient<SessionEvent>,
        config: SessionConfig,
    ) -> Self {
        Self {
            context,
            machine: VotingSession::new(record.option_count()),
            record: Some(record),
            missing_reason: String::new(),
            sink,
            config,
            countdown: None,
        }
    }

    /// Opens a share link. A link that can't be decoded gives a not-found session.
    pub fn open(
        context: ContextId,
        link: &str,
        sink: Recipient<SessionEvent>,
        config: SessionConfig,
    ) -> Self {
        match decode_link(link) {
            Ok(record) => Self::new(context, record, sink, config),
            Err(err) => {
                error!("Unable to open poll link: {}", err);
                Self {
                    context,
                    record: None,
                    missing_reason: err.to_string(),
                    machine: VotingSession::not_found(),
                    sink,
                    config,
                    countdown: None,
                }
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.sink.do_send(event) {
            warn!(context = self.context.as_string().as_str(), "Session sink unavailable: {}", err);
        }
    }

    fn release_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.do_send(StopCountdown);
        }
    }

    fn submit(&mut self, option_index: usize, delay: Duration, ctx: &mut Context<Self>) {
        let record = match &self.record {
            Some(record) => record,
            None => return,
        };
        let vote = RecordVote {
            poll_id: record.id().clone(),
            option_index,
            option_count: record.option_count(),
            option_name: record.option_name(option_index).map(str::to_owned),
            origin: self.context.clone(),
        };
        let span = info_span!(
            "submit_vote",
            poll_id = record.id().as_str(),
            option_index,
            context = self.context.as_string().as_str()
        );
        ctx.spawn(
            async move {
                if delay > Duration::from_millis(0) {
                    actix_rt::time::delay_for(delay).await;
                }
                let result = LedgerActor::from_registry().send(SpanMessage::new(vote)).await;
                let result = match result {
                    Ok(recorded) => recorded.map_err(|err: LedgerError| err.to_string()),
                    Err(err) => Err(format!("vote ledger unreachable: {}", err)),
                };
                // Same pause again between the write and the confirmation
                if result.is_ok() && delay > Duration::from_millis(0) {
                    actix_rt::time::delay_for(delay).await;
                }
                with_ctx(|act: &mut SessionActor, _| act.finish_submit(option_index, result))
            }
            .instrument(span)
            .interop_actor(self),
        );
    }

    fn finish_submit(&mut self, option_index: usize, result: Result<VoteCounts, String>) {
        match result {
            Ok(vote_counts) => {
                self.machine.submit_succeeded();
                info!(option_index, "Vote submission successful");
                let option_name = self
                    .record
                    .as_ref()
                    .and_then(|record| record.option_name(option_index))
                    .unwrap_or_default()
                    .to_owned();
                self.emit(SessionEvent::Voted {
                    option_index,
                    option_name,
                    vote_counts,
                });
                self.release_countdown();
            }
            Err(reason) => {
                error!(option_index, "Vote submission failed: {}", reason);
                self.machine.submit_failed();
                let retry = self.machine.state() == SessionState::Selecting;
                self.emit(SessionEvent::SubmitFailed { reason, retry });
                if self.machine.state() == SessionState::Expired {
                    self.emit(SessionEvent::Expired);
                }
            }
        }
    }
}

impl Actor for SessionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let record = match &self.record {
            Some(record) => record.clone(),
            None => {
                self.emit(SessionEvent::NotFound {
                    reason: self.missing_reason.clone(),
                });
                return;
            }
        };
        info!(
            poll_id = record.id().as_str(),
            duration = record.duration_seconds(),
            options = record.option_count(),
            "Voting session opened"
        );
        LedgerActor::from_registry().do_send(EnsureInitialized {
            poll_id: record.id().clone(),
            option_count: record.option_count(),
        });
        let countdown =
            CountdownActor::new(&record, self.config.clock.clone(), self.config.tick_interval).start();
        self.emit(SessionEvent::Opened(record));
        countdown.do_send(SubscribeTicks(ctx.address().recipient()));
        self.countdown = Some(countdown);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!(context = self.context.as_string().as_str(), "Voting session closed");
        self.release_countdown();
    }
}

impl Handler<Tick> for SessionActor {
    type Result = ();

    fn handle(&mut self, msg: Tick, ctx: &mut Context<Self>) -> Self::Result {
        let before = self.machine.state();
        if before.is_terminal() {
            return;
        }
        self.emit(SessionEvent::Timer(msg.state));
        if !msg.state.expired {
            return;
        }
        if let Some(option_index) = self.machine.expire() {
            info!(option_index, "Auto-submitting vote on timeout");
            self.emit(SessionEvent::Submitting {
                option_index,
                automatic: true,
            });
            self.submit(option_index, Duration::from_millis(0), ctx);
        } else if self.machine.state() == SessionState::Expired {
            info!("Poll expired without a selection");
            self.emit(SessionEvent::Expired);
        }
        self.release_countdown();
    }
}

impl Handler<Select> for SessionActor {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: Select, _ctx: &mut Context<Self>) -> Self::Result {
        self.machine.select(msg.0)?;
        debug!(option_index = msg.0, "Option selected");
        self.emit(SessionEvent::Selected { option_index: msg.0 });
        Ok(())
    }
}

impl Handler<SubmitVote> for SessionActor {
    type Result = ();

    fn handle(&mut self, _msg: SubmitVote, ctx: &mut Context<Self>) -> Self::Result {
        match self.machine.begin_submit() {
            Some(option_index) => {
                self.emit(SessionEvent::Submitting {
                    option_index,
                    automatic: false,
                });
                let delay = self.config.submit_delay;
                self.submit(option_index, delay, ctx);
            }
            None => debug!(state = ?self.machine.state(), "Ignoring submit"),
        }
    }
}

impl Handler<CurrentSession> for SessionActor {
    type Result = MessageResult<CurrentSession>;

    fn handle(&mut self, _msg: CurrentSession, _ctx: &mut Context<Self>) -> Self::Result {
        MessageResult(SessionStatus {
            state: self.machine.state(),
            selected: self.machine.selected(),
            has_voted: self.machine.has_voted(),
        })
    }
}

impl Handler<CloseSession> for SessionActor {
    type Result = ();

    fn handle(&mut self, _msg: CloseSession, ctx: &mut Context<Self>) -> Self::Result {
        ctx.stop();
    }
}
