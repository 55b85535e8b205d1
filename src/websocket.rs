use crate::config::Config;
use crate::managers::{
    link::{encode_link, qr_image_url, LinkPayload},
    poll::{PollDraft, PollId, PollRecord},
    results::RankedOption,
    session::SessionState,
    timer::{ClockDisplay, TimerState},
};
use crate::services::{
    observer::{ObserverActor, ResultsChanged, StopObserving},
    poll::{CreatePoll, CreatedPoll, PollService, ReleasePoll, ResetPoll},
    session::{CloseSession, Select, SessionActor, SessionEvent, SubmitVote},
    timer::{SubscribeTicks, Tick},
    ContextId,
};
use actix::prelude::*;
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::{debug, error, info, info_span, warn};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCreate {
    pub voting_prompt: String,
    pub options: Vec<String>,
    /// Seconds.
    pub duration: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct IncomingOpen {
    pub link: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IncomingSelect {
    pub option_index: usize,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    #[serde(rename = "create")]
    Create(IncomingCreate),
    #[serde(rename = "open")]
    Open(IncomingOpen),
    #[serde(rename = "select")]
    Select(IncomingSelect),
    #[serde(rename = "submit")]
    Submit,
    #[serde(rename = "reset")]
    Reset,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPoll {
    pub poll: LinkPayload,
    pub share_link: String,
    pub qr_url: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingTimer {
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub duration_seconds: u64,
    pub progress_percentage: f64,
    /// Remaining time as `m:ss`.
    pub display: String,
    pub expired: bool,
}

impl From<TimerState> for OutgoingTimer {
    fn from(state: TimerState) -> Self {
        OutgoingTimer {
            elapsed_seconds: state.elapsed_seconds,
            remaining_seconds: state.remaining_seconds,
            duration_seconds: state.duration_seconds,
            progress_percentage: state.progress_percentage(),
            display: ClockDisplay(state.remaining_seconds).to_string(),
            expired: state.expired,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingResults {
    pub poll_id: PollId,
    pub vote_counts: Vec<u32>,
    pub ranked: Vec<RankedOption>,
    pub total_votes: u32,
    pub winner: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingSession {
    pub state: SessionState,
    pub selected_option: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingVoted {
    pub option_index: usize,
    pub option_name: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPollRef {
    pub poll_id: PollId,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct OutgoingError {
    pub message: String,
    pub retry: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "poll")]
    Poll(OutgoingPoll),
    #[serde(rename = "timer")]
    Timer(OutgoingTimer),
    #[serde(rename = "results")]
    Results(OutgoingResults),
    #[serde(rename = "session")]
    Session(OutgoingSession),
    #[serde(rename = "voted")]
    Voted(OutgoingVoted),
    #[serde(rename = "finished")]
    Finished(OutgoingPollRef),
    #[serde(rename = "reset")]
    Reset(OutgoingPollRef),
    #[serde(rename = "error")]
    Error(OutgoingError),
}

enum Role {
    Idle,
    Organizer {
        poll_id: PollId,
        observer: Addr<ObserverActor>,
        finished: bool,
    },
    Participant {
        session: Addr<SessionActor>,
        record: Option<PollRecord>,
        observer: Option<Addr<ObserverActor>>,
    },
}

impl Role {
    fn leave(self) {
        match self {
            Role::Idle => {}
            Role::Organizer {
                poll_id, observer, ..
            } => {
                observer.do_send(StopObserving);
                PollService::from_registry().do_send(ReleasePoll(poll_id));
            }
            Role::Participant {
                session, observer, ..
            } => {
                session.do_send(CloseSession);
                if let Some(observer) = observer {
                    observer.do_send(StopObserving);
                }
            }
        }
    }
}

/// One browser tab. Acts as organizer after `create` and as participant after `open`.
pub struct WsClient {
    context: ContextId,
    config: Config,
    role: Role,
}

impl WsClient {
    pub fn new(config: Config) -> WsClient {
        WsClient {
            context: ContextId::new(),
            config,
            role: Role::Idle,
        }
    }

    fn send_json<T: Serialize>(&self, ctx: &mut ws::WebsocketContext<Self>, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => ctx.text(json),
            Err(err) => error!("Failed to convert to JSON {}", err),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, message: String, retry: bool) {
        self.send_json(ctx, &OutgoingMessage::Error(OutgoingError { message, retry }));
    }

    fn send_session(
        &self,
        ctx: &mut ws::WebsocketContext<Self>,
        state: SessionState,
        selected_option: Option<usize>,
    ) {
        self.send_json(
            ctx,
            &OutgoingMessage::Session(OutgoingSession {
                state,
                selected_option,
            }),
        );
    }

    fn observe(&self, record: PollRecord, ctx: &mut ws::WebsocketContext<Self>) -> Addr<ObserverActor> {
        ObserverActor::new(
            self.context.clone(),
            record,
            ctx.address().recipient(),
            self.config.sync_interval,
        )
        .start()
    }

    fn create(&mut self, create: IncomingCreate, ctx: &mut ws::WebsocketContext<Self>) {
        let replaces = match &self.role {
            Role::Organizer { poll_id, .. } => Some(poll_id.clone()),
            _ => None,
        };
        let draft = PollDraft {
            prompt: create.voting_prompt,
            options: create.options,
            duration_seconds: create.duration,
        };
        PollService::from_registry()
            .send(CreatePoll { draft, replaces })
            .into_actor(self)
            .map(|res, act, ctx| match res {
                Ok(Ok(created)) => act.start_organizing(created, ctx),
                Ok(Err(err)) => {
                    warn!("Rejected poll: {}", err);
                    act.send_error(ctx, err.to_string(), true);
                }
                Err(err) => {
                    error!("Poll service unreachable: {}", err);
                    act.send_error(ctx, "poll service unavailable".to_owned(), true);
                }
            })
            .wait(ctx);
    }

    fn start_organizing(&mut self, created: CreatedPoll, ctx: &mut ws::WebsocketContext<Self>) {
        let CreatedPoll {
            record,
            share_link,
            qr_url,
            countdown,
        } = created;
        mem::replace(&mut self.role, Role::Idle).leave();
        info!(poll_id = record.id().as_str(), "Organizing poll");
        self.send_json(
            ctx,
            &OutgoingMessage::Poll(OutgoingPoll {
                poll: LinkPayload::from(&record),
                share_link,
                qr_url,
            }),
        );
        let poll_id = record.id().clone();
        let observer = self.observe(record, ctx);
        countdown.do_send(SubscribeTicks(ctx.address().recipient()));
        self.role = Role::Organizer {
            poll_id,
            observer,
            finished: false,
        };
    }

    fn open(&mut self, open: IncomingOpen, ctx: &mut ws::WebsocketContext<Self>) {
        mem::replace(&mut self.role, Role::Idle).leave();
        let session = SessionActor::open(
            self.context.clone(),
            &open.link,
            ctx.address().recipient(),
            self.config.session_config(),
        )
        .start();
        self.role = Role::Participant {
            session,
            record: None,
            observer: None,
        };
    }

    fn select(&mut self, select: IncomingSelect, ctx: &mut ws::WebsocketContext<Self>) {
        let session = match &self.role {
            Role::Participant { session, .. } => session.clone(),
            _ => return self.send_error(ctx, "no poll is open".to_owned(), false),
        };
        session
            .send(Select(select.option_index))
            .into_actor(self)
            .map(|res, act, ctx| match res {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!("Selection rejected: {}", err);
                    act.send_error(ctx, err.to_string(), false);
                }
                Err(err) => error!("Voting session unreachable: {}", err),
            })
            .spawn(ctx);
    }

    fn submit(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        match &self.role {
            Role::Participant { session, .. } => session.do_send(SubmitVote),
            _ => self.send_error(ctx, "no poll is open".to_owned(), false),
        }
    }

    fn reset(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        match mem::replace(&mut self.role, Role::Idle) {
            Role::Organizer {
                poll_id, observer, ..
            } => {
                observer.do_send(StopObserving);
                PollService::from_registry().do_send(ResetPoll(poll_id.clone()));
                self.send_json(ctx, &OutgoingMessage::Reset(OutgoingPollRef { poll_id }));
            }
            other => {
                self.role = other;
                self.send_error(ctx, "only the organizer can reset a poll".to_owned(), false);
            }
        }
    }

    /// Participants see live results once their vote is in or the poll ended.
    fn observe_after_vote(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let record = match &self.role {
            Role::Participant {
                record: Some(record),
                observer: None,
                ..
            } => record.clone(),
            _ => return,
        };
        let started = self.observe(record, ctx);
        if let Role::Participant { observer, .. } = &mut self.role {
            *observer = Some(started);
        }
    }
}

impl Actor for WsClient {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(context = %self.context, "New ws client");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(context = %self.context, "Ws client left");
        mem::replace(&mut self.role, Role::Idle).leave();
    }
}

// Incoming messages from ws
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsClient {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let span = info_span!("ws_message", context = %self.context);
        let _enter = span.enter();
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<IncomingMessage>(&text) {
                Ok(IncomingMessage::Create(create)) => {
                    debug!("Incoming create");
                    self.create(create, ctx);
                }
                Ok(IncomingMessage::Open(open)) => {
                    debug!("Incoming open");
                    self.open(open, ctx);
                }
                Ok(IncomingMessage::Select(select)) => {
                    debug!(option_index = select.option_index, "Incoming select");
                    self.select(select, ctx);
                }
                Ok(IncomingMessage::Submit) => {
                    debug!("Incoming submit");
                    self.submit(ctx);
                }
                Ok(IncomingMessage::Reset) => {
                    debug!("Incoming reset");
                    self.reset(ctx);
                }
                Err(err) => {
                    warn!("Malformed message: {}", err);
                    self.send_error(ctx, format!("malformed message: {}", err), false);
                }
            },
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                debug!("Got close message from WS. Reason: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(message) => warn!("Client sent something else than text: {:?}", message),
            Err(err) => error!("ProtocolError in StreamHandler {:?}", err),
        }
    }
}

impl Handler<ResultsChanged> for WsClient {
    type Result = ();

    fn handle(&mut self, msg: ResultsChanged, ctx: &mut Self::Context) {
        let winner = msg.results.winner().map(|winner| winner.name.clone());
        self.send_json(
            ctx,
            &OutgoingMessage::Results(OutgoingResults {
                poll_id: msg.poll_id,
                vote_counts: msg.vote_counts,
                ranked: msg.results.ranked,
                total_votes: msg.results.total_votes,
                winner,
            }),
        );
    }
}

impl Handler<Tick> for WsClient {
    type Result = ();

    fn handle(&mut self, msg: Tick, ctx: &mut Self::Context) {
        let just_finished = match &mut self.role {
            Role::Organizer {
                poll_id, finished, ..
            } => {
                if *poll_id != msg.poll_id {
                    return;
                }
                let just_finished = msg.state.expired && !*finished;
                *finished = *finished || msg.state.expired;
                just_finished
            }
            _ => return,
        };
        self.send_json(ctx, &OutgoingMessage::Timer(msg.state.into()));
        if just_finished {
            self.send_json(
                ctx,
                &OutgoingMessage::Finished(OutgoingPollRef {
                    poll_id: msg.poll_id,
                }),
            );
        }
    }
}

impl Handler<SessionEvent> for WsClient {
    type Result = ();

    fn handle(&mut self, msg: SessionEvent, ctx: &mut Self::Context) {
        match msg {
            SessionEvent::Opened(opened) => {
                match encode_link(&self.config.public_url, &opened) {
                    Ok(share_link) => {
                        let qr_url = qr_image_url(&self.config.qr_endpoint, &share_link);
                        self.send_json(
                            ctx,
                            &OutgoingMessage::Poll(OutgoingPoll {
                                poll: LinkPayload::from(&opened),
                                share_link,
                                qr_url,
                            }),
                        );
                    }
                    Err(err) => error!("Failed to encode share link: {}", err),
                }
                self.send_session(ctx, SessionState::Selecting, None);
                if let Role::Participant { record, .. } = &mut self.role {
                    *record = Some(opened);
                }
            }
            SessionEvent::NotFound { reason } => {
                self.send_session(ctx, SessionState::NotFound, None);
                self.send_error(ctx, reason, false);
            }
            SessionEvent::Timer(state) => {
                self.send_json(ctx, &OutgoingMessage::Timer(state.into()));
            }
            SessionEvent::Selected { option_index } => {
                self.send_session(ctx, SessionState::Selecting, Some(option_index));
            }
            SessionEvent::Submitting { option_index, .. } => {
                self.send_session(ctx, SessionState::Submitting, Some(option_index));
            }
            SessionEvent::Voted {
                option_index,
                option_name,
                ..
            } => {
                self.send_session(ctx, SessionState::Voted, Some(option_index));
                self.send_json(
                    ctx,
                    &OutgoingMessage::Voted(OutgoingVoted {
                        option_index,
                        option_name,
                    }),
                );
                self.observe_after_vote(ctx);
            }
            SessionEvent::SubmitFailed { reason, retry } => {
                self.send_error(ctx, reason, retry);
            }
            SessionEvent::Expired => {
                self.send_session(ctx, SessionState::Expired, None);
                self.observe_after_vote(ctx);
            }
        }
    }
}
