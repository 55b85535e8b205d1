use crate::managers::{
    poll::{PollId, PollRecord},
    timer::{Clock, TimerState},
};
use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct Tick {
    pub poll_id: PollId,
    pub state: TimerState,
}

#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
pub struct SubscriptionId(u64);

/// Registers for ticks. The current state is delivered right away.
#[derive(Message)]
#[rtype(result = "SubscriptionId")]
pub struct SubscribeTicks(pub Recipient<Tick>);

#[derive(Message)]
#[rtype(result = "()")]
pub struct UnsubscribeTicks(pub SubscriptionId);

#[derive(Message)]
#[rtype(result = "TimerState")]
pub struct CurrentTimer;

#[derive(Message)]
#[rtype(result = "()")]
pub struct StopCountdown;

/// The single timer of one poll owner. Subscribers read the derived state
/// from here instead of doing their own clock math.
pub struct CountdownActor {
    poll_id: PollId,
    start: DateTime<Utc>,
    duration_seconds: u64,
    clock: Arc<dyn Clock>,
    interval: Duration,
    subscribers: HashMap<SubscriptionId, Recipient<Tick>>,
    next_subscription: u64,
    last: Option<TimerState>,
    interval_handle: Option<SpawnHandle>,
}

impl CountdownActor {
    pub fn new(record: &PollRecord, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            poll_id: record.id().clone(),
            start: record.start_time(),
            duration_seconds: record.duration_seconds(),
            clock,
            interval,
            subscribers: HashMap::new(),
            next_subscription: 0,
            last: None,
            interval_handle: None,
        }
    }

    fn current(&mut self) -> TimerState {
        let state = TimerState::at(self.clock.now(), self.start, self.duration_seconds).not_after(self.last);
        self.last = Some(state);
        state
    }

    fn tick(&mut self, ctx: &mut Context<Self>) {
        let state = self.current();
        let poll_id = self.poll_id.clone();
        self.subscribers.retain(|id, recipient| {
            let sent = recipient.do_send(Tick {
                poll_id: poll_id.clone(),
                state,
            });
            if sent.is_err() {
                warn!(subscription = id.0, "Dropping closed tick subscriber");
            }
            sent.is_ok()
        });
        if state.expired {
            if let Some(handle) = self.interval_handle.take() {
                ctx.cancel_future(handle);
                info!(poll_id = self.poll_id.as_str(), "Countdown finished");
            }
        }
    }
}

impl Actor for CountdownActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let state = self.current();
        debug!(
            poll_id = self.poll_id.as_str(),
            remaining = state.remaining_seconds,
            duration = state.duration_seconds,
            "Countdown started"
        );
        if !state.expired {
            self.interval_handle = Some(ctx.run_interval(self.interval, |act, ctx| act.tick(ctx)));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!(poll_id = self.poll_id.as_str(), "Countdown stopped");
    }
}

impl Handler<SubscribeTicks> for CountdownActor {
    type Result = MessageResult<SubscribeTicks>;

    fn handle(&mut self, msg: SubscribeTicks, _ctx: &mut Context<Self>) -> Self::Result {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        let state = self.current();
        let first = msg.0.do_send(Tick {
            poll_id: self.poll_id.clone(),
            state,
        });
        if first.is_ok() {
            self.subscribers.insert(id, msg.0);
        }
        MessageResult(id)
    }
}

impl Handler<UnsubscribeTicks> for CountdownActor {
    type Result = ();

    fn handle(&mut self, msg: UnsubscribeTicks, _ctx: &mut Context<Self>) -> Self::Result {
        self.subscribers.remove(&msg.0);
    }
}

impl Handler<CurrentTimer> for CountdownActor {
    type Result = MessageResult<CurrentTimer>;

    fn handle(&mut self, _msg: CurrentTimer, _ctx: &mut Context<Self>) -> Self::Result {
        MessageResult(self.current())
    }
}

impl Handler<StopCountdown> for CountdownActor {
    type Result = ();

    fn handle(&mut self, _msg: StopCountdown, ctx: &mut Context<Self>) -> Self::Result {
        self.subscribers.clear();
        ctx.stop();
    }
}
