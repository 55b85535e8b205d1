#![allow(dead_code)]

use actix::prelude::*;
use chrono::{TimeZone, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use livepoll_server::managers::{
    poll::{PollDraft, PollRecord},
    timer::ManualClock,
};
use livepoll_server::services::session::SessionConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const WAIT_MS: u64 = 2000;
pub const QUIET_MS: u64 = 200;

/// Forwards every message it receives into a channel the test can await.
pub struct Collector<M> {
    tx: UnboundedSender<M>,
}

impl<M> Actor for Collector<M>
where
    M: Message<Result = ()> + Send + 'static,
{
    type Context = Context<Self>;
}

impl<M> Handler<M> for Collector<M>
where
    M: Message<Result = ()> + Send + 'static,
{
    type Result = ();

    fn handle(&mut self, msg: M, _ctx: &mut Context<Self>) {
        let _ = self.tx.unbounded_send(msg);
    }
}

pub fn collector<M>() -> (Recipient<M>, UnboundedReceiver<M>)
where
    M: Message<Result = ()> + Send + 'static,
{
    let (tx, rx) = unbounded();
    let addr = Collector { tx }.start();
    (addr.recipient(), rx)
}

pub async fn next<M>(rx: &mut UnboundedReceiver<M>) -> M {
    timeout(Duration::from_millis(WAIT_MS), rx.next())
        .await
        .expect("timed out waiting for message")
        .expect("collector channel closed")
}

/// Skips messages until one matches.
pub async fn wait_for<M, F>(rx: &mut UnboundedReceiver<M>, mut matches: F) -> M
where
    F: FnMut(&M) -> bool,
{
    loop {
        let msg = next(rx).await;
        if matches(&msg) {
            return msg;
        }
    }
}

/// True when nothing matching arrives within `QUIET_MS`.
pub async fn stays_quiet<M, F>(rx: &mut UnboundedReceiver<M>, mut matches: F) -> bool
where
    F: FnMut(&M) -> bool,
{
    let wait = async {
        loop {
            match rx.next().await {
                Some(msg) if matches(&msg) => return,
                Some(_) => continue,
                None => futures::future::pending::<()>().await,
            }
        }
    };
    timeout(Duration::from_millis(QUIET_MS), wait).await.is_err()
}

pub fn manual_clock() -> ManualClock {
    ManualClock::new(Utc.ymd(2020, 5, 1).and_hms(12, 0, 0))
}

pub fn session_config(clock: &ManualClock) -> SessionConfig {
    SessionConfig {
        clock: Arc::new(clock.clone()),
        tick_interval: Duration::from_millis(20),
        submit_delay: Duration::from_millis(0),
    }
}

pub fn red_blue(clock: &ManualClock, duration_seconds: u64) -> PollRecord {
    use livepoll_server::managers::timer::Clock;
    PollRecord::create(
        PollDraft {
            prompt: "Favorite color?".to_owned(),
            options: vec!["Red".to_owned(), "Blue".to_owned()],
            duration_seconds,
        },
        clock.now(),
    )
    .unwrap()
}
