use super::{ContextId, VoteUpdate};
use crate::managers::poll::PollId;
use actix::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub poll_id: PollId,
    pub context: ContextId,
    pub recipient: Recipient<VoteUpdate>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub poll_id: PollId,
    pub context: ContextId,
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct SubscriberCount(pub PollId);

/// Same-process fan-out of vote updates to every subscribed context of a poll.
#[derive(Default)]
pub struct BroadcastActor {
    subscribers: HashMap<PollId, HashMap<ContextId, Recipient<VoteUpdate>>>,
}

impl Actor for BroadcastActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Broadcast actor started");
    }
}

impl Handler<Subscribe> for BroadcastActor {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Context<Self>) -> Self::Result {
        debug!(
            poll_id = msg.poll_id.as_str(),
            context = msg.context.as_string().as_str(),
            "Adding subscriber to broadcast"
        );
        self.subscribers
            .entry(msg.poll_id)
            .or_default()
            .insert(msg.context, msg.recipient);
    }
}

impl Handler<Unsubscribe> for BroadcastActor {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Context<Self>) -> Self::Result {
        debug!(
            poll_id = msg.poll_id.as_str(),
            context = msg.context.as_string().as_str(),
            "Removing subscriber from broadcast"
        );
        if let Some(subscribers) = self.subscribers.get_mut(&msg.poll_id) {
            subscribers.remove(&msg.context);
            if subscribers.is_empty() {
                self.subscribers.remove(&msg.poll_id);
            }
        }
    }
}

impl Handler<SubscriberCount> for BroadcastActor {
    type Result = usize;

    fn handle(&mut self, msg: SubscriberCount, _ctx: &mut Context<Self>) -> Self::Result {
        self.subscribers.get(&msg.0).map_or(0, HashMap::len)
    }
}

impl Handler<VoteUpdate> for BroadcastActor {
    type Result = ();

    fn handle(&mut self, msg: VoteUpdate, _ctx: &mut Context<Self>) -> Self::Result {
        let subscribers = match self.subscribers.get_mut(&msg.poll_id) {
            Some(subscribers) => subscribers,
            None => {
                debug!(poll_id = msg.poll_id.as_str(), "No subscribers for vote update");
                return;
            }
        };
        debug!(
            poll_id = msg.poll_id.as_str(),
            clients = subscribers.len(),
            "Broadcasting vote update"
        );
        let mut gone = Vec::new();
        for (context, recipient) in subscribers.iter() {
            if let Err(err) = recipient.do_send(msg.clone()) {
                warn!(
                    context = context.as_string().as_str(),
                    "Dropping broadcast subscriber: {}", err
                );
                gone.push(context.clone());
            }
        }
        for context in gone {
            subscribers.remove(&context);
        }
    }
}

impl SystemService for BroadcastActor {}
impl Supervised for BroadcastActor {}
