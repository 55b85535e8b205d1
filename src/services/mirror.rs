use super::ContextId;
use crate::managers::mirror::{KeyValueStore, MemoryStore};
use actix::prelude::*;
use color_eyre::eyre::Report;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Change notification for a mirrored key. Never delivered to the writer.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct MirrorChanged {
    pub key: String,
    pub new_value: Option<String>,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), Report>")]
pub struct MirrorWrite {
    pub key: String,
    pub value: String,
    pub origin: ContextId,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<String>")]
pub struct MirrorRead(pub String);

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<String>")]
pub struct MirrorRemove {
    pub key: String,
    pub origin: Option<ContextId>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Watch {
    pub key: String,
    pub context: ContextId,
    pub recipient: Recipient<MirrorChanged>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unwatch {
    pub key: String,
    pub context: ContextId,
}

/// Persisted key-value mirror shared by all contexts, with storage-event style
/// change notifications.
pub struct MirrorActor {
    store: Box<dyn KeyValueStore>,
    watchers: HashMap<String, HashMap<ContextId, Recipient<MirrorChanged>>>,
}

impl MirrorActor {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            watchers: HashMap::new(),
        }
    }

    fn notify(&mut self, key: &str, new_value: Option<String>, origin: Option<&ContextId>) {
        let watchers = match self.watchers.get_mut(key) {
            Some(watchers) => watchers,
            None => return,
        };
        let mut gone = Vec::new();
        for (context, recipient) in watchers.iter() {
            if Some(context) == origin {
                continue;
            }
            let changed = MirrorChanged {
                key: key.to_owned(),
                new_value: new_value.clone(),
            };
            if let Err(err) = recipient.do_send(changed) {
                warn!(key, context = context.as_string().as_str(), "Dropping mirror watcher: {}", err);
                gone.push(context.clone());
            }
        }
        for context in gone {
            watchers.remove(&context);
        }
    }
}

impl Default for MirrorActor {
    fn default() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }
}

impl Actor for MirrorActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Mirror actor started");
    }
}

impl Handler<MirrorWrite> for MirrorActor {
    type Result = Result<(), Report>;

    fn handle(&mut self, msg: MirrorWrite, _ctx: &mut Context<Self>) -> Self::Result {
        let MirrorWrite { key, value, origin } = msg;
        debug!(key = key.as_str(), "Writing mirror entry");
        self.store.set(&key, value.clone()).map_err(|err| {
            warn!(key = key.as_str(), "Mirror write failed: {}", err);
            err
        })?;
        self.notify(&key, Some(value), Some(&origin));
        Ok(())
    }
}

impl Handler<MirrorRead> for MirrorActor {
    type Result = Option<String>;

    fn handle(&mut self, msg: MirrorRead, _ctx: &mut Context<Self>) -> Self::Result {
        self.store.get(&msg.0)
    }
}

impl Handler<MirrorRemove> for MirrorActor {
    type Result = Option<String>;

    fn handle(&mut self, msg: MirrorRemove, _ctx: &mut Context<Self>) -> Self::Result {
        debug!(key = msg.key.as_str(), "Removing mirror entry");
        let removed = self.store.remove(&msg.key);
        if removed.is_some() {
            self.notify(&msg.key, None, msg.origin.as_ref());
        }
        removed
    }
}

impl Handler<Watch> for MirrorActor {
    type Result = ();

    fn handle(&mut self, msg: Watch, _ctx: &mut Context<Self>) -> Self::Result {
        self.watchers
            .entry(msg.key)
            .or_default()
            .insert(msg.context, msg.recipient);
    }
}

impl Handler<Unwatch> for MirrorActor {
    type Result = ();

    fn handle(&mut self, msg: Unwatch, _ctx: &mut Context<Self>) -> Self::Result {
        if let Some(watchers) = self.watchers.get_mut(&msg.key) {
            watchers.remove(&msg.context);
            if watchers.is_empty() {
                self.watchers.remove(&msg.key);
            }
        }
    }
}

impl SystemService for MirrorActor {}
impl Supervised for MirrorActor {}
