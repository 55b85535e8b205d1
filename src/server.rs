use crate::config::Config;
use crate::services::{
    broadcast::BroadcastActor, ledger::LedgerActor, mirror::MirrorActor, poll::PollService,
};
use crate::websocket;
use actix::prelude::*;
use actix::registry::SystemRegistry;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

async fn ws_route(
    req: HttpRequest,
    stream: web::Payload,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    ws::start(websocket::WsClient::new(config.get_ref().clone()), &req, stream)
}

/// The ledger publishes through the broadcast and mirror services, so those
/// have to be registered first.
pub fn register_system_actors(config: &Config) {
    SystemRegistry::set(MirrorActor::default().start());
    SystemRegistry::set(BroadcastActor::default().start());
    SystemRegistry::set(LedgerActor::default().start());
    SystemRegistry::set(PollService::new(config.poll_config()).start());
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // websocket
    cfg.data(config).service(web::resource("/ws/").to(ws_route));
}
