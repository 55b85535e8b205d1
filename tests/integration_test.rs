extern crate livepoll_server;
use actix_codec::Framed;
use actix_http::ws::Codec;
use actix_web::{test, App};
use actix_web_actors::ws;
use futures::{SinkExt, StreamExt};
use insta::assert_snapshot;
use livepoll_server::managers::session::SessionState;
use livepoll_server::{config::Config, server, websocket};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use websocket::{IncomingCreate, IncomingMessage, IncomingOpen, IncomingSelect, OutgoingMessage};

const READ_TIMEOUT_MS: u64 = 2000;
const MAX_FRAMES: usize = 50;

/// Skips frames of other types, e.g. interleaved timer ticks.
macro_rules! frame_message_type {
    ($framed:expr, $message_type:path) => {{
        let mut found = None;
        for _ in 0..MAX_FRAMES {
            match read_message(&mut $framed)
                .await
                .expect("Unable to read ws frame")
            {
                $message_type(message) => {
                    found = Some(message);
                    break;
                }
                _ => continue,
            }
        }
        found.expect("Expected frame type never arrived")
    }};
}

async fn read_message(
    framed: &mut Framed<impl AsyncRead + AsyncWrite, Codec>,
) -> Option<OutgoingMessage> {
    let frame = timeout(Duration::from_millis(READ_TIMEOUT_MS), framed.next()).await;
    match frame.ok()??.unwrap() {
        ws::Frame::Text(item) => Some(serde_json::from_slice(&item[..]).unwrap()),
        _ => None,
    }
}

async fn send_message(
    framed: &mut Framed<impl AsyncRead + AsyncWrite, Codec>,
    message: &IncomingMessage,
) {
    let message = serde_json::to_string(message).unwrap();
    framed.send(ws::Message::Text(message)).await.unwrap();
}

fn start_server() -> test::TestServer {
    test::start(move || {
        let mut config = Config::default();
        config.submit_delay = Duration::from_millis(0);
        config.sync_interval = Duration::from_millis(100);
        server::register_system_actors(&config);
        App::new().configure(move |app| server::configure(app, config))
    })
}

fn create_message() -> IncomingMessage {
    IncomingMessage::Create(IncomingCreate {
        voting_prompt: "Favorite color?".to_owned(),
        options: vec!["Red".to_owned(), "Blue".to_owned()],
        duration: 60,
    })
}

#[actix_rt::test]
async fn test_vote_reaches_organizer() {
    let mut srv = start_server();

    let mut organizer = srv.ws_at("/ws/").await.unwrap();
    send_message(&mut organizer, &create_message()).await;
    let poll = frame_message_type!(organizer, OutgoingMessage::Poll);
    assert_eq!(poll.poll.voting_prompt, "Favorite color?");
    assert!(poll.share_link.contains("?poll="));
    assert!(poll.qr_url.ends_with(&livepoll_server::managers::link::encode_component(&poll.share_link)));
    let initial = frame_message_type!(organizer, OutgoingMessage::Results);
    assert_eq!(initial.vote_counts, vec![0, 0]);
    assert_eq!(initial.winner, None);

    let mut participant = srv.ws_at("/ws/").await.unwrap();
    send_message(
        &mut participant,
        &IncomingMessage::Open(IncomingOpen {
            link: poll.share_link.clone(),
        }),
    )
    .await;
    let opened = frame_message_type!(participant, OutgoingMessage::Poll);
    assert_eq!(opened.poll.poll_id, poll.poll.poll_id);
    let session = frame_message_type!(participant, OutgoingMessage::Session);
    assert_eq!(session.state, SessionState::Selecting);

    send_message(
        &mut participant,
        &IncomingMessage::Select(IncomingSelect { option_index: 1 }),
    )
    .await;
    let session = frame_message_type!(participant, OutgoingMessage::Session);
    assert_eq!(session.selected_option, Some(1));

    send_message(&mut participant, &IncomingMessage::Submit).await;
    let voted = frame_message_type!(participant, OutgoingMessage::Voted);
    assert_snapshot!(serde_json::to_string(&voted).unwrap(), @r###"{"optionIndex":1,"optionName":"Blue"}"###);

    let results = frame_message_type!(organizer, OutgoingMessage::Results);
    assert_eq!(results.vote_counts, vec![0, 1]);
    assert_eq!(results.total_votes, 1);
    assert_eq!(results.winner.as_deref(), Some("Blue"));

    send_message(&mut organizer, &IncomingMessage::Reset).await;
    let reset = frame_message_type!(organizer, OutgoingMessage::Reset);
    assert_eq!(reset.poll_id, poll.poll.poll_id);
}

#[actix_rt::test]
async fn test_bad_link_is_not_found() {
    let mut srv = start_server();
    let mut participant = srv.ws_at("/ws/").await.unwrap();
    send_message(
        &mut participant,
        &IncomingMessage::Open(IncomingOpen {
            link: "http://localhost:8080/?poll=nope".to_owned(),
        }),
    )
    .await;

    let session = frame_message_type!(participant, OutgoingMessage::Session);
    assert_eq!(session.state, SessionState::NotFound);
    let error = frame_message_type!(participant, OutgoingMessage::Error);
    assert!(!error.retry);
}

#[actix_rt::test]
async fn test_invalid_poll_is_rejected() {
    let mut srv = start_server();
    let mut organizer = srv.ws_at("/ws/").await.unwrap();
    send_message(
        &mut organizer,
        &IncomingMessage::Create(IncomingCreate {
            voting_prompt: "   ".to_owned(),
            options: vec!["Red".to_owned(), "Blue".to_owned()],
            duration: 60,
        }),
    )
    .await;

    let error = frame_message_type!(organizer, OutgoingMessage::Error);
    assert!(error.retry);
}

#[actix_rt::test]
async fn test_malformed_frame_keeps_connection() {
    let mut srv = start_server();
    let mut framed = srv.ws_at("/ws/").await.unwrap();
    framed
        .send(ws::Message::Text("{\"type\":\"vote\"}".to_owned()))
        .await
        .unwrap();
    let error = frame_message_type!(framed, OutgoingMessage::Error);
    assert!(error.message.starts_with("malformed message"));

    // Still usable afterwards
    send_message(&mut framed, &create_message()).await;
    frame_message_type!(framed, OutgoingMessage::Poll);

    framed
        .send(ws::Message::Close(Some(ws::CloseCode::Normal.into())))
        .await
        .unwrap();
    let mut closed = false;
    for _ in 0..MAX_FRAMES {
        let item = timeout(Duration::from_millis(READ_TIMEOUT_MS), framed.next())
            .await
            .expect("timeout")
            .unwrap()
            .unwrap();
        if item == ws::Frame::Close(Some(ws::CloseCode::Normal.into())) {
            closed = true;
            break;
        }
    }
    assert!(closed);
}
