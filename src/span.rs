//! Carries the sender's tracing span across actor mailboxes, so a vote can be
//! followed from the websocket frame down to the ledger and its transports.

use actix::dev::MessageResponse;
use actix::prelude::*;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::Span;

/// Message wrapped together with the span it was sent from.
pub struct SpanMessage<I> {
    pub msg: I,
    pub span: Span,
}

impl<M> SpanMessage<M> {
    pub fn new(msg: M) -> Self {
        Self {
            msg,
            span: Span::current(),
        }
    }
}

impl<M, R: 'static> Message for SpanMessage<M>
where
    M: Message<Result = R>,
{
    type Result = R;
}

pub trait SpanHandler<M>
where
    Self: Actor,
    M: Message,
{
    type Result: MessageResponse<Self, M>;

    fn handle(&mut self, msg: M, ctx: &mut Self::Context, span: Span) -> Self::Result;
}

/// Enters `span` every time the wrapped actor future is polled.
#[pin_project]
#[derive(Debug)]
pub struct ActorFutureSpanWrap<F> {
    #[pin]
    inner: F,
    span: Span,
}

impl<F: ActorFuture> ActorFutureSpanWrap<F> {
    pub fn new(inner: F, span: Span) -> Self {
        Self { inner, span }
    }
}

impl<F: ActorFuture> ActorFuture for ActorFutureSpanWrap<F> {
    type Actor = F::Actor;
    type Output = F::Output;

    fn poll(
        self: Pin<&mut Self>,
        actor: &mut Self::Actor,
        ctx: &mut <Self::Actor as Actor>::Context,
        task: &mut Context,
    ) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll(actor, ctx, task)
    }
}

#[macro_export]
macro_rules! span_message_impl {
    ($message_type:ident, $actor:ident) => {
        impl Handler<crate::span::SpanMessage<$message_type>> for $actor {
            type Result = ResponseActFuture<Self, <$message_type as Message>::Result>;
            fn handle(
                &mut self,
                msg: crate::span::SpanMessage<$message_type>,
                ctx: &mut Context<Self>,
            ) -> Self::Result {
                let crate::span::SpanMessage { span, msg } = msg;
                let _enter = span.enter();
                tracing::trace!(message = stringify!($message_type), "Handling span message");
                Box::new(crate::span::ActorFutureSpanWrap::new(
                    <Self as SpanHandler<$message_type>>::handle(self, msg, ctx, span.clone()),
                    span.clone(),
                ))
            }
        }
    };
}

/// Implements `SpanHandler<M>` and the matching `Handler<SpanMessage<M>>`.
#[macro_export]
macro_rules! message_handler_with_span {
    (impl SpanHandler<$M:ident> for $A:ident $t:tt) => {
        crate::span_message_impl!($M, $A);
        impl SpanHandler<$M> for $A
            $t
    }
}
