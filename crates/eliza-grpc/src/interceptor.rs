//! Pass-through observation of incoming requests.
//!
//! [`Intercepted`] wraps any [`ElizaHandler`] and reports each inbound
//! request (unary) or each message received on a stream to an
//! [`Interceptor`]. Messages, responses, errors and ordering are left
//! untouched; removing the wrapper only removes the observations.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::StreamExt;
use tonic::Status;

use crate::context::CallContext;
use crate::handler::{ElizaHandler, InboundStream, ResponseSink};
use crate::proto::{
    ConverseRequest, ConverseResponse, IntroduceRequest, IntroduceResponse, SayRequest,
    SayResponse,
};

/// Observer invoked around every call.
pub trait Interceptor: Send + Sync + 'static {
    /// Called with the request of a unary call, before the handler runs.
    fn on_unary(&self, _ctx: &CallContext, _request: &dyn fmt::Debug) {}

    /// Called with each message received on a streaming call, as it is received.
    fn on_stream_message(&self, _ctx: &CallContext, _message: &dyn fmt::Debug) {}
}

/// Logs every request at debug level through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl Interceptor for RequestLogger {
    fn on_unary(&self, ctx: &CallContext, request: &dyn fmt::Debug) {
        let procedure = ctx.procedure();
        tracing::debug!(
            procedure = %procedure,
            idempotent = procedure.idempotent(),
            request = ?request,
            "unary_request"
        );
    }

    fn on_stream_message(&self, ctx: &CallContext, message: &dyn fmt::Debug) {
        let procedure = ctx.procedure();
        tracing::debug!(
            procedure = %procedure,
            kind = ?procedure.kind(),
            request = ?message,
            "streaming_request"
        );
    }
}

/// A handler wrapped with an [`Interceptor`].
#[derive(Debug)]
pub struct Intercepted<H, I> {
    inner: H,
    interceptor: Arc<I>,
}

impl<H, I> Intercepted<H, I> {
    /// Wrap `inner`, reporting its requests to `interceptor`.
    pub fn new(inner: H, interceptor: I) -> Self {
        Self {
            inner,
            interceptor: Arc::new(interceptor),
        }
    }
}

#[async_trait]
impl<H, I> ElizaHandler for Intercepted<H, I>
where
    H: ElizaHandler,
    I: Interceptor,
{
    async fn say(&self, ctx: CallContext, request: SayRequest) -> Result<SayResponse, Status> {
        self.interceptor.on_unary(&ctx, &request);
        self.inner.say(ctx, request).await
    }

    async fn converse(
        &self,
        ctx: CallContext,
        requests: InboundStream<ConverseRequest>,
        responses: ResponseSink<ConverseResponse>,
    ) -> Result<(), Status> {
        let interceptor = Arc::clone(&self.interceptor);
        let observed = ctx.clone();
        let requests = requests.map(move |item| {
            if let Ok(message) = &item {
                interceptor.on_stream_message(&observed, message);
            }
            item
        });
        self.inner.converse(ctx, Box::pin(requests), responses).await
    }

    async fn introduce(
        &self,
        ctx: CallContext,
        request: IntroduceRequest,
        responses: ResponseSink<IntroduceResponse>,
    ) -> Result<(), Status> {
        self.interceptor.on_stream_message(&ctx, &request);
        self.inner.introduce(ctx, request, responses).await
    }
}
