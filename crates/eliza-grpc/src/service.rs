//! The Eliza service implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::StreamExt;
use tonic::Status;

use crate::context::CallContext;
use crate::handler::{ElizaHandler, InboundStream, ResponseSink};
use crate::proto::{
    ConverseRequest, ConverseResponse, IntroduceRequest, IntroduceResponse, SayRequest,
    SayResponse,
};

/// Name used to introduce Eliza when the caller gives none.
pub const ANONYMOUS_NAME: &str = "Anonymous User";

/// Eliza, served over RPC.
#[derive(Debug, Clone, Default)]
pub struct ElizaService {
    stream_delay: Duration,
}

impl ElizaService {
    /// Create a service that waits `stream_delay` between streamed introduction messages.
    pub fn new(stream_delay: Duration) -> Self {
        Self { stream_delay }
    }
}

#[async_trait]
impl ElizaHandler for ElizaService {
    async fn say(&self, _ctx: CallContext, request: SayRequest) -> Result<SayResponse, Status> {
        // End-of-conversation only means something on a stream.
        let reply = eliza::reply(&request.sentence);
        Ok(SayResponse {
            sentence: reply.sentence,
        })
    }

    async fn converse(
        &self,
        ctx: CallContext,
        mut requests: InboundStream<ConverseRequest>,
        responses: ResponseSink<ConverseResponse>,
    ) -> Result<(), Status> {
        loop {
            if let Some(status) = ctx.err() {
                return Err(status);
            }

            let request = tokio::select! {
                biased;
                status = ctx.done() => return Err(status),
                next = requests.next() => match next {
                    Some(Ok(request)) => request,
                    Some(Err(status)) => {
                        return Err(Status::new(
                            status.code(),
                            format!("receive request: {}", status.message()),
                        ));
                    }
                    None => return Ok(()),
                },
            };

            let reply = eliza::reply(&request.sentence);
            responses
                .send(ConverseResponse {
                    sentence: reply.sentence,
                })
                .await?;

            if reply.end_conversation {
                tracing::debug!(procedure = %ctx.procedure(), "conversation ended by Eliza");
                return Ok(());
            }
        }
    }

    async fn introduce(
        &self,
        ctx: CallContext,
        request: IntroduceRequest,
        responses: ResponseSink<IntroduceResponse>,
    ) -> Result<(), Status> {
        let name = if request.name.is_empty() {
            ANONYMOUS_NAME
        } else {
            request.name.as_str()
        };

        for (i, sentence) in eliza::introductions(name).into_iter().enumerate() {
            if i > 0 && !self.stream_delay.is_zero() {
                tokio::select! {
                    biased;
                    status = ctx.done() => return Err(status),
                    () = tokio::time::sleep(self.stream_delay) => {}
                }
            }
            responses.send(IntroduceResponse { sentence }).await?;
        }
        Ok(())
    }
}
