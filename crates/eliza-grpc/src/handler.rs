//! The Eliza service contract, independent of the transport.
//!
//! Each operation receives a [`CallContext`] and its messages in plain Rust
//! types. Streaming responses are written to a [`ResponseSink`], which the
//! transport drains in order.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

use crate::context::CallContext;
use crate::procedure::{Procedure, SERVICE_NAME};
use crate::proto::{
    ConverseRequest, ConverseResponse, IntroduceRequest, IntroduceResponse, SayRequest,
    SayResponse,
};

/// Messages arriving from the client on a streaming call.
pub type InboundStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// The receiving half of a [`ResponseSink`], handed to the transport.
pub type ResponseStream<T> = ReceiverStream<Result<T, Status>>;

/// Writes response messages for a streaming call.
#[derive(Debug)]
pub struct ResponseSink<T> {
    tx: mpsc::Sender<Result<T, Status>>,
}

impl<T> Clone for ResponseSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ResponseSink<T> {
    /// Create a sink and the stream it feeds, buffering at most `capacity` messages.
    pub fn channel(capacity: usize) -> (Self, ResponseStream<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, ReceiverStream::new(rx))
    }

    /// Send one message, waiting for buffer space.
    ///
    /// Fails with `Cancelled` once the client has stopped listening.
    pub async fn send(&self, message: T) -> Result<(), Status> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| Status::cancelled("send response: client closed the stream"))
    }

    /// Terminate the stream with an error status.
    pub async fn fail(&self, status: Status) {
        // Nobody is left to tell if the receiver is gone.
        let _ = self.tx.send(Err(status)).await;
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// The operations a conversational Eliza service supports.
///
/// Every method has a default body that fails with `Unimplemented`, so an
/// implementation only overrides what it serves.
#[async_trait]
pub trait ElizaHandler: Send + Sync + 'static {
    /// Answer a single sentence. Must have no side effects.
    async fn say(&self, _ctx: CallContext, _request: SayRequest) -> Result<SayResponse, Status> {
        Err(unimplemented(Procedure::Say))
    }

    /// Reply to each inbound sentence with exactly one outbound sentence.
    ///
    /// Returning `Ok(())` ends the response stream cleanly.
    async fn converse(
        &self,
        _ctx: CallContext,
        _requests: InboundStream<ConverseRequest>,
        _responses: ResponseSink<ConverseResponse>,
    ) -> Result<(), Status> {
        Err(unimplemented(Procedure::Converse))
    }

    /// Stream an introduction to the named caller.
    async fn introduce(
        &self,
        _ctx: CallContext,
        _request: IntroduceRequest,
        _responses: ResponseSink<IntroduceResponse>,
    ) -> Result<(), Status> {
        Err(unimplemented(Procedure::Introduce))
    }
}

/// A handler that implements nothing: every operation fails with `Unimplemented`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedEliza;

impl ElizaHandler for UnimplementedEliza {}

fn unimplemented(procedure: Procedure) -> Status {
    Status::unimplemented(format!(
        "{}.{} is not implemented",
        SERVICE_NAME,
        procedure.method_name()
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_stream::StreamExt;
    use tonic::Code;

    use super::*;

    #[tokio::test]
    async fn test_unimplemented_say() {
        let status = UnimplementedEliza
            .say(
                CallContext::new(Procedure::Say),
                SayRequest {
                    sentence: "hello".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::Unimplemented);
        assert!(status.message().contains("ElizaService.Say"));
    }

    #[tokio::test]
    async fn test_unimplemented_streams_send_nothing() {
        let (sink, mut stream) = ResponseSink::channel(4);
        let status = UnimplementedEliza
            .converse(
                CallContext::new(Procedure::Converse),
                Box::pin(tokio_stream::empty::<Result<ConverseRequest, Status>>()),
                sink,
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
        assert!(stream.next().await.is_none());

        let (sink, mut stream) = ResponseSink::channel(4);
        let status = UnimplementedEliza
            .introduce(
                CallContext::new(Procedure::Introduce),
                IntroduceRequest::default(),
                sink,
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_cancelled() {
        let (sink, stream) = ResponseSink::<SayResponse>::channel(1);
        drop(stream);

        let status = sink.send(SayResponse::default()).await.unwrap_err();
        assert_eq!(status.code(), Code::Cancelled);
    }
}
