//! Binds an [`ElizaHandler`] to the generated tonic service.
//!
//! Each streaming call is driven on its own task that feeds a bounded
//! channel backing the response stream. If the client stops listening the
//! call's context is cancelled and the handler is left to wind down. Every
//! call context is a child of one server-wide token, so cancelling that token
//! closes all open streams at once.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status, Streaming};

use crate::context::CallContext;
use crate::handler::{ElizaHandler, InboundStream, ResponseSink, ResponseStream};
use crate::procedure::Procedure;
use crate::proto::{
    self, ConverseRequest, ConverseResponse, IntroduceRequest, IntroduceResponse, SayRequest,
    SayResponse, eliza_service_server::ElizaServiceServer,
};

/// Messages buffered per response stream before the handler is made to wait.
const RESPONSE_BUFFER: usize = 16;

/// Exposes an [`ElizaHandler`] as the `connectrpc.eliza.v1.ElizaService` gRPC service.
#[derive(Debug)]
pub struct ElizaGrpc<H> {
    handler: Arc<H>,
    calls: CancellationToken,
}

impl<H> Clone for ElizaGrpc<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            calls: self.calls.clone(),
        }
    }
}

impl<H: ElizaHandler> ElizaGrpc<H> {
    /// Wrap a handler.
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            calls: CancellationToken::new(),
        }
    }

    /// Cancel every call, in flight or future, once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.calls = token;
        self
    }

    /// Build the tonic service, accepting and offering gzip.
    pub fn into_server(self) -> ElizaServiceServer<Self> {
        ElizaServiceServer::new(self)
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }
}

#[tonic::async_trait]
impl<H: ElizaHandler> proto::eliza_service_server::ElizaService for ElizaGrpc<H> {
    async fn say(&self, request: Request<SayRequest>) -> Result<Response<SayResponse>, Status> {
        let ctx = CallContext::from_metadata(Procedure::Say, request.metadata(), &self.calls);
        let response = self.handler.say(ctx, request.into_inner()).await?;
        Ok(Response::new(response))
    }

    type ConverseStream = ResponseStream<ConverseResponse>;

    async fn converse(
        &self,
        request: Request<Streaming<ConverseRequest>>,
    ) -> Result<Response<Self::ConverseStream>, Status> {
        let ctx =
            CallContext::from_metadata(Procedure::Converse, request.metadata(), &self.calls);
        let requests: InboundStream<ConverseRequest> = Box::pin(request.into_inner());
        let (sink, stream) = ResponseSink::channel(RESPONSE_BUFFER);

        let handler = Arc::clone(&self.handler);
        let call = {
            let ctx = ctx.clone();
            let sink = sink.clone();
            async move { handler.converse(ctx, requests, sink).await }
        };
        spawn_call(ctx, sink, call);

        Ok(Response::new(stream))
    }

    type IntroduceStream = ResponseStream<IntroduceResponse>;

    async fn introduce(
        &self,
        request: Request<IntroduceRequest>,
    ) -> Result<Response<Self::IntroduceStream>, Status> {
        let ctx =
            CallContext::from_metadata(Procedure::Introduce, request.metadata(), &self.calls);
        let request = request.into_inner();
        let (sink, stream) = ResponseSink::channel(RESPONSE_BUFFER);

        let handler = Arc::clone(&self.handler);
        let call = {
            let ctx = ctx.clone();
            let sink = sink.clone();
            async move { handler.introduce(ctx, request, sink).await }
        };
        spawn_call(ctx, sink, call);

        Ok(Response::new(stream))
    }
}

/// Run a streaming call to completion on its own task.
///
/// An error returned by the call becomes the terminal status of the stream.
/// Once the context is cancelled or its deadline passes the call is dropped
/// and the stream ends with that status, whether or not the handler noticed.
fn spawn_call<T, F>(ctx: CallContext, sink: ResponseSink<T>, call: F)
where
    T: Send + 'static,
    F: Future<Output = Result<(), Status>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = {
            let watch_client = async {
                sink.closed().await;
                tracing::debug!(procedure = %ctx.procedure(), "client stopped listening");
                ctx.cancel();
                std::future::pending::<Infallible>().await
            };
            tokio::select! {
                biased;
                result = call => result,
                never = watch_client => match never {},
                status = ctx.done() => Err(status),
            }
        };

        match result {
            Ok(()) => tracing::trace!(procedure = %ctx.procedure(), "stream finished"),
            Err(status) => {
                tracing::debug!(
                    procedure = %ctx.procedure(),
                    code = ?status.code(),
                    message = status.message(),
                    "stream failed"
                );
                sink.fail(status).await;
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio_stream::StreamExt;
    use tonic::Code;
    use tonic::server::NamedService;

    use super::*;
    use crate::handler::UnimplementedEliza;
    use crate::procedure::SERVICE_NAME;
    use crate::proto::eliza_service_server::ElizaService as _;

    /// Never finishes and never looks at its context.
    #[derive(Debug)]
    struct Stalled;

    #[tonic::async_trait]
    impl ElizaHandler for Stalled {
        async fn introduce(
            &self,
            _ctx: CallContext,
            _request: IntroduceRequest,
            _responses: ResponseSink<IntroduceResponse>,
        ) -> Result<(), Status> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_generated_service_name_matches_constant() {
        assert_eq!(
            <ElizaServiceServer<ElizaGrpc<UnimplementedEliza>> as NamedService>::NAME,
            SERVICE_NAME
        );
    }

    #[tokio::test]
    async fn test_shutdown_token_closes_stalled_stream() {
        let shutdown = CancellationToken::new();
        let grpc = ElizaGrpc::new(Stalled).with_shutdown(shutdown.clone());

        let mut stream = grpc
            .introduce(Request::new(IntroduceRequest::default()))
            .await
            .unwrap()
            .into_inner();

        shutdown.cancel();
        let item = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert_eq!(item.unwrap().unwrap_err().code(), Code::Cancelled);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_closes_stalled_stream() {
        let grpc = ElizaGrpc::new(Stalled);
        let mut request = Request::new(IntroduceRequest::default());
        request
            .metadata_mut()
            .insert("grpc-timeout", "100m".parse().unwrap());

        let mut stream = grpc.introduce(request).await.unwrap().into_inner();

        let status = stream.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::DeadlineExceeded);
    }
}
