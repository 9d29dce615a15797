//! Server runner.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::transport::server::Router;
use tonic_health::ServingStatus;

use crate::config::ServerConfig;
use crate::interceptor::{Intercepted, RequestLogger};
use crate::procedure::SERVICE_NAME;
use crate::proto::FILE_DESCRIPTOR_SET;
use crate::service::ElizaService;
use crate::transport::ElizaGrpc;

/// How long closed calls get to flush their final status before the
/// server task is torn down.
const FORCED_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or inspecting the listener failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The gRPC transport failed
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    /// The reflection service could not load the descriptor set
    #[error("reflection error: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),
    /// The serving task panicked
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs the Eliza service alongside gRPC health checking and reflection.
#[derive(Debug)]
pub struct ElizaServer {
    config: ServerConfig,
}

impl ElizaServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `signal` resolves.
    ///
    /// Once `signal` fires no new calls are accepted. Calls still running
    /// after the configured grace period are cancelled, ending each with a
    /// `Cancelled` status.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr: SocketAddr = listener.local_addr()?;
        let calls = CancellationToken::new();
        let router = routes(&self.config, calls.clone()).await?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut serving = tokio::spawn(router.serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            async move {
                let _ = stop_rx.await;
            },
        ));

        tracing::info!(
            addr = %local_addr,
            stream_delay = ?self.config.stream_delay,
            "Server started"
        );

        tokio::select! {
            result = &mut serving => {
                result??;
                tracing::info!("gRPC server stopped");
                return Ok(());
            }
            () = signal => {}
        }

        tracing::info!(grace = ?self.config.shutdown_grace, "Draining in-flight calls");
        let _ = stop_tx.send(());

        if let Ok(result) = tokio::time::timeout(self.config.shutdown_grace, &mut serving).await {
            // No call outlives serve()
            calls.cancel();
            result??;
            tracing::info!("gRPC server shut down");
            return Ok(());
        }

        tracing::warn!("Grace period elapsed, cancelling remaining calls");
        calls.cancel();
        match tokio::time::timeout(FORCED_CLOSE_TIMEOUT, &mut serving).await {
            Ok(result) => result??,
            Err(_) => {
                tracing::warn!("Connections still open, dropping them");
                serving.abort();
            }
        }

        tracing::info!("gRPC server shut down");
        Ok(())
    }
}

async fn routes(config: &ServerConfig, calls: CancellationToken) -> Result<Router, ServerError> {
    let eliza = ElizaGrpc::new(Intercepted::new(
        ElizaService::new(config.stream_delay),
        RequestLogger,
    ))
    .with_shutdown(calls)
    .into_server();

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status(SERVICE_NAME, ServingStatus::Serving)
        .await;

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;
    let reflection_alpha = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1alpha()?;

    Ok(Server::builder()
        .add_service(health_service)
        .add_service(reflection)
        .add_service(reflection_alpha)
        .add_service(eliza))
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let signal = tokio::select! {
        () = interrupt() => "SIGINT",
        () = terminate() => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested, no longer accepting calls");
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
