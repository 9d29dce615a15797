//! Eliza gRPC Server
//!
//! Runs Eliza as a gRPC server with health checking and reflection.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use eliza_grpc::{Args, ElizaServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Request logging is emitted at debug level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("eliza_grpc=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.into_config()?;

    ElizaServer::new(config).run().await?;

    Ok(())
}
