//! Eliza CLI - talk to an Eliza gRPC server
//!
//! Usage:
//!   eliza say "I need a holiday"     Send one sentence
//!   eliza introduce John             Stream Eliza's introduction
//!   eliza converse                   Chat line by line from stdin

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use eliza_grpc::{ConverseRequest, ElizaServiceClient, IntroduceRequest, SayRequest};

/// Eliza CLI - talk to a 1960s psychotherapist over gRPC
#[derive(Parser, Debug)]
#[command(name = "eliza")]
#[command(about = "Command-line client for the Eliza gRPC server")]
struct Cli {
    /// Server endpoint
    #[arg(long, default_value = "http://localhost:8082")]
    endpoint: String,

    /// Give up on a call after this many seconds (streams included)
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a single sentence and print the reply
    Say {
        /// What to say
        sentence: String,
    },
    /// Print Eliza's introduction as it streams in
    Introduce {
        /// Your name
        #[arg(default_value = "")]
        name: String,
    },
    /// Hold a conversation, one line of stdin per sentence
    Converse,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep stdout for the conversation
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let cli = Cli::parse();
    let timeout = cli.timeout_secs.map(Duration::from_secs);

    let mut client = ElizaServiceClient::connect(cli.endpoint.clone())
        .await
        .with_context(|| format!("failed to connect to {}", cli.endpoint))?;

    match cli.command {
        Command::Say { sentence } => say(&mut client, sentence, timeout).await,
        Command::Introduce { name } => introduce(&mut client, name, timeout).await,
        Command::Converse => converse(&mut client, timeout).await,
    }
}

fn request<T>(message: T, timeout: Option<Duration>) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    request
}

async fn say(
    client: &mut ElizaServiceClient<Channel>,
    sentence: String,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let response = client
        .say(request(SayRequest { sentence }, timeout))
        .await
        .context("say failed")?;
    println!("{}", response.into_inner().sentence);
    Ok(())
}

async fn introduce(
    client: &mut ElizaServiceClient<Channel>,
    name: String,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let mut stream = client
        .introduce(request(IntroduceRequest { name }, timeout))
        .await
        .context("introduce failed")?
        .into_inner();

    while let Some(response) = stream.message().await.context("introduce stream failed")? {
        println!("{}", response.sentence);
    }
    Ok(())
}

async fn converse(
    client: &mut ElizaServiceClient<Channel>,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel::<ConverseRequest>(1);
    let mut replies = client
        .converse(request(ReceiverStream::new(rx), timeout))
        .await
        .context("converse failed")?
        .into_inner();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let sentence = line.trim().to_string();
        if sentence.is_empty() {
            continue;
        }

        if tx.send(ConverseRequest { sentence }).await.is_err() {
            break;
        }
        match replies.message().await.context("converse stream failed")? {
            Some(reply) => println!("{}", reply.sentence),
            // Eliza ended the conversation
            None => return Ok(()),
        }
    }

    drop(tx);
    // Drain anything still in flight after stdin closed
    while let Some(reply) = replies.message().await.context("converse stream failed")? {
        println!("{}", reply.sentence);
    }
    Ok(())
}
