//! Eliza gRPC Server
//!
//! Serves the Eliza conversational agent as the
//! `connectrpc.eliza.v1.ElizaService` gRPC service, with three call shapes:
//!
//! - `Say`: unary. One sentence in, one sentence out.
//! - `Converse`: bidirectional streaming. One reply per inbound sentence,
//!   until the client closes its side or Eliza says goodbye.
//! - `Introduce`: server streaming. A fixed introduction, optionally paced
//!   by a delay between messages.
//!
//! # Architecture
//!
//! The contract lives in [`ElizaHandler`], written against plain message
//! types, a [`CallContext`] and a [`ResponseSink`]. [`ElizaService`] is the
//! implementation; [`Intercepted`] decorates any handler with an
//! [`Interceptor`] such as [`RequestLogger`]; [`ElizaGrpc`] binds a handler
//! to the generated tonic service.
//!
//! ```text
//! tonic ──> ElizaGrpc ──> Intercepted<_, RequestLogger> ──> ElizaService
//!   ^                                                           │
//!   └──────────────── ResponseSink (ordered, bounded) ──────────┘
//! ```

pub mod proto {
    #![allow(missing_docs)]
    #![allow(clippy::doc_markdown)]
    tonic::include_proto!("connectrpc.eliza.v1");

    /// Encoded descriptors for the Eliza protos, served by gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("eliza_descriptor");
}

mod config;
mod context;
mod handler;
mod interceptor;
mod procedure;
mod server;
mod service;
mod transport;

pub use config::{Args, ConfigError, DEFAULT_ADDR, ServerConfig, parse_duration};
pub use context::CallContext;
pub use handler::{ElizaHandler, InboundStream, ResponseSink, ResponseStream, UnimplementedEliza};
pub use interceptor::{Intercepted, Interceptor, RequestLogger};
pub use procedure::{MethodKind, Procedure, SERVICE_NAME};
pub use server::{ElizaServer, ServerError};
pub use service::{ANONYMOUS_NAME, ElizaService};
pub use transport::ElizaGrpc;

// Re-export proto types for convenience
pub use proto::{
    ConverseRequest, ConverseResponse, IntroduceRequest, IntroduceResponse, SayRequest,
    SayResponse, eliza_service_client::ElizaServiceClient,
    eliza_service_server::ElizaServiceServer as ElizaGrpcServer,
};
