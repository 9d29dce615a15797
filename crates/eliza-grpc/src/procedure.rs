//! The operations offered by the Eliza service, tagged by call shape.

use std::fmt;

/// Fully-qualified name of the Eliza service.
///
/// Health checking and reflection refer to the service by this name.
pub const SERVICE_NAME: &str = "connectrpc.eliza.v1.ElizaService";

/// How requests and responses flow for a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// One request, one response.
    Unary,
    /// Many requests, many responses, interleaved.
    BidiStream,
    /// One request, many responses.
    ServerStream,
}

/// An operation of the Eliza service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// `Say`: Eliza answers a single sentence.
    Say,
    /// `Converse`: a back-and-forth conversation over one stream.
    Converse,
    /// `Introduce`: Eliza introduces herself with a stream of sentences.
    Introduce,
}

impl Procedure {
    /// The call shape of this procedure.
    pub fn kind(self) -> MethodKind {
        match self {
            Procedure::Say => MethodKind::Unary,
            Procedure::Converse => MethodKind::BidiStream,
            Procedure::Introduce => MethodKind::ServerStream,
        }
    }

    /// The method name as declared in the service definition.
    pub fn method_name(self) -> &'static str {
        match self {
            Procedure::Say => "Say",
            Procedure::Converse => "Converse",
            Procedure::Introduce => "Introduce",
        }
    }

    /// The HTTP/2 path a call to this procedure is routed on.
    pub fn path(self) -> &'static str {
        match self {
            Procedure::Say => "/connectrpc.eliza.v1.ElizaService/Say",
            Procedure::Converse => "/connectrpc.eliza.v1.ElizaService/Converse",
            Procedure::Introduce => "/connectrpc.eliza.v1.ElizaService/Introduce",
        }
    }

    /// Whether calling the procedure has no side effects, making it safe to retry.
    pub fn idempotent(self) -> bool {
        matches!(self, Procedure::Say)
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
