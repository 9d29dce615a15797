//! Per-call context: which procedure is running and when it must stop.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::metadata::MetadataMap;

use crate::procedure::Procedure;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Context handed to every handler invocation.
///
/// A call ends early when its token is cancelled (the client went away, or
/// someone called [`CallContext::cancel`]) or when its deadline passes.
/// Handlers check [`CallContext::err`] between steps and race suspension
/// points against [`CallContext::done`].
#[derive(Debug, Clone)]
pub struct CallContext {
    procedure: Procedure,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Create a context with no deadline.
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure,
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Create a context that is also cancelled whenever `parent` is.
    pub fn with_parent(procedure: Procedure, parent: &CancellationToken) -> Self {
        Self {
            procedure,
            token: parent.child_token(),
            deadline: None,
        }
    }

    /// Create a context for an incoming call, honoring its `grpc-timeout` header.
    ///
    /// Cancelling `parent` cancels the call.
    pub fn from_metadata(
        procedure: Procedure,
        metadata: &MetadataMap,
        parent: &CancellationToken,
    ) -> Self {
        let ctx = Self::with_parent(procedure, parent);
        match metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout)
        {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// The procedure being served.
    pub fn procedure(&self) -> Procedure {
        self.procedure
    }

    /// The instant after which the call is abandoned, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel the call. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The status the call should end with, if it has already been cut short.
    pub fn err(&self) -> Option<Status> {
        if self.token.is_cancelled() {
            return Some(self.cancelled_status());
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(self.deadline_status()),
            _ => None,
        }
    }

    /// Resolves once the call is cancelled or its deadline passes.
    pub async fn done(&self) -> Status {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => self.cancelled_status(),
                () = tokio::time::sleep_until(deadline) => self.deadline_status(),
            },
            None => {
                self.token.cancelled().await;
                self.cancelled_status()
            }
        }
    }

    fn cancelled_status(&self) -> Status {
        Status::cancelled(format!("{} was cancelled", self.procedure))
    }

    fn deadline_status(&self) -> Status {
        Status::deadline_exceeded(format!("{} exceeded its deadline", self.procedure))
    }
}

/// Parse a `grpc-timeout` header value: at most eight digits and a unit.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let timeout = match unit {
        "H" => Duration::from_secs(amount * 60 * 60),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tonic::Code;

    use super::*;

    #[test]
    fn test_parse_grpc_timeout_units() {
        assert_eq!(parse_grpc_timeout("1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("3S"), Some(Duration::from_secs(3)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("10u"), Some(Duration::from_micros(10)));
        assert_eq!(parse_grpc_timeout("99n"), Some(Duration::from_nanos(99)));
    }

    #[test]
    fn test_parse_grpc_timeout_rejects_malformed() {
        assert_eq!(parse_grpc_timeout(""), None);
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("10"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("-5S"), None);
    }

    #[test]
    fn test_from_metadata_sets_deadline() {
        let mut metadata = MetadataMap::new();
        metadata.insert(GRPC_TIMEOUT_HEADER, "5S".parse().unwrap());

        let parent = CancellationToken::new();
        let ctx = CallContext::from_metadata(Procedure::Introduce, &metadata, &parent);
        assert!(ctx.deadline().is_some());

        let empty = MetadataMap::new();
        let ctx = CallContext::from_metadata(Procedure::Introduce, &empty, &parent);
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_parent_cancellation_reaches_call() {
        let server = CancellationToken::new();
        let ctx = CallContext::with_parent(Procedure::Introduce, &server);
        assert!(ctx.err().is_none());

        server.cancel();
        assert_eq!(ctx.err().unwrap().code(), Code::Cancelled);
    }

    #[test]
    fn test_call_cancellation_does_not_reach_parent() {
        let server = CancellationToken::new();
        let ctx = CallContext::with_parent(Procedure::Converse, &server);

        ctx.cancel();
        assert!(ctx.err().is_some());
        assert!(!server.is_cancelled());
    }

    #[test]
    fn test_err_after_cancel() {
        let ctx = CallContext::new(Procedure::Converse);
        assert!(ctx.err().is_none());

        ctx.clone().cancel();
        assert_eq!(ctx.err().unwrap().code(), Code::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_reports_deadline() {
        let ctx = CallContext::new(Procedure::Introduce).with_timeout(Duration::from_millis(50));

        let status = ctx.done().await;
        assert_eq!(status.code(), Code::DeadlineExceeded);
        assert_eq!(ctx.err().unwrap().code(), Code::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_reports_cancellation_before_deadline() {
        let ctx = CallContext::new(Procedure::Introduce).with_timeout(Duration::from_secs(10));
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert_eq!(ctx.done().await.code(), Code::Cancelled);
    }
}
