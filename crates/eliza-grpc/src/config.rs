//! Server configuration from the command line and environment.

use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

/// Address served when neither `--addr` nor `PORT` is given.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8082";

/// Errors in the server configuration. Any of these prevents startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration flag was given a negative value
    #[error("duration cannot be negative: {0}")]
    NegativeDuration(String),
    /// A duration flag could not be parsed
    #[error("invalid duration {0:?}: expected a number and unit such as 500ms, 1s or 1m30s")]
    InvalidDuration(String),
    /// The `PORT` value is not a port number
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Eliza gRPC Server - talk to a 1960s psychotherapist over gRPC
#[derive(Parser, Debug)]
#[command(name = "eliza-grpc")]
#[command(about = "gRPC server for the Eliza conversational agent")]
pub struct Args {
    /// Address to listen on [default: 127.0.0.1:8082]
    #[arg(long)]
    pub addr: Option<SocketAddr>,

    /// Listen on all interfaces on this port (ignored when --addr is given)
    #[arg(long, env = "PORT")]
    pub port: Option<String>,

    /// The duration to delay sending responses on the server stream.
    #[arg(
        short = 'd',
        long,
        value_name = "DURATION",
        default_value = "0",
        value_parser = parse_duration,
        allow_hyphen_values = true
    )]
    pub server_stream_delay: Duration,

    /// How long in-flight calls may run after a shutdown signal.
    #[arg(long, value_name = "DURATION", default_value = "1s", value_parser = parse_duration)]
    pub shutdown_grace: Duration,
}

impl Args {
    /// Resolve the arguments into a server configuration.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            addr: resolve_addr(self.addr, self.port.as_deref())?,
            stream_delay: self.server_stream_delay,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Delay between streamed introduction messages
    pub stream_delay: Duration,
    /// Grace period for in-flight calls on shutdown
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8082)),
            stream_delay: Duration::ZERO,
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

fn resolve_addr(addr: Option<SocketAddr>, port: Option<&str>) -> Result<SocketAddr, ConfigError> {
    if let Some(addr) = addr {
        return Ok(addr);
    }
    match port.map(str::trim).filter(|p| !p.is_empty()) {
        Some(port) => {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.to_string()))?;
            Ok(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)))
        }
        None => Ok(ServerConfig::default().addr),
    }
}

/// Parse a duration written like `300ms`, `1.5s` or `1h2m3s`.
///
/// A bare `0` is accepted without a unit. Negative values are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());

    let trimmed = input.trim();
    let (negative, mut rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, after) = rest.split_at(number_end);
        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_end);

        let nanos_per_unit: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 60 * 60 * 1_000_000_000,
            _ => return Err(invalid()),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid());
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(nanos_per_unit).ok_or_else(invalid)?;
        if !fraction.is_empty() {
            // Digits past nanosecond precision for hours are noise.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits.parse().map_err(|_| invalid())?;
            nanos += numerator * nanos_per_unit / 10u128.pow(digits.len() as u32);
        }
        total_nanos = total_nanos.checked_add(nanos).ok_or_else(invalid)?;
        rest = after;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    let total = Duration::new(secs, (total_nanos % 1_000_000_000) as u32);

    if negative && !total.is_zero() {
        return Err(ConfigError::NegativeDuration(input.to_string()));
    }
    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("7ns").unwrap(), Duration::from_nanos(7));
        assert_eq!(parse_duration("-0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_negative() {
        assert!(matches!(
            parse_duration("-1s"),
            Err(ConfigError::NegativeDuration(_))
        ));
        assert!(matches!(
            parse_duration("-250ms"),
            Err(ConfigError::NegativeDuration(_))
        ));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for input in ["", "-", "5", "s", "1x", "1.2.3s", "abc", "1s-"] {
            assert!(
                matches!(parse_duration(input), Err(ConfigError::InvalidDuration(_))),
                "{input:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_negative_delay_flag_is_a_startup_error() {
        for argv in [
            &["eliza-grpc", "--server-stream-delay", "-1s"][..],
            &["eliza-grpc", "-d", "-500ms"][..],
            &["eliza-grpc", "--server-stream-delay=-2s"][..],
        ] {
            let err = Args::try_parse_from(argv).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "argv: {argv:?}");
            assert!(err.to_string().contains("cannot be negative"));
        }
    }

    #[test]
    fn test_delay_flag() {
        let args = Args::try_parse_from(["eliza-grpc", "-d", "200ms"]).unwrap();
        assert_eq!(args.server_stream_delay, Duration::from_millis(200));

        let args = Args::try_parse_from(["eliza-grpc"]).unwrap();
        assert_eq!(args.server_stream_delay, Duration::ZERO);
        assert_eq!(args.shutdown_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_help_flag_does_not_produce_args() {
        let err = Args::try_parse_from(["eliza-grpc", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("--server-stream-delay"));
    }

    #[test]
    fn test_resolve_addr_precedence() {
        let explicit: SocketAddr = "10.0.0.1:9000".parse().unwrap();

        assert_eq!(resolve_addr(Some(explicit), Some("7000")).unwrap(), explicit);
        assert_eq!(
            resolve_addr(None, Some("7000")).unwrap(),
            "[::]:7000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_addr(None, None).unwrap(),
            DEFAULT_ADDR.parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_addr(None, Some("")).unwrap(),
            DEFAULT_ADDR.parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_resolve_addr_rejects_bad_port() {
        assert!(matches!(
            resolve_addr(None, Some("eighty")),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            resolve_addr(None, Some("70000")),
            Err(ConfigError::InvalidPort(_))
        ));
    }
}
