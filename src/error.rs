//! The error type surfaced to callers.
//!
//! Every failure the client can produce collapses into one flat [`Error`]
//! carrying an [`ErrorKind`]. This mirrors the teacher crate's single
//! `error::Error` type rather than a tree of per-layer error enums: routing,
//! pooling, and transport code all bubble up through the same type so a
//! caller can match on `kind()` without caring which layer raised it.

use std::{borrow::Cow, error::Error as StdError, fmt, io};

/// The category of a surfaced error. See spec §7 for the full taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// Malformed RESP3 framing. The connection that produced it is poisoned.
  Protocol,
  /// A transport-level failure: connect, read, or write.
  Io,
  /// A caller-supplied or configured deadline elapsed.
  Timeout,
  /// A server error reply (`-<kind> <message>`), e.g. `WRONGTYPE`, `SYNTAX`.
  Command,
  /// `MOVED <slot> <addr>`, surfaced only if cluster redirection is exhausted.
  Moved,
  /// `ASK <slot> <addr>`, surfaced only if cluster redirection is exhausted.
  Ask,
  /// `TRYAGAIN` exceeded the redirection budget.
  TryAgain,
  /// `CLUSTERDOWN ...`. Not retried internally.
  ClusterDown,
  /// `CROSSSLOT ...`, or a client-side cross-slot violation in a transaction.
  CrossSlot,
  /// A write landed on a demoted master (`READONLY ...` / "read only replica").
  ReadOnly,
  /// The circuit breaker guarding this endpoint is open.
  CircuitOpen,
  /// The pool could not hand out a connection before the acquire timeout.
  PoolExhausted,
  /// Sentinel/Cluster/Discovery Service lookup failed against every seed.
  Discovery,
  /// A failover is in progress; retrying is expected to succeed.
  Failover,
  /// The client's own configuration is invalid (bad URL, RESP2-only server).
  Config,
  /// The client is shutting down; in-flight commands are abandoned.
  Canceled,
  /// Invalid argument passed by the caller (e.g. empty command, NaN score).
  InvalidArgument,
  /// The requested type conversion from a [`crate::types::Value`] failed.
  Parse,
}

impl ErrorKind {
  /// Whether the retry policy (§4.6) should consider retrying this kind,
  /// independent of the caller's own opt-in retryable set.
  pub fn is_default_retryable(&self) -> bool {
    matches!(self, ErrorKind::Io | ErrorKind::Timeout | ErrorKind::TryAgain)
  }

  fn as_str(&self) -> &'static str {
    match self {
      ErrorKind::Protocol => "Protocol",
      ErrorKind::Io => "IO",
      ErrorKind::Timeout => "Timeout",
      ErrorKind::Command => "Command",
      ErrorKind::Moved => "Moved",
      ErrorKind::Ask => "Ask",
      ErrorKind::TryAgain => "TryAgain",
      ErrorKind::ClusterDown => "ClusterDown",
      ErrorKind::CrossSlot => "CrossSlot",
      ErrorKind::ReadOnly => "ReadOnly",
      ErrorKind::CircuitOpen => "CircuitOpen",
      ErrorKind::PoolExhausted => "PoolExhausted",
      ErrorKind::Discovery => "Discovery",
      ErrorKind::Failover => "Failover",
      ErrorKind::Config => "Config",
      ErrorKind::Canceled => "Canceled",
      ErrorKind::InvalidArgument => "InvalidArgument",
      ErrorKind::Parse => "Parse",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug)]
pub struct Error {
  kind:    ErrorKind,
  details: Cow<'static, str>,
  source:  Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
  /// Build a new error with a static or owned message.
  pub fn new(kind: ErrorKind, details: impl Into<Cow<'static, str>>) -> Self {
    Error {
      kind,
      details: details.into(),
      source: None,
    }
  }

  /// Attach an underlying cause (e.g. the `io::Error` behind an `ErrorKind::Io`).
  pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
    self.source = Some(Box::new(source));
    self
  }

  /// The error category.
  pub fn kind(&self) -> &ErrorKind {
    &self.kind
  }

  /// The human-readable detail string (server error message, parse failure, etc).
  pub fn details(&self) -> &str {
    &self.details
  }

  /// Whether the retry policy's default category table considers this retryable.
  pub fn is_retryable(&self) -> bool {
    self.kind.is_default_retryable()
  }

  /// Parse a server simple-error line (`"<KIND> <message>"`) into a typed [`Error`].
  ///
  /// Cluster redirection replies (`MOVED`, `ASK`, `TRYAGAIN`, `CLUSTERDOWN`,
  /// `CROSSSLOT`) and `READONLY` are recognized here so the router can match
  /// on `kind()` without re-parsing strings itself.
  pub fn from_server_error(message: impl Into<String>) -> Self {
    let message = message.into();
    let mut parts = message.splitn(2, ' ');
    let token = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").to_string();

    let kind = match token {
      "MOVED" => ErrorKind::Moved,
      "ASK" => ErrorKind::Ask,
      "TRYAGAIN" => ErrorKind::TryAgain,
      "CLUSTERDOWN" => ErrorKind::ClusterDown,
      "CROSSSLOT" => ErrorKind::CrossSlot,
      "READONLY" => ErrorKind::ReadOnly,
      _ if message.contains("read only replica") => ErrorKind::ReadOnly,
      _ => ErrorKind::Command,
    };

    match kind {
      ErrorKind::Moved | ErrorKind::Ask | ErrorKind::TryAgain | ErrorKind::ClusterDown | ErrorKind::CrossSlot => {
        Error::new(kind, rest)
      },
      _ => Error::new(kind, message),
    }
  }

  pub fn protocol(details: impl Into<Cow<'static, str>>) -> Self {
    Error::new(ErrorKind::Protocol, details)
  }

  pub fn io(source: io::Error) -> Self {
    Error::new(ErrorKind::Io, source.to_string()).with_source(source)
  }

  pub fn timeout() -> Self {
    Error::new(ErrorKind::Timeout, "operation timed out")
  }

  pub fn pool_exhausted() -> Self {
    Error::new(ErrorKind::PoolExhausted, "timed out waiting for an idle connection")
  }

  pub fn circuit_open() -> Self {
    Error::new(ErrorKind::CircuitOpen, "circuit breaker is open")
  }

  pub fn config(details: impl Into<Cow<'static, str>>) -> Self {
    Error::new(ErrorKind::Config, details)
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.details.is_empty() {
      write!(f, "{}", self.kind)
    } else {
      write!(f, "{}: {}", self.kind, self.details)
    }
  }
}

impl StdError for Error {
  fn source(&self) -> Option<&(dyn StdError + 'static)> {
    self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
  }
}

impl From<io::Error> for Error {
  fn from(value: io::Error) -> Self {
    Error::io(value)
  }
}

impl From<url::ParseError> for Error {
  fn from(value: url::ParseError) -> Self {
    Error::config(value.to_string())
  }
}

impl From<std::str::Utf8Error> for Error {
  fn from(value: std::str::Utf8Error) -> Self {
    Error::config(value.to_string())
  }
}
