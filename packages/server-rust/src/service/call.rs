//! Call types flowing through the outbound pipeline.

use gatehouse_core::ServiceName;
use serde_json::Value;

use crate::transport::CodecError;

/// Whether a call waits for a backend reply or only for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Request/response: resolves with the backend's reply.
    Request,
    /// Event: resolves once the backend transport acknowledged delivery.
    Event,
}

impl CallKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CallKind::Request => "request",
            CallKind::Event => "event",
        }
    }
}

/// Context carried with every call through the pipeline.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub call_id: u64,
    pub target: ServiceName,
    pub kind: CallKind,
    pub timeout_ms: u64,
}

/// A single outbound call. Transient: one per inbound request (or per
/// target for a broadcast).
#[derive(Debug, Clone)]
pub struct Call {
    pub ctx: CallContext,
    pub pattern: String,
    pub payload: Value,
}

/// Errors returned by an outbound call.
///
/// All variants are surfaced to the caller unchanged; nothing in the routing
/// path retries or suppresses them.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no client provisioned for target {target}")]
    UnknownTarget { target: String },
    #[error("call to {target} timed out after {timeout_ms}ms")]
    Timeout { target: ServiceName, timeout_ms: u64 },
    #[error("gateway overloaded, try again later")]
    Overloaded,
    #[error("transport error talking to {target}: {source}")]
    Transport {
        target: ServiceName,
        #[source]
        source: std::io::Error,
    },
    #[error("connection to {target} closed before a reply arrived")]
    ConnectionClosed { target: ServiceName },
    #[error("{target} rejected the call: {message}")]
    Remote { target: ServiceName, message: String },
    #[error("{target} completed without a response")]
    EmptyResponse { target: ServiceName },
    #[error("malformed frame exchanged with {target}: {source}")]
    Codec {
        target: ServiceName,
        #[source]
        source: CodecError,
    },
}

impl RouteError {
    /// Backend the failed call was addressed to, when known.
    #[must_use]
    pub fn target(&self) -> Option<ServiceName> {
        match self {
            RouteError::UnknownTarget { .. } | RouteError::Overloaded => None,
            RouteError::Timeout { target, .. }
            | RouteError::Transport { target, .. }
            | RouteError::ConnectionClosed { target }
            | RouteError::Remote { target, .. }
            | RouteError::EmptyResponse { target }
            | RouteError::Codec { target, .. } => Some(*target),
        }
    }

    /// Stable, low-cardinality label for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            RouteError::UnknownTarget { .. } => "unknown_target",
            RouteError::Timeout { .. } => "timeout",
            RouteError::Overloaded => "overloaded",
            RouteError::Transport { .. } => "transport",
            RouteError::ConnectionClosed { .. } => "connection_closed",
            RouteError::Remote { .. } => "remote",
            RouteError::EmptyResponse { .. } => "empty_response",
            RouteError::Codec { .. } => "codec",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_target() {
        let err = RouteError::Timeout {
            target: ServiceName::AiMl,
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "call to aiMl timed out after 250ms");
        assert_eq!(err.target(), Some(ServiceName::AiMl));
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn overloaded_has_no_target() {
        assert_eq!(RouteError::Overloaded.target(), None);
        let unknown = RouteError::UnknownTarget {
            target: "billing".to_string(),
        };
        assert_eq!(unknown.to_string(), "no client provisioned for target billing");
        assert_eq!(unknown.target(), None);
    }

    #[test]
    fn call_kind_labels() {
        assert_eq!(CallKind::Request.as_str(), "request");
        assert_eq!(CallKind::Event.as_str(), "event");
    }
}
