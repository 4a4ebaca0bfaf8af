//! Error types surfaced to callers of the client.
//!
//! Three channels converge on the response sink: broker-reported error
//! envelopes, local failures during send/decode/handling, and deadline
//! exhaustion. Callers observe exactly one of them per request.

use waggle_protocol::ErrorCode;

/// Errors a request can complete with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The broker answered with a non-retryable error envelope.
    #[error("broker error {code}: {message}")]
    Broker {
        /// The broker-reported error code.
        code: ErrorCode,
        /// The error detail, decoded from the envelope's data bytes.
        message: String,
    },

    /// The broker rejected the command. Surfaced verbatim, never wrapped.
    #[error("command rejected: {reason}")]
    CommandRejected {
        /// The rejection reason supplied by the broker.
        reason: String,
    },

    /// The request deadline expired before a response arrived.
    ///
    /// The message names the request and every broker contacted; the last
    /// local error recorded during the retry loop is chained as the source.
    #[error("{message}")]
    RequestTimeout {
        /// Deadline narrative: request description plus contacted brokers.
        message: String,
        /// The last local error recorded before the deadline fired.
        #[source]
        source: Option<Box<ClientError>>,
    },

    /// A local failure while handling the response.
    #[error("unexpected error during response handling: {message}")]
    ResponseHandling {
        /// Details of the underlying failure.
        message: String,
    },

    /// The request could not be serialized.
    #[error("failed to encode request: {message}")]
    EncodeFailed {
        /// Details of the underlying failure.
        message: String,
    },

    /// A topology refresh reported an error. Recovered internally; only
    /// ever visible as the source of a [`ClientError::RequestTimeout`].
    #[error("topology refresh failed: {message}")]
    Topology {
        /// Details reported by the topology view.
        message: String,
    },

    /// `configure_*` was called on a controller that is already armed.
    #[error("controller is already armed with a request")]
    AlreadyArmed,

    /// No free request slot; try again next tick.
    #[error("no request slot available")]
    NoRequestSlot,

    /// A request terminated without any recorded error.
    #[error("unknown error during request execution")]
    Unknown,
}
