//! Transport collaborator seams.
//!
//! The controller never touches sockets. It hands a fully encoded frame to
//! a [`TransportOutput`] and polls the returned [`PendingResponse`] until
//! the reply frame is available. Connection management, multiplexing, and
//! reconnection are entirely the transport's business.

use crate::addr::BrokerAddress;

/// Errors a pending request can resolve with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The broker rejected the command outright. The controller surfaces
    /// this verbatim to the caller.
    #[error("{reason}")]
    CommandRejected {
        /// The rejection reason supplied by the broker.
        reason: String,
    },

    /// The connection failed while the request was in flight.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        /// Details of the connection failure.
        message: String,
    },

    /// The transport dropped the request before a response arrived.
    #[error("request aborted: {message}")]
    Aborted {
        /// Details of why the request was dropped.
        message: String,
    },
}

/// Outbound side of the transport.
pub trait TransportOutput {
    /// Send `frame` to `target` and return a handle to the outstanding
    /// request.
    ///
    /// Returns `None` when no request slot is available right now; the
    /// caller is expected to retry on its next tick. Must not block.
    fn send_request(
        &self,
        target: &BrokerAddress,
        frame: &[u8],
    ) -> Option<Box<dyn PendingResponse>>;
}

/// Handle to one outstanding transport request.
///
/// The owner must call [`PendingResponse::release`] exactly once, whether
/// or not the response was taken. The transport guarantees that a reply
/// arriving after release is dropped.
pub trait PendingResponse {
    /// Whether a response (or failure) is available.
    fn is_done(&self) -> bool;

    /// Take the response frame. Called at most once, only after
    /// [`PendingResponse::is_done`] returns true.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CommandRejected`] when the broker refused
    /// the command, or another variant for transport-level failures.
    fn take(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Return the request slot to the transport.
    fn release(&mut self);
}
