//! Broker-reported error codes.
//!
//! Codes travel as a u16 inside the error envelope. [`ErrorCode::NullVal`]
//! is the absence sentinel: it never appears in a real envelope and marks
//! "no error recorded" on the client side. Codes this crate does not know
//! are carried opaquely as [`ErrorCode::Unknown`] so newer brokers can fail
//! requests with codes older clients still report faithfully.

/// A broker-reported error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The broker does not implement the received message type.
    MessageNotSupported,
    /// The addressed topic does not exist on the receiving broker.
    TopicNotFound,
    /// The broker failed to append the request to its log.
    RequestWriteFailure,
    /// The client speaks a schema version the broker rejects.
    InvalidClientVersion,
    /// The broker gave up on the request before it completed.
    RequestTimeout,
    /// Request processing failed inside the broker.
    RequestProcessingFailure,
    /// The request was structurally invalid.
    InvalidMessage,
    /// A code this client version does not know.
    Unknown(u16),
    /// Absence sentinel; never a real broker error.
    NullVal,
}

impl ErrorCode {
    /// Wire value of the absence sentinel.
    pub const NULL_VAL: u16 = u16::MAX;

    /// The u16 wire value of this code.
    pub const fn as_u16(self) -> u16 {
        match self {
            ErrorCode::MessageNotSupported => 0,
            ErrorCode::TopicNotFound => 1,
            ErrorCode::RequestWriteFailure => 2,
            ErrorCode::InvalidClientVersion => 3,
            ErrorCode::RequestTimeout => 4,
            ErrorCode::RequestProcessingFailure => 5,
            ErrorCode::InvalidMessage => 6,
            ErrorCode::Unknown(raw) => raw,
            ErrorCode::NullVal => Self::NULL_VAL,
        }
    }

    /// Decode a u16 wire value.
    pub const fn from_u16(raw: u16) -> Self {
        match raw {
            0 => ErrorCode::MessageNotSupported,
            1 => ErrorCode::TopicNotFound,
            2 => ErrorCode::RequestWriteFailure,
            3 => ErrorCode::InvalidClientVersion,
            4 => ErrorCode::RequestTimeout,
            5 => ErrorCode::RequestProcessingFailure,
            6 => ErrorCode::InvalidMessage,
            Self::NULL_VAL => ErrorCode::NullVal,
            other => ErrorCode::Unknown(other),
        }
    }

    /// Whether a request failing with this code should be re-issued against
    /// a freshly refreshed topology.
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::TopicNotFound | ErrorCode::RequestTimeout)
    }

    /// Whether this is the absence sentinel.
    pub const fn is_null(self) -> bool {
        matches!(self, ErrorCode::NullVal)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::MessageNotSupported => write!(f, "MESSAGE_NOT_SUPPORTED"),
            ErrorCode::TopicNotFound => write!(f, "TOPIC_NOT_FOUND"),
            ErrorCode::RequestWriteFailure => write!(f, "REQUEST_WRITE_FAILURE"),
            ErrorCode::InvalidClientVersion => write!(f, "INVALID_CLIENT_VERSION"),
            ErrorCode::RequestTimeout => write!(f, "REQUEST_TIMEOUT"),
            ErrorCode::RequestProcessingFailure => write!(f, "REQUEST_PROCESSING_FAILURE"),
            ErrorCode::InvalidMessage => write!(f, "INVALID_MESSAGE"),
            ErrorCode::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
            ErrorCode::NullVal => write!(f, "NULL_VAL"),
        }
    }
}
