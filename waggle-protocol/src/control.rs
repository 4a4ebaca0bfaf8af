//! Control-message request/response frames.
//!
//! Control messages manage client-broker bookkeeping that does not go
//! through a partition log: subscription lifecycle, credit grants, and
//! topology discovery. The body carries the message type plus an opaque
//! data document.

use crate::header::{self, HEADER_SIZE, MessageHeader, WireError};

/// Template id of a control-message request.
pub const CONTROL_MESSAGE_REQUEST_TEMPLATE_ID: u16 = 10;

/// Template id of a control-message response.
pub const CONTROL_MESSAGE_RESPONSE_TEMPLATE_ID: u16 = 11;

const REQUEST_BLOCK_LENGTH: u16 = 2;
const RESPONSE_BLOCK_LENGTH: u16 = 0;

/// Kinds of control messages the broker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlMessageType {
    /// Open a task subscription on a partition.
    AddTaskSubscription,
    /// Close a task subscription.
    RemoveTaskSubscription,
    /// Grant additional task-delivery credits to a subscription.
    IncreaseTaskSubscriptionCredits,
    /// Close a topic subscription.
    RemoveTopicSubscription,
    /// Ask a broker for the current cluster topology.
    RequestTopology,
    /// A type this client version does not know.
    Unknown(u16),
}

impl ControlMessageType {
    /// The u16 wire value of this type.
    pub const fn as_u16(self) -> u16 {
        match self {
            ControlMessageType::AddTaskSubscription => 1,
            ControlMessageType::RemoveTaskSubscription => 2,
            ControlMessageType::IncreaseTaskSubscriptionCredits => 3,
            ControlMessageType::RemoveTopicSubscription => 4,
            ControlMessageType::RequestTopology => 5,
            ControlMessageType::Unknown(raw) => raw,
        }
    }

    /// Decode a u16 wire value.
    pub const fn from_u16(raw: u16) -> Self {
        match raw {
            1 => ControlMessageType::AddTaskSubscription,
            2 => ControlMessageType::RemoveTaskSubscription,
            3 => ControlMessageType::IncreaseTaskSubscriptionCredits,
            4 => ControlMessageType::RemoveTopicSubscription,
            5 => ControlMessageType::RequestTopology,
            other => ControlMessageType::Unknown(other),
        }
    }
}

impl std::fmt::Display for ControlMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMessageType::AddTaskSubscription => write!(f, "ADD_TASK_SUBSCRIPTION"),
            ControlMessageType::RemoveTaskSubscription => write!(f, "REMOVE_TASK_SUBSCRIPTION"),
            ControlMessageType::IncreaseTaskSubscriptionCredits => {
                write!(f, "INCREASE_TASK_SUBSCRIPTION_CREDITS")
            }
            ControlMessageType::RemoveTopicSubscription => write!(f, "REMOVE_TOPIC_SUBSCRIPTION"),
            ControlMessageType::RequestTopology => write!(f, "REQUEST_TOPOLOGY"),
            ControlMessageType::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
        }
    }
}

/// An outbound control-message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessageRequest<'a> {
    /// The kind of control message.
    pub message_type: ControlMessageType,
    /// Encoded message document.
    pub data: &'a [u8],
}

impl ControlMessageRequest<'_> {
    /// Encode a complete frame (header + body).
    ///
    /// # Errors
    ///
    /// Returns [`WireError::VarDataTooLarge`] if `data` exceeds the u16
    /// length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        MessageHeader::for_template(CONTROL_MESSAGE_REQUEST_TEMPLATE_ID, REQUEST_BLOCK_LENGTH)
            .serialize_into(&mut frame[..HEADER_SIZE]);

        frame.extend_from_slice(&self.message_type.as_u16().to_le_bytes());
        header::put_var(&mut frame, self.data)?;
        Ok(frame)
    }

    /// Decode the body of a control-message request (test fixtures).
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InsufficientData`] on a truncated frame.
    pub fn decode(
        frame: &[u8],
        offset: usize,
        block_length: u16,
        _version: u16,
    ) -> Result<(ControlMessageType, Vec<u8>), WireError> {
        let message_type = ControlMessageType::from_u16(header::read_u16(frame, offset)?);
        let var_offset = offset + block_length as usize;
        let (data, _) = header::read_var(frame, var_offset)?;
        Ok((message_type, data.to_vec()))
    }
}

/// A decoded control-message response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessageResponse {
    /// Encoded response document.
    pub data: Vec<u8>,
}

impl ControlMessageResponse {
    /// Encode a complete frame (header + body). Used by broker-side test
    /// fixtures; real responses come off the wire.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::VarDataTooLarge`] if `data` exceeds the u16
    /// length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        MessageHeader::for_template(CONTROL_MESSAGE_RESPONSE_TEMPLATE_ID, RESPONSE_BLOCK_LENGTH)
            .serialize_into(&mut frame[..HEADER_SIZE]);

        header::put_var(&mut frame, &self.data)?;
        Ok(frame)
    }

    /// Decode the body of a control-message response.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InsufficientData`] on a truncated frame.
    pub fn decode(
        frame: &[u8],
        offset: usize,
        block_length: u16,
        _version: u16,
    ) -> Result<Self, WireError> {
        let var_offset = offset + block_length as usize;
        let (data, _) = header::read_var(frame, var_offset)?;
        Ok(Self {
            data: data.to_vec(),
        })
    }
}
