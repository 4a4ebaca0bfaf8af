//! Command request/response frames.
//!
//! A command is addressed to one partition of one topic and carries an
//! opaque payload (the object-map document produced by the payload codec).
//! The broker answers with the partition it ran on, the key it assigned,
//! and the resulting event document.

use crate::header::{self, HEADER_SIZE, MessageHeader, WireError};

/// Template id of a command request.
pub const EXECUTE_COMMAND_REQUEST_TEMPLATE_ID: u16 = 20;

/// Template id of a command response.
pub const EXECUTE_COMMAND_RESPONSE_TEMPLATE_ID: u16 = 21;

const REQUEST_BLOCK_LENGTH: u16 = 2;
const RESPONSE_BLOCK_LENGTH: u16 = 10;

/// An outbound command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteCommandRequest<'a> {
    /// Partition the command is addressed to.
    pub partition_id: u16,
    /// Topic the partition belongs to.
    pub topic: &'a str,
    /// Encoded command document.
    pub payload: &'a [u8],
}

impl ExecuteCommandRequest<'_> {
    /// Encode a complete frame (header + body).
    ///
    /// # Errors
    ///
    /// Returns [`WireError::VarDataTooLarge`] if the topic name or payload
    /// exceeds the u16 length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        MessageHeader::for_template(EXECUTE_COMMAND_REQUEST_TEMPLATE_ID, REQUEST_BLOCK_LENGTH)
            .serialize_into(&mut frame[..HEADER_SIZE]);

        frame.extend_from_slice(&self.partition_id.to_le_bytes());
        header::put_var(&mut frame, self.topic.as_bytes())?;
        header::put_var(&mut frame, self.payload)?;
        Ok(frame)
    }

    /// Decode the body of a command request (broker side / test fixtures).
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InsufficientData`] on a truncated frame.
    pub fn decode(
        frame: &[u8],
        offset: usize,
        block_length: u16,
        _version: u16,
    ) -> Result<(u16, Vec<u8>, Vec<u8>), WireError> {
        let partition_id = header::read_u16(frame, offset)?;
        let var_offset = offset + block_length as usize;
        let (topic, next) = header::read_var(frame, var_offset)?;
        let (payload, _) = header::read_var(frame, next)?;
        Ok((partition_id, topic.to_vec(), payload.to_vec()))
    }
}

/// A decoded command response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteCommandResponse {
    /// Partition that executed the command.
    pub partition_id: u16,
    /// Broker-assigned key of the resulting event.
    pub key: u64,
    /// Encoded event document.
    pub event: Vec<u8>,
}

impl ExecuteCommandResponse {
    /// Encode a complete frame (header + body). Used by broker-side test
    /// fixtures; real responses come off the wire.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::VarDataTooLarge`] if the event document exceeds
    /// the u16 length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        MessageHeader::for_template(EXECUTE_COMMAND_RESPONSE_TEMPLATE_ID, RESPONSE_BLOCK_LENGTH)
            .serialize_into(&mut frame[..HEADER_SIZE]);

        frame.extend_from_slice(&self.partition_id.to_le_bytes());
        frame.extend_from_slice(&self.key.to_le_bytes());
        header::put_var(&mut frame, &self.event)?;
        Ok(frame)
    }

    /// Decode the body of a command response.
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
        let partition_id = header::read_u16(frame, offset)?;
        let key = header::read_u64(frame, offset + 2)?;
        let var_offset = offset + block_length as usize;
        let (event, _) = header::read_var(frame, var_offset)?;

        Ok(Self {
            partition_id,
            key,
            event: event.to_vec(),
        })
    }
}
