//! The error envelope: how brokers report request failures.
//!
//! Body format: fixed block `{ error_code: u16 }`, then a u16-length-prefixed
//! `error_data` field. `error_data` is an opaque byte string — usually UTF-8
//! text, but the codec never assumes so.

use crate::error_code::ErrorCode;
use crate::header::{self, HEADER_SIZE, MessageHeader, WireError};

/// Template id of the error envelope.
pub const ERROR_RESPONSE_TEMPLATE_ID: u16 = 0;

const BLOCK_LENGTH: u16 = 2;

/// A decoded error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The broker-reported error code.
    pub error_code: ErrorCode,
    /// Opaque error detail bytes.
    pub error_data: Vec<u8>,
}

impl ErrorResponse {
    /// Encode a complete frame (header + body).
    ///
    /// # Errors
    ///
    /// Returns [`WireError::VarDataTooLarge`] if `error_data` exceeds the
    /// u16 length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        MessageHeader::for_template(ERROR_RESPONSE_TEMPLATE_ID, BLOCK_LENGTH)
            .serialize_into(&mut frame[..HEADER_SIZE]);

        frame.extend_from_slice(&self.error_code.as_u16().to_le_bytes());
        header::put_var(&mut frame, &self.error_data)?;
        Ok(frame)
    }

    /// Decode the body of an error envelope.
    ///
    /// `offset` is where the body starts and `block_length` is the
    /// transmitted fixed-block size, which may exceed this client's own.
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
        let error_code = ErrorCode::from_u16(header::read_u16(frame, offset)?);
        let var_offset = offset + block_length as usize;
        let (error_data, _) = header::read_var(frame, var_offset)?;

        Ok(Self {
            error_code,
            error_data: error_data.to_vec(),
        })
    }
}
