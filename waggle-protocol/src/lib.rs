//! # waggle-protocol
//!
//! Wire protocol for the waggle broker client.
//!
//! Every frame exchanged with a broker starts with a fixed 8-byte
//! little-endian [`MessageHeader`] followed by a template-specific body.
//! The header's `(template_id, schema_id)` pair identifies the body layout;
//! there is no separate success/error tag on the wire. A response that does
//! not carry the template the client expects is, by convention, the error
//! envelope ([`ErrorResponse`]).
//!
//! ## Frame layout
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ header (8 bytes, little-endian)                │
//! │   block_length │ template_id │ schema_id │ ver │
//! ├────────────────────────────────────────────────┤
//! │ fixed block (block_length bytes)               │
//! ├────────────────────────────────────────────────┤
//! │ variable-length fields (u16 length prefixes)   │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! Decoders honor the *transmitted* `block_length` when locating the
//! variable section, so newer brokers may append block fields without
//! breaking older clients.
//!
//! ## Templates
//!
//! | Template | Id | Direction |
//! |----------|----|-----------|
//! | [`ErrorResponse`] | 0 | broker → client |
//! | [`ControlMessageRequest`] | 10 | client → broker |
//! | [`ControlMessageResponse`] | 11 | broker → client |
//! | [`ExecuteCommandRequest`] | 20 | client → broker |
//! | [`ExecuteCommandResponse`] | 21 | broker → client |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod command;
mod control;
mod error_code;
mod error_response;
mod header;

pub use command::{
    EXECUTE_COMMAND_REQUEST_TEMPLATE_ID, EXECUTE_COMMAND_RESPONSE_TEMPLATE_ID,
    ExecuteCommandRequest, ExecuteCommandResponse,
};
pub use control::{
    CONTROL_MESSAGE_REQUEST_TEMPLATE_ID, CONTROL_MESSAGE_RESPONSE_TEMPLATE_ID,
    ControlMessageRequest, ControlMessageResponse, ControlMessageType,
};
pub use error_code::ErrorCode;
pub use error_response::{ERROR_RESPONSE_TEMPLATE_ID, ErrorResponse};
pub use header::{HEADER_SIZE, MessageHeader, SCHEMA_ID, SCHEMA_VERSION, WireError};
