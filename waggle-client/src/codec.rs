//! Payload serialization for the intermediate object-map format.
//!
//! Command and control-message payloads travel as opaque documents inside
//! the wire frames. The [`PayloadCodec`] trait pins down how documents are
//! turned into bytes; [`JsonCodec`] is the shipped implementation. The
//! codec instance is built once by the surrounding client and injected —
//! handlers and controllers never construct their own.
//!
//! # Example
//!
//! ```rust
//! use waggle_client::{JsonCodec, PayloadCodec};
//! use serde_json::json;
//!
//! let codec = JsonCodec;
//! let document = json!({ "taskType": "payment", "retries": 3 });
//!
//! let bytes = codec.encode(&document).expect("encode");
//! let decoded: serde_json::Value = codec.decode(&bytes).expect("decode");
//! assert_eq!(document, decoded);
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for payload codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a document to bytes.
    #[error("encode error: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a document.
    #[error("decode error: {0}")]
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

/// Pluggable document serialization format.
///
/// The trait requires `Clone + 'static` so codec instances can be stored in
/// controllers and handlers that outlive the calling scope.
pub trait PayloadCodec: Clone + 'static {
    /// Encode a serializable document to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a deserializable document.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if deserialization fails.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Copy, Default, Debug)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
