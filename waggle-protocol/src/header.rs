//! Fixed-size message header shared by every frame.
//!
//! Header format: `[block_length:2][template_id:2][schema_id:2][version:2]`,
//! all little-endian. The body follows immediately at [`HEADER_SIZE`].

/// Header size: four u16 fields = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Schema id of the client API this crate speaks.
pub const SCHEMA_ID: u16 = 0;

/// Schema version this crate encodes.
pub const SCHEMA_VERSION: u16 = 1;

/// Wire format error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Not enough data to decode the frame.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to decode.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// A variable-length field exceeds its u16 length prefix.
    #[error("variable-length field too large: {size} bytes (max {max})", max = u16::MAX)]
    VarDataTooLarge {
        /// Actual field size in bytes.
        size: usize,
    },
}

/// Message header preceding every frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Size of the body's fixed block in bytes.
    pub block_length: u16,
    /// Identifies the body layout.
    pub template_id: u16,
    /// Identifies the schema the template belongs to.
    pub schema_id: u16,
    /// Schema version the frame was encoded with.
    pub version: u16,
}

impl MessageHeader {
    /// Build the header for an outbound frame of this schema.
    pub const fn for_template(template_id: u16, block_length: u16) -> Self {
        Self {
            block_length,
            template_id,
            schema_id: SCHEMA_ID,
            version: SCHEMA_VERSION,
        }
    }

    /// Serialize the header into `buf` (must be at least [`HEADER_SIZE`] bytes).
    ///
    /// # Panics
    ///
    /// Panics if `buf` is smaller than [`HEADER_SIZE`].
    pub fn serialize_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..2].copy_from_slice(&self.block_length.to_le_bytes());
        buf[2..4].copy_from_slice(&self.template_id.to_le_bytes());
        buf[4..6].copy_from_slice(&self.schema_id.to_le_bytes());
        buf[6..8].copy_from_slice(&self.version.to_le_bytes());
    }

    /// Deserialize a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InsufficientData`] if `buf` is shorter than
    /// [`HEADER_SIZE`].
    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        }

        Ok(Self {
            block_length: u16::from_le_bytes([buf[0], buf[1]]),
            template_id: u16::from_le_bytes([buf[2], buf[3]]),
            schema_id: u16::from_le_bytes([buf[4], buf[5]]),
            version: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }
}

/// Read a little-endian u16 at `offset`, bounds-checked.
pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16, WireError> {
    if buf.len() < offset + 2 {
        return Err(WireError::InsufficientData {
            needed: offset + 2,
            have: buf.len(),
        });
    }
    Ok(u16::from_le_bytes([buf[offset], buf[offset + 1]]))
}

/// Read a little-endian u64 at `offset`, bounds-checked.
pub(crate) fn read_u64(buf: &[u8], offset: usize) -> Result<u64, WireError> {
    if buf.len() < offset + 8 {
        return Err(WireError::InsufficientData {
            needed: offset + 8,
            have: buf.len(),
        });
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    Ok(u64::from_le_bytes(bytes))
}

/// Read a u16-length-prefixed variable field at `offset`.
///
/// Returns the field bytes and the offset just past them.
pub(crate) fn read_var(buf: &[u8], offset: usize) -> Result<(&[u8], usize), WireError> {
    let len = read_u16(buf, offset)? as usize;
    let start = offset + 2;
    if buf.len() < start + len {
        return Err(WireError::InsufficientData {
            needed: start + len,
            have: buf.len(),
        });
    }
    Ok((&buf[start..start + len], start + len))
}

/// Append a u16-length-prefixed variable field to `out`.
pub(crate) fn put_var(out: &mut Vec<u8>, data: &[u8]) -> Result<(), WireError> {
    let len = u16::try_from(data.len()).map_err(|_| WireError::VarDataTooLarge {
        size: data.len(),
    })?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
    Ok(())
}
