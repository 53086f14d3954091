//! Script handler sub-record attached to current-layout object headers

use serde::Serialize;
use xfer_core::{ByteCursor, Result, XferError};

/// Highest script handler version this decoder understands
pub const SCRIPT_HANDLER_MAX_VERSION: u16 = 1;

/// Script function bound to an object
///
/// # Wire Format
/// ```text
/// {u16 version}{u32-len-prefixed function name}{u32 slot}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptHandler {
    pub version: u16,
    /// Script function name
    pub function: String,
    /// Numeric slot the function is bound to
    pub slot: u32,
}

impl ScriptHandler {
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let version = cursor.read_u16()?;
        if version > SCRIPT_HANDLER_MAX_VERSION {
            return Err(XferError::UnsupportedVersion {
                what: "script handler",
                version,
                max: SCRIPT_HANDLER_MAX_VERSION,
            });
        }

        let function = cursor.read_cstring_u32()?;
        let slot = cursor.read_u32()?;

        Ok(Self {
            version,
            function,
            slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn handler_bytes(version: u16, function: &str, slot: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u16_le(version);
        buf.put_u32_le(function.len() as u32);
        buf.put_slice(function.as_bytes());
        buf.put_u32_le(slot);
        buf
    }

    #[test]
    fn test_decode_script_handler() {
        let data = handler_bytes(1, "OnPickup", 7);
        let mut cursor = ByteCursor::new(&data);

        let handler = ScriptHandler::decode(&mut cursor).unwrap();
        assert_eq!(handler.version, 1);
        assert_eq!(handler.function, "OnPickup");
        assert_eq!(handler.slot, 7);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_version_above_ceiling_fails() {
        let data = handler_bytes(2, "OnPickup", 7);
        let mut cursor = ByteCursor::new(&data);

        let err = ScriptHandler::decode(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            XferError::UnsupportedVersion { version: 2, max: 1, .. }
        ));
    }

    #[test]
    fn test_truncated_slot() {
        let data = handler_bytes(0, "f", 7);
        let mut cursor = ByteCursor::new(&data[..data.len() - 1]);

        assert!(ScriptHandler::decode(&mut cursor).unwrap_err().is_eof());
    }
}
