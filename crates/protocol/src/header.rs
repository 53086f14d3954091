//! Common object header shared by every entity variant
//!
//! # Layout Selection
//! The enclosing variant's version governs the layout:
//! - **version < 40**: legacy layout, fields gated by the version itself
//! - **version >= 40**: a 16-bit sub-version follows. Sub-version 61 and up
//!   selects the current layout; anything lower would be the legacy layout
//!   again, which is not defined for these versions and is rejected with
//!   [`XferError::UnsupportedLegacyFormat`].
//!
//! # Current Layout (sub-version >= 61)
//! ```text
//! {u32 extent}{u32 id}{f32 x}{f32 y}{u8 present}
//!   present == 0: end of header
//! {u32 flags}{u8-len name}{u8 team}{u8 sub_count}
//! {u16 count}{u32 owned_id * count}{u32 anim}
//! [sub-version >= 63: ScriptHandler]
//! [sub-version >= 64: i32 dead_frame]
//! ```
//!
//! # Legacy Layout (version < 40)
//! ```text
//! {u32 extent}{u32 flags}{position}
//! [version >= 10: u8-len name][version >= 20: u8 team][version >= 30: u8 sub_count]
//! ```
//! Position is two i32 below version 5 and two f32 from then on.

use serde::Serialize;
use xfer_core::{ByteCursor, Result, XferError};

use crate::script::ScriptHandler;

/// Outer version from which a sub-version precedes the header
pub const SUB_VERSION_MIN_OUTER: u16 = 40;
/// First sub-version using the current layout
pub const CURRENT_LAYOUT_SUB_VERSION: u16 = 61;
/// First sub-version carrying a script handler
pub const SCRIPT_HANDLER_SUB_VERSION: u16 = 63;
/// First sub-version carrying a death frame
pub const DEAD_FRAME_SUB_VERSION: u16 = 64;
/// Highest header sub-version this decoder understands
pub const HEADER_MAX_SUB_VERSION: u16 = 64;

/// First legacy version storing the position as floats.
///
/// Chosen, not taken from captures: no pre-40 data states where integer
/// positions end. TODO: pin against pre-40 reference captures once available.
const LEGACY_FLOAT_POSITION_VERSION: u16 = 5;
const LEGACY_NAME_VERSION: u16 = 10;
const LEGACY_TEAM_VERSION: u16 = 20;
const LEGACY_SUB_COUNT_VERSION: u16 = 30;

/// Decoded object header
///
/// Fields beyond `present` stay at their zero value when the record ends at
/// the presence flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityHeader {
    /// Sub-version for the current layout, the outer version for legacy
    pub version: u16,
    /// Spatial extent of the object
    pub extent: u32,
    /// Unique object ID
    pub id: u32,
    pub x: f32,
    pub y: f32,
    /// Whether the object carries the rest of its header
    pub present: bool,
    pub flags: u32,
    /// Display name
    pub name: String,
    pub team: u8,
    /// Number of nested entities following the enclosing variant
    pub sub_count: u8,
    /// IDs of entities owned by this object
    pub owned_ids: Vec<u32>,
    /// Animation index
    pub anim: u32,
    pub script_handler: Option<ScriptHandler>,
    /// Animation frame shown once the object is dead
    pub dead_frame: Option<i32>,
}

impl EntityHeader {
    /// Decode a header governed by the enclosing variant's `version`
    pub fn decode(cursor: &mut ByteCursor<'_>, version: u16) -> Result<Self> {
        if version >= SUB_VERSION_MIN_OUTER {
            let sub_version = cursor.read_u16()?;
            if sub_version > HEADER_MAX_SUB_VERSION {
                return Err(XferError::UnsupportedVersion {
                    what: "object header",
                    version: sub_version,
                    max: HEADER_MAX_SUB_VERSION,
                });
            }
            if sub_version >= CURRENT_LAYOUT_SUB_VERSION {
                return Self::decode_current(cursor, sub_version);
            }
            return Err(XferError::UnsupportedLegacyFormat {
                version,
                sub_version,
            });
        }

        Self::decode_legacy(cursor, version)
    }

    fn decode_current(cursor: &mut ByteCursor<'_>, sub_version: u16) -> Result<Self> {
        let mut header = EntityHeader {
            version: sub_version,
            extent: cursor.read_u32()?,
            id: cursor.read_u32()?,
            x: cursor.read_f32()?,
            y: cursor.read_f32()?,
            present: cursor.read_u8()? != 0,
            ..Default::default()
        };
        if !header.present {
            return Ok(header);
        }

        header.flags = cursor.read_u32()?;
        header.name = cursor.read_cstring_u8()?;
        header.team = cursor.read_u8()?;
        header.sub_count = cursor.read_u8()?;
        header.owned_ids = read_owned_ids(cursor)?;
        header.anim = cursor.read_u32()?;

        if sub_version >= SCRIPT_HANDLER_SUB_VERSION {
            header.script_handler = Some(ScriptHandler::decode(cursor)?);
        }
        if sub_version >= DEAD_FRAME_SUB_VERSION {
            header.dead_frame = Some(cursor.read_i32()?);
        }

        Ok(header)
    }

    fn decode_legacy(cursor: &mut ByteCursor<'_>, version: u16) -> Result<Self> {
        let mut header = EntityHeader {
            version,
            present: true,
            extent: cursor.read_u32()?,
            flags: cursor.read_u32()?,
            ..Default::default()
        };

        if version < LEGACY_FLOAT_POSITION_VERSION {
            header.x = cursor.read_i32()? as f32;
            header.y = cursor.read_i32()? as f32;
        } else {
            header.x = cursor.read_f32()?;
            header.y = cursor.read_f32()?;
        }

        if version >= LEGACY_NAME_VERSION {
            header.name = cursor.read_cstring_u8()?;
        }
        if version >= LEGACY_TEAM_VERSION {
            header.team = cursor.read_u8()?;
        }
        if version >= LEGACY_SUB_COUNT_VERSION {
            header.sub_count = cursor.read_u8()?;
        }
        // The legacy ID field (version >= 40) is never reached: those versions
        // carry a sub-version and are rejected above.

        Ok(header)
    }
}

fn read_owned_ids(cursor: &mut ByteCursor<'_>) -> Result<Vec<u32>> {
    let count = usize::from(cursor.read_u16()?);
    let raw = cursor.read_bytes(count * 4)?;
    Ok(raw
        .chunks_exact(4)
        .map(|id| u32::from_le_bytes([id[0], id[1], id[2], id[3]]))
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bytes::BufMut;

    /// Fixture builder for current-layout headers
    pub(crate) struct HeaderFixture {
        pub sub_version: u16,
        pub present: bool,
        pub name: &'static str,
        pub sub_count: u8,
        pub owned_ids: Vec<u32>,
    }

    impl HeaderFixture {
        pub(crate) fn new(sub_version: u16) -> Self {
            Self {
                sub_version,
                present: true,
                name: "crate",
                sub_count: 0,
                owned_ids: vec![],
            }
        }

        pub(crate) fn sub_count(mut self, sub_count: u8) -> Self {
            self.sub_count = sub_count;
            self
        }

        /// Write the header including its sub-version prefix
        pub(crate) fn write(&self, buf: &mut Vec<u8>) {
            buf.put_u16_le(self.sub_version);
            buf.put_u32_le(16); // extent
            buf.put_u32_le(1001); // id
            buf.put_f32_le(12.5);
            buf.put_f32_le(-3.0);
            buf.put_u8(self.present as u8);
            if !self.present {
                return;
            }
            buf.put_u32_le(0x0000_0101);
            buf.put_u8(self.name.len() as u8);
            buf.put_slice(self.name.as_bytes());
            buf.put_u8(2); // team
            buf.put_u8(self.sub_count);
            buf.put_u16_le(self.owned_ids.len() as u16);
            for id in &self.owned_ids {
                buf.put_u32_le(*id);
            }
            buf.put_u32_le(9); // anim
            if self.sub_version >= SCRIPT_HANDLER_SUB_VERSION {
                buf.put_u16_le(1);
                buf.put_u32_le(6);
                buf.put_slice(b"OnTick");
                buf.put_u32_le(3);
            }
            if self.sub_version >= DEAD_FRAME_SUB_VERSION {
                buf.put_i32_le(-1);
            }
        }
    }

    #[test]
    fn test_current_layout_full() {
        let mut data = Vec::new();
        let mut fixture = HeaderFixture::new(64).sub_count(2);
        fixture.owned_ids = vec![5, 6, 7];
        fixture.write(&mut data);
        let mut cursor = ByteCursor::new(&data);

        let header = EntityHeader::decode(&mut cursor, 60).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(header.version, 64);
        assert_eq!(header.extent, 16);
        assert_eq!(header.id, 1001);
        assert_eq!(header.x, 12.5);
        assert_eq!(header.y, -3.0);
        assert!(header.present);
        assert_eq!(header.flags, 0x101);
        assert_eq!(header.name, "crate");
        assert_eq!(header.team, 2);
        assert_eq!(header.sub_count, 2);
        assert_eq!(header.owned_ids, vec![5, 6, 7]);
        assert_eq!(header.anim, 9);
        let handler = header.script_handler.unwrap();
        assert_eq!(handler.function, "OnTick");
        assert_eq!(handler.slot, 3);
        assert_eq!(header.dead_frame, Some(-1));
    }

    #[test]
    fn test_sub_version_gates() {
        for (sub_version, has_handler, has_dead_frame) in
            [(61, false, false), (62, false, false), (63, true, false), (64, true, true)]
        {
            let mut data = Vec::new();
            HeaderFixture::new(sub_version).write(&mut data);
            let mut cursor = ByteCursor::new(&data);

            let header = EntityHeader::decode(&mut cursor, 45).unwrap();
            assert!(cursor.is_empty(), "leftover bytes at sub-version {}", sub_version);
            assert_eq!(header.script_handler.is_some(), has_handler);
            assert_eq!(header.dead_frame.is_some(), has_dead_frame);
        }
    }

    #[test]
    fn test_absent_object_stops_after_flag() {
        let mut data = Vec::new();
        let mut fixture = HeaderFixture::new(64);
        fixture.present = false;
        fixture.write(&mut data);
        data.push(0xAA); // belongs to the next record
        let mut cursor = ByteCursor::new(&data);

        let header = EntityHeader::decode(&mut cursor, 50).unwrap();
        assert!(!header.present);
        assert_eq!(header.id, 1001);
        assert_eq!(header.name, "");
        assert_eq!(header.sub_count, 0);
        assert!(header.script_handler.is_none());
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_sub_version_above_ceiling() {
        let data = 65u16.to_le_bytes();
        let mut cursor = ByteCursor::new(&data);

        let err = EntityHeader::decode(&mut cursor, 40).unwrap_err();
        assert!(matches!(
            err,
            XferError::UnsupportedVersion { version: 65, max: 64, .. }
        ));
    }

    #[test]
    fn test_legacy_format_rejected_for_new_versions() {
        let mut data = 60u16.to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 32]);
        let mut cursor = ByteCursor::new(&data);

        let err = EntityHeader::decode(&mut cursor, 41).unwrap_err();
        assert_eq!(
            err,
            XferError::UnsupportedLegacyFormat {
                version: 41,
                sub_version: 60
            }
        );
    }

    #[test]
    fn test_legacy_layout_gates() {
        let mut data = Vec::new();
        data.put_u32_le(8); // extent
        data.put_u32_le(4); // flags
        data.put_f32_le(1.5);
        data.put_f32_le(2.5);
        data.put_u8(3);
        data.put_slice(b"rat");
        data.put_u8(1); // team
        let mut cursor = ByteCursor::new(&data);

        let header = EntityHeader::decode(&mut cursor, 20).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(header.version, 20);
        assert!(header.present);
        assert_eq!(header.extent, 8);
        assert_eq!(header.flags, 4);
        assert_eq!((header.x, header.y), (1.5, 2.5));
        assert_eq!(header.name, "rat");
        assert_eq!(header.team, 1);
        assert_eq!(header.sub_count, 0);
    }

    #[test]
    fn test_legacy_integer_position() {
        let mut data = Vec::new();
        data.put_u32_le(1);
        data.put_u32_le(0);
        data.put_i32_le(-7);
        data.put_i32_le(40);
        let mut cursor = ByteCursor::new(&data);

        let header = EntityHeader::decode(&mut cursor, 3).unwrap();
        assert_eq!((header.x, header.y), (-7.0, 40.0));
        assert_eq!(header.name, "");
    }

    #[test]
    fn test_legacy_position_switches_to_float() {
        let mut ints = Vec::new();
        ints.put_u32_le(1);
        ints.put_u32_le(0);
        ints.put_i32_le(12);
        ints.put_i32_le(-3);

        let mut floats = Vec::new();
        floats.put_u32_le(1);
        floats.put_u32_le(0);
        floats.put_f32_le(12.5);
        floats.put_f32_le(-3.25);

        let last_int = LEGACY_FLOAT_POSITION_VERSION - 1;
        let header = EntityHeader::decode(&mut ByteCursor::new(&ints), last_int).unwrap();
        assert_eq!((header.x, header.y), (12.0, -3.0));

        let first_float = LEGACY_FLOAT_POSITION_VERSION;
        let header = EntityHeader::decode(&mut ByteCursor::new(&floats), first_float).unwrap();
        assert_eq!((header.x, header.y), (12.5, -3.25));
    }

    #[test]
    fn test_truncation_anywhere_is_eof() {
        let mut data = Vec::new();
        let mut fixture = HeaderFixture::new(64).sub_count(1);
        fixture.owned_ids = vec![1, 2];
        fixture.write(&mut data);

        for len in 0..data.len() {
            let mut cursor = ByteCursor::new(&data[..len]);
            let err = EntityHeader::decode(&mut cursor, 60).unwrap_err();
            assert!(err.is_eof(), "length {} gave {:?}", len, err);
        }
    }
}
