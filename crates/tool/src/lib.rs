//! Helpers behind the `xferdump` binary

use serde::Serialize;
use xfer_config::XferConfig;
use xfer_core::{ByteCursor, TypeTag, XferError};
use xfer_protocol::{
    mask, DecodeContext, DecodeError, Entity, Frame, FrameReader, MapObjectRegistry,
    ObjectRegistry, TypeRegistry,
};

/// How the top-level entity's decoder is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Tag(String),
    ObjectType(String),
    ObjectId(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Pretty,
}

/// Object registry holding every row of the configured object-type table
pub fn object_registry(config: &XferConfig) -> MapObjectRegistry {
    let mut objects = MapObjectRegistry::new();
    for entry in &config.object_types {
        objects.insert(entry.id, entry.name.clone(), entry.tag.clone());
    }
    objects
}

/// Copy of `data` with the configured XOR mask removed
pub fn unmasked(data: &[u8], config: &XferConfig) -> Vec<u8> {
    match config.xor_key {
        Some(key) => mask::unmask(data, key),
        None => data.to_vec(),
    }
}

/// Decode the entity at the start of `data`
pub fn decode_entity(
    data: &[u8],
    selector: &Selector,
    config: &XferConfig,
) -> Result<Entity, DecodeError> {
    let objects = object_registry(config);
    let tag = match selector {
        Selector::Tag(tag) => TypeTag::from(tag.as_str()),
        Selector::ObjectType(name) => mapped(objects.by_object_type(name), name)?,
        Selector::ObjectId(id) => mapped(objects.by_object_type_id(*id), &id.to_string())?,
    };

    let mut cursor = ByteCursor::new(data);
    let entity = DecodeContext::new(TypeRegistry::global(), &objects)
        .with_max_depth(config.max_depth)
        .decode(tag.as_str(), &mut cursor)?;

    if !cursor.is_empty() {
        tracing::warn!("{} trailing bytes after entity", cursor.remaining());
    }
    Ok(entity)
}

fn mapped(tag: Option<TypeTag>, object_type: &str) -> Result<TypeTag, XferError> {
    tag.filter(|tag| !tag.is_empty())
        .ok_or_else(|| XferError::NoObjectMapping(object_type.to_string()))
}

/// Decode back-to-back frames, returning those read before the first error
pub fn decode_frames(data: &[u8]) -> (Vec<Frame>, Option<XferError>) {
    let mut frames = Vec::new();
    let mut reader = FrameReader::new(data);

    while let Some(result) = reader.next() {
        match result {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                tracing::debug!("Frame decode stopped at offset {}", reader.offset());
                return (frames, Some(err));
            }
        }
    }
    (frames, None)
}

pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Pretty => serde_json::to_string_pretty(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use xfer_config::ObjectTypeEntry;
    use xfer_protocol::{Done, DEFAULT_XFER};

    fn config() -> XferConfig {
        XferConfig {
            object_types: vec![ObjectTypeEntry {
                id: 4,
                name: "crate".into(),
                tag: DEFAULT_XFER.into(),
            }],
            ..XferConfig::default()
        }
    }

    fn crate_entity() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u16_le(30);
        buf.put_u32_le(1); // extent
        buf.put_u32_le(0); // flags
        buf.put_f32_le(1.0);
        buf.put_f32_le(2.0);
        buf.put_u8(5);
        buf.put_slice(b"crate");
        buf.put_u8(0); // team
        buf.put_u8(0); // sub_count
        buf
    }

    #[test]
    fn test_object_registry_from_config() {
        let objects = object_registry(&config());
        assert_eq!(objects.len(), 1);
        assert_eq!(objects.by_object_type_id(4), Some(TypeTag::from(DEFAULT_XFER)));
    }

    #[test]
    fn test_decode_entity_by_selector() {
        let data = crate_entity();
        let config = config();

        for selector in [
            Selector::Tag(DEFAULT_XFER.into()),
            Selector::ObjectType("crate".into()),
            Selector::ObjectId(4),
        ] {
            let entity = decode_entity(&data, &selector, &config).unwrap();
            assert_eq!(entity.header().name, "crate");
        }

        let err = decode_entity(&data, &Selector::ObjectId(5), &config).unwrap_err();
        assert_eq!(err.kind(), &XferError::NoObjectMapping("5".into()));
    }

    #[test]
    fn test_unmasked_uses_configured_key() {
        let mut config = config();
        assert_eq!(unmasked(&[1, 2], &config), vec![1, 2]);

        config.xor_key = Some(0xFF);
        assert_eq!(unmasked(&[0x00, 0xF0], &config), vec![0xFF, 0x0F]);
    }

    #[test]
    fn test_decode_frames_stops_at_error() {
        let mut data = Frame::Done(Done { recv_id: 1 }).to_bytes().unwrap().to_vec();
        data.push(9);

        let (frames, err) = decode_frames(&data);
        assert_eq!(frames, vec![Frame::Done(Done { recv_id: 1 })]);
        assert_eq!(err, Some(XferError::UnknownOpcode(9)));
    }

    #[test]
    fn test_render_formats() {
        let frame = Frame::Done(Done { recv_id: 1 });
        assert_eq!(
            render(&frame, OutputFormat::Json).unwrap(),
            r#"{"frame":"Done","recv_id":1}"#
        );
        assert!(render(&frame, OutputFormat::Pretty).unwrap().contains('\n'));
    }
}
