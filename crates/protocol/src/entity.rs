//! Entity snapshot variants and their decoders
//!
//! Every variant starts with its own 16-bit version, followed by the shared
//! [`EntityHeader`] governed by that version, kind-specific trailing fields,
//! and finally exactly `header.sub_count` nested entities.
//!
//! # Nested Entities
//! Below version 60 each nested entity is introduced by its object type name
//! (u8-length prefixed); from version 60 on by a u16 object type ID. Either is
//! resolved to a type tag through the object registry and decoded with the
//! type registry.
//!
//! # Partial Results
//! When a nested entity fails, the error is returned together with the
//! enclosing entity holding the nested entities decoded before the failure.
//! See [`DecodeError::partial`].

use serde::Serialize;
use xfer_core::{ByteCursor, TypeTag, XferError};

use crate::header::EntityHeader;
use crate::registry::{ObjectRegistry, TypeRegistry};

/// Number of modifier slots on armor and weapons
pub const MODIFIER_SLOTS: usize = 4;
/// Version from which nested entities are introduced by type ID
pub const SUB_BY_ID_VERSION: u16 = 60;
/// Nesting limit applied when the caller does not choose one
pub const DEFAULT_MAX_DEPTH: usize = 64;

const MODIFIERS_VERSION: u16 = 11;

/// Entity decode failure, possibly carrying what was decoded before it
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct DecodeError {
    kind: XferError,
    partial: Option<Box<Entity>>,
}

impl DecodeError {
    pub fn with_partial(kind: XferError, partial: Entity) -> Self {
        Self {
            kind,
            partial: Some(Box::new(partial)),
        }
    }

    pub fn kind(&self) -> &XferError {
        &self.kind
    }

    /// The enclosing entity with the nested entities decoded before the
    /// failure. Never a valid decode result on its own.
    pub fn partial(&self) -> Option<&Entity> {
        self.partial.as_deref()
    }

    pub fn into_parts(self) -> (XferError, Option<Entity>) {
        (self.kind, self.partial.map(|entity| *entity))
    }
}

impl From<XferError> for DecodeError {
    fn from(kind: XferError) -> Self {
        Self {
            kind,
            partial: None,
        }
    }
}

/// Registries and limits threaded through a decode call
#[derive(Clone, Copy)]
pub struct DecodeContext<'r> {
    pub types: &'r TypeRegistry,
    pub objects: &'r dyn ObjectRegistry,
    depth: usize,
    max_depth: usize,
}

impl<'r> DecodeContext<'r> {
    pub fn new(types: &'r TypeRegistry, objects: &'r dyn ObjectRegistry) -> Self {
        Self {
            types,
            objects,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Nesting level of the entity being decoded, 0 at the top
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Decode one entity of type `tag`
    pub fn decode(&self, tag: &str, cursor: &mut ByteCursor<'_>) -> Result<Entity, DecodeError> {
        let decode = self.types.lookup(tag)?;
        tracing::debug!(
            "Decoding {} at offset {} (depth {})",
            tag,
            cursor.position(),
            self.depth
        );
        decode(cursor, self)
    }

    fn nested(&self) -> Result<Self, XferError> {
        if self.depth >= self.max_depth {
            return Err(XferError::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..*self
        })
    }

    /// Resolve the next nested entity's type tag from the stream
    fn read_sub_tag(
        &self,
        cursor: &mut ByteCursor<'_>,
        version: u16,
    ) -> Result<TypeTag, XferError> {
        let (tag, object_type) = if version < SUB_BY_ID_VERSION {
            let name = cursor.read_cstring_u8()?;
            (self.objects.by_object_type(&name), name)
        } else {
            let id = cursor.read_u16()?;
            (self.objects.by_object_type_id(id), id.to_string())
        };

        match tag {
            Some(tag) if !tag.is_empty() => Ok(tag),
            _ => Err(XferError::NoObjectMapping(object_type)),
        }
    }

    /// Decode exactly `count` nested entities into `sub`
    ///
    /// Entities decoded before a failure stay in `sub`.
    fn decode_sub(
        &self,
        cursor: &mut ByteCursor<'_>,
        version: u16,
        count: u8,
        sub: &mut Vec<Entity>,
    ) -> Result<(), XferError> {
        if count == 0 {
            return Ok(());
        }
        let nested = self.nested()?;
        sub.reserve(usize::from(count));

        for _ in 0..count {
            let tag = self.read_sub_tag(cursor, version)?;
            let entity = nested
                .decode(tag.as_str(), cursor)
                .map_err(|err| err.into_parts().0)?;
            sub.push(entity);
        }
        Ok(())
    }
}

fn read_version(
    cursor: &mut ByteCursor<'_>,
    what: &'static str,
    max: u16,
) -> Result<u16, XferError> {
    let version = cursor.read_u16()?;
    if version > max {
        return Err(XferError::UnsupportedVersion { what, version, max });
    }
    Ok(version)
}

/// One decoded entity of any registered kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Entity {
    Default(DefaultObject),
    Armor(Armor),
    Weapon(Weapon),
}

impl Entity {
    pub fn version(&self) -> u16 {
        match self {
            Entity::Default(e) => e.version,
            Entity::Armor(e) => e.version,
            Entity::Weapon(e) => e.version,
        }
    }

    pub fn header(&self) -> &EntityHeader {
        match self {
            Entity::Default(e) => &e.header,
            Entity::Armor(e) => &e.header,
            Entity::Weapon(e) => &e.header,
        }
    }

    /// Nested entities
    pub fn sub(&self) -> &[Entity] {
        match self {
            Entity::Default(e) => &e.sub,
            Entity::Armor(e) => &e.sub,
            Entity::Weapon(e) => &e.sub,
        }
    }

    pub fn as_armor(&self) -> Option<&Armor> {
        match self {
            Entity::Armor(armor) => Some(armor),
            _ => None,
        }
    }

    pub fn as_weapon(&self) -> Option<&Weapon> {
        match self {
            Entity::Weapon(weapon) => Some(weapon),
            _ => None,
        }
    }
}

/// A modifier slot on armor or a weapon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Modifier {
    pub name: String,
}

fn read_modifiers(cursor: &mut ByteCursor<'_>) -> Result<Vec<Modifier>, XferError> {
    (0..MODIFIER_SLOTS)
        .map(|_| cursor.read_cstring_u8().map(|name| Modifier { name }))
        .collect()
}

// ============================================================================
// DEFAULT OBJECT
// ============================================================================

/// Plain object with no fields beyond the header
///
/// # Wire Format
/// ```text
/// {u16 version <= 60}{EntityHeader}{nested * header.sub_count}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefaultObject {
    pub version: u16,
    pub header: EntityHeader,
    pub sub: Vec<Entity>,
}

impl DefaultObject {
    pub const MAX_VERSION: u16 = 60;

    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        ctx: &DecodeContext<'_>,
    ) -> Result<Self, DecodeError> {
        let version = read_version(cursor, "default object", Self::MAX_VERSION)?;
        let mut object = DefaultObject {
            version,
            header: EntityHeader::decode(cursor, version)?,
            sub: Vec::new(),
        };

        let count = object.header.sub_count;
        if let Err(kind) = ctx.decode_sub(cursor, version, count, &mut object.sub) {
            return Err(DecodeError::with_partial(kind, Entity::Default(object)));
        }
        Ok(object)
    }
}

// ============================================================================
// ARMOR
// ============================================================================

/// Armor piece
///
/// # Wire Format
/// ```text
/// {u16 version <= 62}{EntityHeader}
/// [version >= 11: modifier * 4]
/// [version >= 42: u32 health]
/// [version == 61: u8 val13]
/// [version >= 62: u32 val14]
/// {nested * header.sub_count}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Armor {
    pub version: u16,
    pub header: EntityHeader,
    /// Empty below version 11, otherwise exactly four slots
    pub modifiers: Vec<Modifier>,
    pub health: Option<u32>,
    /// Only present at exactly version 61
    pub val13: Option<u8>,
    /// Replaces `val13` from version 62
    pub val14: Option<u32>,
    pub sub: Vec<Entity>,
}

impl Armor {
    pub const MAX_VERSION: u16 = 62;

    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        ctx: &DecodeContext<'_>,
    ) -> Result<Self, DecodeError> {
        let version = read_version(cursor, "armor", Self::MAX_VERSION)?;
        let mut armor = Armor {
            version,
            header: EntityHeader::decode(cursor, version)?,
            ..Default::default()
        };

        if version >= MODIFIERS_VERSION {
            armor.modifiers = read_modifiers(cursor)?;
        }
        if version >= 42 {
            armor.health = Some(cursor.read_u32()?);
        }
        if version == 61 {
            armor.val13 = Some(cursor.read_u8()?);
        }
        if version >= 62 {
            armor.val14 = Some(cursor.read_u32()?);
        }

        let count = armor.header.sub_count;
        if let Err(kind) = ctx.decode_sub(cursor, version, count, &mut armor.sub) {
            return Err(DecodeError::with_partial(kind, Entity::Armor(armor)));
        }
        Ok(armor)
    }
}

// ============================================================================
// WEAPON
// ============================================================================

/// Weapon
///
/// # Wire Format
/// ```text
/// {u16 version <= 64}{EntityHeader}
/// [version >= 11: modifier * 4]
/// [version >= 42: u32 health]
/// [version >= 61: u32 health]    (second value wins)
/// [version == 63: u8 val13]
/// [version >= 64: u32 val14]
/// {nested * header.sub_count}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Weapon {
    pub version: u16,
    pub header: EntityHeader,
    /// Empty below version 11, otherwise exactly four slots
    pub modifiers: Vec<Modifier>,
    pub health: Option<u32>,
    /// Only present at exactly version 63
    pub val13: Option<u8>,
    /// Replaces `val13` from version 64
    pub val14: Option<u32>,
    pub sub: Vec<Entity>,
}

impl Weapon {
    pub const MAX_VERSION: u16 = 64;

    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        ctx: &DecodeContext<'_>,
    ) -> Result<Self, DecodeError> {
        let version = read_version(cursor, "weapon", Self::MAX_VERSION)?;
        let mut weapon = Weapon {
            version,
            header: EntityHeader::decode(cursor, version)?,
            ..Default::default()
        };

        if version >= MODIFIERS_VERSION {
            weapon.modifiers = read_modifiers(cursor)?;
        }
        if version >= 42 {
            weapon.health = Some(cursor.read_u32()?);
        }
        // Captures from version 61 on carry health twice; the later value is kept.
        // TODO: confirm against reference captures whether the first value means something else.
        if version >= 61 {
            weapon.health = Some(cursor.read_u32()?);
        }
        if version == 63 {
            weapon.val13 = Some(cursor.read_u8()?);
        }
        if version >= 64 {
            weapon.val14 = Some(cursor.read_u32()?);
        }

        let count = weapon.header.sub_count;
        if let Err(kind) = ctx.decode_sub(cursor, version, count, &mut weapon.sub) {
            return Err(DecodeError::with_partial(kind, Entity::Weapon(weapon)));
        }
        Ok(weapon)
    }
}
