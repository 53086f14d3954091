//! Type registry and object registries
//!
//! # Type Registry
//! Maps a [`TypeTag`] to the routine that decodes that entity kind. It is
//! assembled once during bootstrap with [`TypeRegistryBuilder`] and is
//! immutable afterwards, so it can be shared freely between threads.
//!
//! # Object Registry
//! Supplied by the host (it usually varies per map or session) to translate
//! the object type names and IDs found in the stream into type tags. When a
//! caller passes none, the process-wide default installed with
//! [`install_default_object_registry`] is used.

use std::collections::HashMap;
use std::sync::OnceLock;

use xfer_core::{ByteCursor, Result, TypeTag, XferError};

use crate::entity::{Armor, DecodeContext, DecodeError, DefaultObject, Entity, Weapon};

/// Tag of [`DefaultObject`]
pub const DEFAULT_XFER: &str = "DefaultXfer";
/// Tag of [`Armor`]
pub const ARMOR_XFER: &str = "ArmorXfer";
/// Tag of [`Weapon`]
pub const WEAPON_XFER: &str = "WeaponXfer";

/// Decoder stored for a type tag
pub type DecodeFn =
    fn(&mut ByteCursor<'_>, &DecodeContext<'_>) -> std::result::Result<Entity, DecodeError>;

// ============================================================================
// OBJECT REGISTRY
// ============================================================================

/// Host-side mapping from object types to type tags
///
/// Returning `None` (or an empty tag) means "no mapping" and becomes
/// [`XferError::NoObjectMapping`].
pub trait ObjectRegistry: Send + Sync {
    fn by_object_type(&self, name: &str) -> Option<TypeTag>;
    fn by_object_type_id(&self, id: u16) -> Option<TypeTag>;
}

/// In-memory object registry
///
/// Each row maps one object type ID and one name to a tag. Inserting a row
/// whose ID or name is already mapped replaces the old row.
#[derive(Debug, Clone, Default)]
pub struct MapObjectRegistry {
    by_name: HashMap<String, u16>,
    by_id: HashMap<u16, (String, TypeTag)>,
}

impl MapObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map object type `id` and `name` to `tag`
    pub fn insert(&mut self, id: u16, name: impl Into<String>, tag: impl Into<TypeTag>) {
        let name = name.into();
        if let Some((old_name, _)) = self.by_id.remove(&id) {
            self.by_name.remove(&old_name);
        }
        if let Some(old_id) = self.by_name.remove(&name) {
            self.by_id.remove(&old_id);
        }
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, (name, tag.into()));
    }

    pub fn with(mut self, id: u16, name: impl Into<String>, tag: impl Into<TypeTag>) -> Self {
        self.insert(id, name, tag);
        self
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl ObjectRegistry for MapObjectRegistry {
    fn by_object_type(&self, name: &str) -> Option<TypeTag> {
        let id = self.by_name.get(name)?;
        self.by_object_type_id(*id)
    }

    fn by_object_type_id(&self, id: u16) -> Option<TypeTag> {
        self.by_id.get(&id).map(|(_, tag)| tag.clone())
    }
}

/// Object registry without mappings, used until a default is installed
struct EmptyObjectRegistry;

impl ObjectRegistry for EmptyObjectRegistry {
    fn by_object_type(&self, _name: &str) -> Option<TypeTag> {
        None
    }

    fn by_object_type_id(&self, _id: u16) -> Option<TypeTag> {
        None
    }
}

static DEFAULT_OBJECTS: OnceLock<Box<dyn ObjectRegistry>> = OnceLock::new();

/// Install the process-wide default object registry
///
/// Only the first call succeeds; later calls hand the registry back.
pub fn install_default_object_registry(
    registry: impl ObjectRegistry + 'static,
) -> std::result::Result<(), Box<dyn ObjectRegistry>> {
    DEFAULT_OBJECTS.set(Box::new(registry))
}

/// The process-wide default object registry (empty if none was installed)
pub fn default_object_registry() -> &'static dyn ObjectRegistry {
    match DEFAULT_OBJECTS.get() {
        Some(registry) => &**registry,
        None => &EmptyObjectRegistry,
    }
}

// ============================================================================
// TYPE REGISTRY
// ============================================================================

/// Collects decoders before the registry is frozen
#[derive(Default)]
pub struct TypeRegistryBuilder {
    decoders: HashMap<TypeTag, DecodeFn>,
}

impl TypeRegistryBuilder {
    /// Register `decode` under `tag`
    ///
    /// # Panics
    /// If `tag` is already registered. Two decoders claiming one tag is a
    /// startup misconfiguration, not something to recover from.
    pub fn register(mut self, tag: impl Into<TypeTag>, decode: DecodeFn) -> Self {
        let tag = tag.into();
        if self.decoders.contains_key(&tag) {
            panic!("type tag {} registered twice", tag);
        }
        tracing::debug!("Registered type {}", tag);
        self.decoders.insert(tag, decode);
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            decoders: self.decoders,
        }
    }
}

/// Immutable map from type tag to decoder
pub struct TypeRegistry {
    decoders: HashMap<TypeTag, DecodeFn>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Registry holding the default object, armor and weapon decoders
    pub fn standard() -> Self {
        Self::builder()
            .register(DEFAULT_XFER, |cursor, ctx| {
                DefaultObject::decode(cursor, ctx).map(Entity::Default)
            })
            .register(ARMOR_XFER, |cursor, ctx| {
                Armor::decode(cursor, ctx).map(Entity::Armor)
            })
            .register(WEAPON_XFER, |cursor, ctx| {
                Weapon::decode(cursor, ctx).map(Entity::Weapon)
            })
            .build()
    }

    /// Process-wide [`TypeRegistry::standard`] snapshot
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::standard)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&TypeTag> {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        tags
    }

    pub fn lookup(&self, tag: &str) -> Result<DecodeFn> {
        self.decoders
            .get(tag)
            .copied()
            .ok_or_else(|| XferError::UnknownType(TypeTag::from(tag)))
    }

    /// Decode one entity of type `tag`
    ///
    /// `objects` resolves nested entities; `None` uses the default object registry.
    pub fn decode(
        &self,
        objects: Option<&dyn ObjectRegistry>,
        tag: &str,
        cursor: &mut ByteCursor<'_>,
    ) -> std::result::Result<Entity, DecodeError> {
        let objects = objects.unwrap_or_else(|| default_object_registry());
        DecodeContext::new(self, objects).decode(tag, cursor)
    }

    /// Decode one entity whose type is given by object type name
    pub fn decode_by_object_type(
        &self,
        objects: Option<&dyn ObjectRegistry>,
        name: &str,
        cursor: &mut ByteCursor<'_>,
    ) -> std::result::Result<Entity, DecodeError> {
        let objects = objects.unwrap_or_else(|| default_object_registry());
        let tag = resolve(objects.by_object_type(name), name)?;
        DecodeContext::new(self, objects).decode(tag.as_str(), cursor)
    }

    /// Decode one entity whose type is given by object type ID
    pub fn decode_by_object_type_id(
        &self,
        objects: Option<&dyn ObjectRegistry>,
        id: u16,
        cursor: &mut ByteCursor<'_>,
    ) -> std::result::Result<Entity, DecodeError> {
        let objects = objects.unwrap_or_else(|| default_object_registry());
        let tag = resolve(objects.by_object_type_id(id), &id.to_string())?;
        DecodeContext::new(self, objects).decode(tag.as_str(), cursor)
    }
}

fn resolve(tag: Option<TypeTag>, object_type: &str) -> Result<TypeTag> {
    tag.filter(|tag| !tag.is_empty())
        .ok_or_else(|| XferError::NoObjectMapping(object_type.to_string()))
}
