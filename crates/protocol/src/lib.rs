//! # Xfer Protocol Library
//!
//! Binary codecs for the two formats game clients exchange outside the main
//! message stream: entity snapshots and chunked transfers.
//!
//! ## Architecture
//!
//! ### 1. Entity Snapshots
//! A snapshot is a tree of entities. Each entity is a versioned record made
//! of a common object header ([`header`]), kind-specific trailing fields
//! ([`entity`]) and its nested child entities.
//! - [`ScriptHandler`]: versioned sub-record attached to newer headers
//! - [`Entity`]: Default, Armor and Weapon records
//! - [`TypeRegistry`]: maps a type tag (`"ArmorXfer"`, ...) to its decoder
//! - [`ObjectRegistry`]: maps game object types (by name or numeric ID) to type tags
//!
//! Decoding stops at the first failure. When a child fails, the parent is
//! still returned inside the [`DecodeError`] with the children read so far.
//!
//! ### 2. Chunked Transfers ([`chunked`])
//! Seven opcode-prefixed frames (`Start`, `Accept`, `Data`, `Ack`, `Done`,
//! `Cancel`, `Abort`) that move a payload in numbered chunks of up to
//! [`MAX_CHUNK_SIZE`] bytes.
//!
//! ### 3. Masking ([`mask`])
//! Single-byte XOR unmasking for captures that arrive masked.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use xfer_core::ByteCursor;
//! use xfer_protocol::{TypeRegistry, ARMOR_XFER};
//!
//! let data = std::fs::read("armor.bin").unwrap();
//! let mut cursor = ByteCursor::new(&data);
//!
//! match TypeRegistry::global().decode(None, ARMOR_XFER, &mut cursor) {
//!     Ok(entity) => println!("armor v{}", entity.version()),
//!     Err(err) => eprintln!("decode failed: {}", err),
//! }
//! ```
//!
//! ## Byte Order
//!
//! Every multi-byte field is little-endian.

pub mod chunked;
pub mod entity;
pub mod header;
pub mod mask;
pub mod registry;
pub mod script;

pub use chunked::{
    decode_frame, encode_frame, Abort, Accept, Ack, Cancel, Data, Done, Frame, FrameCodec,
    FrameReader, Opcode, Reason, Start, MAX_CHUNK_SIZE,
};
pub use entity::{
    Armor, DecodeContext, DecodeError, DefaultObject, Entity, Modifier, Weapon, DEFAULT_MAX_DEPTH,
};
pub use header::EntityHeader;
pub use registry::{
    default_object_registry, install_default_object_registry, DecodeFn, MapObjectRegistry,
    ObjectRegistry, TypeRegistry, TypeRegistryBuilder, ARMOR_XFER, DEFAULT_XFER, WEAPON_XFER,
};
pub use script::ScriptHandler;
