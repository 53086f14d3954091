//! Xfer Core - error type, type tags and the byte cursor shared by the codecs

mod error;
mod types;
mod cursor;

pub use error::*;
pub use types::*;
pub use cursor::*;
