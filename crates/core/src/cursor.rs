//! Sequential little-endian reader over a fixed buffer
//!
//! Every read either yields a value and advances, or fails with
//! [`XferError::UnexpectedEof`] and leaves the cursor where it was. Decoders
//! chain reads with `?`, so the first short read ends the whole decode.
//!
//! # Strings
//! The wire strings are C-style: bytes up to the first NUL are kept and the
//! rest of the declared length is skipped. Text is decoded lossily since the
//! legacy data is not guaranteed to be UTF-8.

use bytes::Buf;

use crate::{Result, XferError};

/// Forward-only reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buf: data,
            len: data.len(),
        }
    }

    /// Number of bytes consumed so far
    #[inline]
    pub fn position(&self) -> usize {
        self.len - self.buf.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The unread tail of the buffer
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(XferError::eof(needed, self.buf.remaining()));
        }
        Ok(())
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    /// Read a 3-byte little-endian unsigned integer
    #[inline]
    pub fn read_u24(&mut self) -> Result<u32> {
        self.ensure(3)?;
        Ok(self.buf.get_uint_le(3) as u32)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    /// Borrow the next `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Read a fixed-width field of `n` bytes holding a NUL-terminated string
    pub fn read_fixed_cstring(&mut self, n: usize) -> Result<String> {
        self.read_bytes(n).map(cstring_lossy)
    }

    /// Read a C string prefixed by an 8-bit length
    pub fn read_cstring_u8(&mut self) -> Result<String> {
        self.read_prefixed(|c| c.read_u8().map(usize::from))
            .map(cstring_lossy)
    }

    /// Read a C string prefixed by a 16-bit length
    pub fn read_cstring_u16(&mut self) -> Result<String> {
        self.read_prefixed(|c| c.read_u16().map(usize::from))
            .map(cstring_lossy)
    }

    /// Read a C string prefixed by a 32-bit length
    pub fn read_cstring_u32(&mut self) -> Result<String> {
        self.read_prefixed(|c| c.read_u32().map(|n| n as usize))
            .map(cstring_lossy)
    }

    /// Read a UTF-16LE string prefixed by a 16-bit count of code units
    pub fn read_utf16_u16(&mut self) -> Result<String> {
        let bytes = self.read_prefixed(|c| c.read_u16().map(|n| usize::from(n) * 2))?;
        let units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0);
        Ok(char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }

    /// Read a length prefix and then that many bytes, atomically
    fn read_prefixed(
        &mut self,
        read_len: impl FnOnce(&mut Self) -> Result<usize>,
    ) -> Result<&'a [u8]> {
        let saved = self.buf;
        let result = read_len(self).and_then(|len| self.read_bytes(len));
        if result.is_err() {
            self.buf = saved;
        }
        result
    }
}

fn cstring_lossy(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
