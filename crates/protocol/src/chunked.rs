//! # Chunked Transfer Frames
//!
//! Frame format of the point-to-point sub-protocol that moves larger payloads
//! over the unreliable game channel in numbered chunks.
//!
//! ## Framing
//! ```text
//! {u8 opcode}{payload}
//! ```
//! The payload size is fixed per frame kind, except for [`Data`] whose payload
//! is `6 + len(data)`.
//!
//! | Opcode | Frame    | Payload |
//! |--------|----------|---------|
//! | 0      | Start    | 138     |
//! | 1      | Accept   | 2       |
//! | 2      | Data     | 6 + n   |
//! | 3      | Ack      | 4       |
//! | 4      | Done     | 1       |
//! | 5      | Cancel   | 2       |
//! | 6      | Abort    | 2       |
//!
//! ## Session Flow
//! The sender offers a transfer with `Start`, the receiver binds its own
//! session ID with `Accept`, chunks travel as `Data` and are acknowledged one
//! by one with `Ack`, and `Done` completes the transfer. `Cancel` (receiver)
//! and `Abort` (sender) end it early with a [`Reason`]. Sequencing, retries
//! and timeouts are left to the session driver; this module only defines the
//! bytes.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use xfer_core::{ByteCursor, Result, XferError};

/// Largest payload one `Data` frame can carry
pub const MAX_CHUNK_SIZE: usize = 65535;
/// Width of the type name field in `Start`
pub const START_TYPE_LEN: usize = 128;

pub const START_SIZE: usize = 1 + 1 + 4 + START_TYPE_LEN + 1 + 3;
pub const ACCEPT_SIZE: usize = 2;
/// Fixed part of a `Data` payload, before the chunk bytes
pub const DATA_HEADER_SIZE: usize = 6;
pub const ACK_SIZE: usize = 4;
pub const DONE_SIZE: usize = 1;
pub const CANCEL_SIZE: usize = 2;
pub const ABORT_SIZE: usize = 2;

/// Frame kind identifier, the first byte of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Start = 0,
    Accept = 1,
    Data = 2,
    Ack = 3,
    Done = 4,
    Cancel = 5,
    Abort = 6,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Opcode::Start),
            1 => Some(Opcode::Accept),
            2 => Some(Opcode::Data),
            3 => Some(Opcode::Ack),
            4 => Some(Opcode::Done),
            5 => Some(Opcode::Cancel),
            6 => Some(Opcode::Abort),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Why a transfer was cancelled or aborted
///
/// Codes outside the known set are kept as `Unknown` so they survive a
/// decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reason {
    /// The peer closed the session
    Closed,
    SendTimeout,
    RecvTimeout,
    Unknown(u8),
}

impl Reason {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Reason::Closed,
            2 => Reason::SendTimeout,
            3 => Reason::RecvTimeout,
            other => Reason::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Reason::Closed => 1,
            Reason::SendTimeout => 2,
            Reason::RecvTimeout => 3,
            Reason::Unknown(other) => other,
        }
    }
}

/// Payload encoding shared by all frame kinds
///
/// `encode` and `decode` handle the payload only; the opcode byte is
/// written and read by [`encode_frame`] and [`decode_frame`].
pub trait FrameCodec: Sized {
    const OPCODE: Opcode;

    /// Payload size in bytes
    fn encode_size(&self) -> usize;

    /// Write the payload into `buf`, returning the bytes written
    fn encode(&self, buf: &mut [u8]) -> Result<usize>;

    /// Read the payload from the start of `buf`
    fn decode(buf: &[u8]) -> Result<Self>;
}

#[inline]
fn check_room(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(XferError::ShortBuffer {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

// ============================================================================
// START
// ============================================================================

/// Sender offers a transfer
///
/// # Payload
/// ```text
/// {u8 action}{u8 flags}{u32 size}{char[128] type_name}{u8 send_id}{u8[3] reserved}
/// ```
/// The type name is NUL-padded inside its fixed field. A name of exactly 128
/// bytes fills the field with no terminator; longer names are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Start {
    pub action: u8,
    pub flags: u8,
    /// Total size of the payload being transferred
    pub size: u32,
    /// What is being transferred
    pub type_name: String,
    /// Session ID chosen by the sender
    pub send_id: u8,
}

impl Start {
    fn check_type_name(&self) -> Result<()> {
        if self.type_name.len() > START_TYPE_LEN {
            return Err(XferError::TextTooLong {
                field: "start type name",
                len: self.type_name.len(),
                max: START_TYPE_LEN,
            });
        }
        Ok(())
    }
}

impl FrameCodec for Start {
    const OPCODE: Opcode = Opcode::Start;

    fn encode_size(&self) -> usize {
        START_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        self.check_type_name()?;
        check_room(buf, START_SIZE)?;
        let type_name = self.type_name.as_bytes();

        let mut out = &mut buf[..];
        out.put_u8(self.action);
        out.put_u8(self.flags);
        out.put_u32_le(self.size);
        out.put_slice(type_name);
        out.put_bytes(0, START_TYPE_LEN - type_name.len());
        out.put_u8(self.send_id);
        out.put_bytes(0, 3);
        Ok(START_SIZE)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        let start = Start {
            action: cursor.read_u8()?,
            flags: cursor.read_u8()?,
            size: cursor.read_u32()?,
            type_name: cursor.read_fixed_cstring(START_TYPE_LEN)?,
            send_id: cursor.read_u8()?,
        };
        cursor.read_bytes(3)?;
        Ok(start)
    }
}

// ============================================================================
// ACCEPT
// ============================================================================

/// Receiver accepts a transfer and binds its own session ID
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Accept {
    /// Session ID chosen by the receiver
    pub recv_id: u8,
    /// Echo of the sender's session ID from `Start`
    pub send_id: u8,
}

impl FrameCodec for Accept {
    const OPCODE: Opcode = Opcode::Accept;

    fn encode_size(&self) -> usize {
        ACCEPT_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        check_room(buf, ACCEPT_SIZE)?;
        let mut out = &mut buf[..];
        out.put_u8(self.recv_id);
        out.put_u8(self.send_id);
        Ok(ACCEPT_SIZE)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Accept {
            recv_id: cursor.read_u8()?,
            send_id: cursor.read_u8()?,
        })
    }
}

// ============================================================================
// DATA
// ============================================================================

/// One chunk of the transferred payload
///
/// # Payload
/// ```text
/// {u8 recv_id}{u8 token}{u16 seq}{u16 len}{u8[len] data}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Data {
    pub recv_id: u8,
    /// Flow token echoed back in the matching `Ack`
    pub token: u8,
    /// Chunk sequence number
    pub seq: u16,
    pub data: Bytes,
}

impl Data {
    fn check_len(&self) -> Result<()> {
        if self.data.len() > MAX_CHUNK_SIZE {
            return Err(XferError::PayloadTooLarge {
                len: self.data.len(),
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(())
    }
}

impl FrameCodec for Data {
    const OPCODE: Opcode = Opcode::Data;

    fn encode_size(&self) -> usize {
        DATA_HEADER_SIZE + self.data.len()
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        self.check_len()?;
        let size = self.encode_size();
        check_room(buf, size)?;

        let mut out = &mut buf[..];
        out.put_u8(self.recv_id);
        out.put_u8(self.token);
        out.put_u16_le(self.seq);
        out.put_u16_le(self.data.len() as u16);
        out.put_slice(&self.data);
        Ok(size)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        let recv_id = cursor.read_u8()?;
        let token = cursor.read_u8()?;
        let seq = cursor.read_u16()?;
        let len = usize::from(cursor.read_u16()?);
        let data = Bytes::copy_from_slice(cursor.read_bytes(len)?);
        Ok(Data {
            recv_id,
            token,
            seq,
            data,
        })
    }
}

// ============================================================================
// ACK
// ============================================================================

/// Acknowledges one `Data` frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub recv_id: u8,
    pub token: u8,
    pub seq: u16,
}

impl FrameCodec for Ack {
    const OPCODE: Opcode = Opcode::Ack;

    fn encode_size(&self) -> usize {
        ACK_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        check_room(buf, ACK_SIZE)?;
        let mut out = &mut buf[..];
        out.put_u8(self.recv_id);
        out.put_u8(self.token);
        out.put_u16_le(self.seq);
        Ok(ACK_SIZE)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Ack {
            recv_id: cursor.read_u8()?,
            token: cursor.read_u8()?,
            seq: cursor.read_u16()?,
        })
    }
}

// ============================================================================
// DONE / CANCEL / ABORT
// ============================================================================

/// Transfer completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Done {
    pub recv_id: u8,
}

impl FrameCodec for Done {
    const OPCODE: Opcode = Opcode::Done;

    fn encode_size(&self) -> usize {
        DONE_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        check_room(buf, DONE_SIZE)?;
        buf[0] = self.recv_id;
        Ok(DONE_SIZE)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Done {
            recv_id: cursor.read_u8()?,
        })
    }
}

/// Receiver gives up on a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cancel {
    pub recv_id: u8,
    pub reason: Reason,
}

impl FrameCodec for Cancel {
    const OPCODE: Opcode = Opcode::Cancel;

    fn encode_size(&self) -> usize {
        CANCEL_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        check_room(buf, CANCEL_SIZE)?;
        let mut out = &mut buf[..];
        out.put_u8(self.recv_id);
        out.put_u8(self.reason.as_u8());
        Ok(CANCEL_SIZE)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Cancel {
            recv_id: cursor.read_u8()?,
            reason: Reason::from_u8(cursor.read_u8()?),
        })
    }
}

/// Sender gives up on a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Abort {
    pub recv_id: u8,
    pub reason: Reason,
}

impl FrameCodec for Abort {
    const OPCODE: Opcode = Opcode::Abort;

    fn encode_size(&self) -> usize {
        ABORT_SIZE
    }

    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        check_room(buf, ABORT_SIZE)?;
        let mut out = &mut buf[..];
        out.put_u8(self.recv_id);
        out.put_u8(self.reason.as_u8());
        Ok(ABORT_SIZE)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buf);
        Ok(Abort {
            recv_id: cursor.read_u8()?,
            reason: Reason::from_u8(cursor.read_u8()?),
        })
    }
}

// ============================================================================
// GENERIC FRAMING
// ============================================================================

/// Any chunked transfer frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "frame")]
pub enum Frame {
    Start(Start),
    Accept(Accept),
    Data(Data),
    Ack(Ack),
    Done(Done),
    Cancel(Cancel),
    Abort(Abort),
}

impl Frame {
    pub fn opcode(&self) -> Opcode {
        match self {
            Frame::Start(_) => Start::OPCODE,
            Frame::Accept(_) => Accept::OPCODE,
            Frame::Data(_) => Data::OPCODE,
            Frame::Ack(_) => Ack::OPCODE,
            Frame::Done(_) => Done::OPCODE,
            Frame::Cancel(_) => Cancel::OPCODE,
            Frame::Abort(_) => Abort::OPCODE,
        }
    }

    /// Payload size, excluding the opcode byte
    pub fn encode_size(&self) -> usize {
        match self {
            Frame::Start(f) => f.encode_size(),
            Frame::Accept(f) => f.encode_size(),
            Frame::Data(f) => f.encode_size(),
            Frame::Ack(f) => f.encode_size(),
            Frame::Done(f) => f.encode_size(),
            Frame::Cancel(f) => f.encode_size(),
            Frame::Abort(f) => f.encode_size(),
        }
    }

    /// Full frame size on the wire
    pub fn wire_size(&self) -> usize {
        1 + self.encode_size()
    }

    fn encode_payload(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Frame::Start(f) => f.encode(buf),
            Frame::Accept(f) => f.encode(buf),
            Frame::Data(f) => f.encode(buf),
            Frame::Ack(f) => f.encode(buf),
            Frame::Done(f) => f.encode(buf),
            Frame::Cancel(f) => f.encode(buf),
            Frame::Abort(f) => f.encode(buf),
        }
    }

    /// Encode into a freshly allocated buffer
    /// Reject field values the wire format cannot carry
    fn check_encodable(&self) -> Result<()> {
        match self {
            Frame::Start(start) => start.check_type_name(),
            Frame::Data(data) => data.check_len(),
            _ => Ok(()),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        self.check_encodable()?;
        let mut buf = BytesMut::zeroed(self.wire_size());
        encode_frame(&mut buf, self)?;
        Ok(buf.freeze())
    }
}

/// Write `frame` (opcode and payload) to the start of `buf`
///
/// Returns the number of bytes written, always `1 + frame.encode_size()`.
/// Nothing is written when an error is returned.
pub fn encode_frame(buf: &mut [u8], frame: &Frame) -> Result<usize> {
    frame.check_encodable()?;
    check_room(buf, frame.wire_size())?;

    buf[0] = frame.opcode().as_u8();
    let written = 1 + frame.encode_payload(&mut buf[1..])?;
    tracing::trace!("Encoded {:?} frame ({} bytes)", frame.opcode(), written);
    Ok(written)
}

/// Read one frame from the start of `buf`
///
/// Returns the frame and the number of bytes it occupied.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize)> {
    let (&opcode_byte, payload) = buf.split_first().ok_or(XferError::eof(1, 0))?;
    let opcode = Opcode::from_u8(opcode_byte).ok_or(XferError::UnknownOpcode(opcode_byte))?;

    let frame = match opcode {
        Opcode::Start => Frame::Start(Start::decode(payload)?),
        Opcode::Accept => Frame::Accept(Accept::decode(payload)?),
        Opcode::Data => Frame::Data(Data::decode(payload)?),
        Opcode::Ack => Frame::Ack(Ack::decode(payload)?),
        Opcode::Done => Frame::Done(Done::decode(payload)?),
        Opcode::Cancel => Frame::Cancel(Cancel::decode(payload)?),
        Opcode::Abort => Frame::Abort(Abort::decode(payload)?),
    };

    let consumed = frame.wire_size();
    tracing::trace!("Decoded {:?} frame ({} bytes)", opcode, consumed);
    Ok((frame, consumed))
}

/// Iterates over back-to-back frames in a buffer
///
/// Stops after the first error, since the position of the next frame is
/// unknown once one fails to decode.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// Offset of the next frame within the original buffer
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for FrameReader<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        match decode_frame(&self.buf[self.offset..]) {
            Ok((frame, consumed)) => {
                self.offset += consumed;
                Some(Ok(frame))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
