// ABOUTME: Wire codec for SMPP v3.4 PDU framing shared by the listener and delivery paths
// ABOUTME: Provides header encode/decode, the Encodable/Decodable traits, and field primitives

use crate::pdu::{CommandId, CommandStatus};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum allowed PDU size, keeping a misbehaving peer from growing the
/// read buffer without bound.
pub const MAX_PDU_SIZE: u32 = 65_536;

/// SMPP v3.4 PDU header (16 octets, common to all PDUs).
///
/// Every PDU starts with the same four fields:
///  - command_length (4 octets, includes the header itself)
///  - command_id (4 octets)
///  - command_status (4 octets)
///  - sequence_number (4 octets)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: CommandId,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode a PDU header from the buffer, validating length bounds.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let raw_id = buf.get_u32();
        let command_id =
            CommandId::try_from(raw_id).map_err(|_| CodecError::InvalidCommandId(raw_id))?;
        let raw_status = buf.get_u32();
        let command_status = CommandStatus::try_from(raw_status)
            .map_err(|_| CodecError::InvalidCommandStatus(raw_status))?;
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength(command_length));
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.command_status as u32);
        buf.put_u32(self.sequence_number);
    }
}

/// Types that can be encoded into an SMPP wire frame.
pub trait Encodable {
    /// Encode this PDU into `buf`, header first. Implementations write a
    /// placeholder command_length; `to_bytes` fixes it up afterwards.
    fn encode(&self, buf: &mut BytesMut);

    /// Encode into a fresh buffer and patch the command_length field.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf);

        let length = buf.len() as u32;
        buf[0..4].copy_from_slice(&length.to_be_bytes());
        buf.freeze()
    }
}

/// Types that can be decoded from the body of an SMPP wire frame.
///
/// The header has already been consumed by the caller; `buf` is positioned
/// at the first body octet.
pub trait Decodable: Sized {
    fn decode_body(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;
}

#[derive(Debug, Error)]
pub enum CodecError {
    /// Not enough data is buffered to decode a full PDU. Expected during
    /// normal operation while a frame is still arriving.
    #[error("not enough data to decode a full PDU")]
    Incomplete,

    #[error("unknown command_id {0:#010x}")]
    InvalidCommandId(u32),

    #[error("unknown command_status {0:#010x}")]
    InvalidCommandStatus(u32),

    #[error("command_length {0} outside allowed bounds")]
    InvalidPduLength(u32),

    #[error("{field} exceeds the {max} octet limit")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("{0} field is truncated")]
    Truncated(&'static str),

    #[error("{0} field is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

/// Read a null-terminated C-octet-string of at most `max` octets
/// (terminator included), per the field tables in SMPP v3.4 Section 4.
pub(crate) fn get_cstring_field(
    buf: &mut Cursor<&[u8]>,
    max: usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let mut bytes = Vec::new();
    loop {
        if !buf.has_remaining() {
            return Err(CodecError::Truncated(field));
        }
        match buf.get_u8() {
            0 => break,
            b => bytes.push(b),
        }
        if bytes.len() >= max {
            return Err(CodecError::FieldTooLong { field, max });
        }
    }
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(field))
}

/// Write a string as a null-terminated C-octet-string.
pub(crate) fn put_cstring(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

pub(crate) fn get_u8_field(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<u8, CodecError> {
    if !buf.has_remaining() {
        return Err(CodecError::Truncated(field));
    }
    Ok(buf.get_u8())
}
