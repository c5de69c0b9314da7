//! Provides a type representing one SMPP protocol frame as well as the
//! check/parse pair the buffered connection reader drives.

use crate::codec::{CodecError, Decodable, Encodable, PduHeader};
use crate::pdu::{
    Bind, BindResponse, CommandId, DeliverSm, DeliverSmResponse, EnquireLink, EnquireLinkResponse,
    GenericNack, SubmitSm, SubmitSmResponse, Unbind, UnbindResponse,
};
use bytes::{Buf, Bytes};
use core::fmt;
use std::io::Cursor;

/// One decoded SMPP PDU, restricted to the operations the gateway speaks
/// (spec Section 6: binds, submit, deliver, unbind, enquire_link, nack).
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Bind(Bind),
    BindResponse(BindResponse),
    SubmitSm(Box<SubmitSm>),
    SubmitSmResponse(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResponse(DeliverSmResponse),
    EnquireLink(EnquireLink),
    EnquireLinkResponse(EnquireLinkResponse),
    Unbind(Unbind),
    UnbindResponse(UnbindResponse),
    GenericNack(GenericNack),
}

#[derive(Debug)]
pub enum Error {
    /// Not enough data is available to parse a full frame
    Incomplete,

    /// Invalid frame encoding
    Codec(CodecError),
}

impl Frame {
    /// Checks whether an entire PDU can be decoded from `src`, returning its
    /// command_length when it can. This peek is much cheaper than a full
    /// parse and lets the reader wait for more data without allocating.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<usize, Error> {
        if src.remaining() < 4 {
            return Err(Error::Incomplete);
        }
        let command_length = peek_u32(src) as usize;
        if command_length < PduHeader::SIZE {
            return Err(Error::Codec(CodecError::InvalidPduLength(
                command_length as u32,
            )));
        }
        if command_length > crate::codec::MAX_PDU_SIZE as usize {
            return Err(Error::Codec(CodecError::InvalidPduLength(
                command_length as u32,
            )));
        }
        if command_length > src.remaining() {
            return Err(Error::Incomplete);
        }
        Ok(command_length)
    }

    /// Parses one frame. The caller has already validated availability with
    /// `check`; `src` is positioned at the first header octet.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        let header = PduHeader::decode(src)?;

        let frame = match header.command_id {
            CommandId::BindTransmitter | CommandId::BindReceiver | CommandId::BindTransceiver => {
                Frame::Bind(Bind::decode_body(&header, src)?)
            }
            CommandId::BindTransmitterResp
            | CommandId::BindReceiverResp
            | CommandId::BindTransceiverResp => {
                Frame::BindResponse(BindResponse::decode_body(&header, src)?)
            }
            CommandId::SubmitSm => Frame::SubmitSm(Box::new(SubmitSm::decode_body(&header, src)?)),
            CommandId::SubmitSmResp => {
                Frame::SubmitSmResponse(SubmitSmResponse::decode_body(&header, src)?)
            }
            CommandId::DeliverSm => {
                Frame::DeliverSm(Box::new(DeliverSm::decode_body(&header, src)?))
            }
            CommandId::DeliverSmResp => {
                Frame::DeliverSmResponse(DeliverSmResponse::decode_body(&header, src)?)
            }
            CommandId::EnquireLink => Frame::EnquireLink(EnquireLink::decode_body(&header, src)?),
            CommandId::EnquireLinkResp => {
                Frame::EnquireLinkResponse(EnquireLinkResponse::decode_body(&header, src)?)
            }
            CommandId::Unbind => Frame::Unbind(Unbind::decode_body(&header, src)?),
            CommandId::UnbindResp => Frame::UnbindResponse(UnbindResponse::decode_body(&header, src)?),
            CommandId::GenericNack => Frame::GenericNack(GenericNack::decode_body(&header, src)?),
        };

        Ok(frame)
    }

    /// Encode this frame to wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Frame::Bind(pdu) => pdu.to_bytes(),
            Frame::BindResponse(pdu) => pdu.to_bytes(),
            Frame::SubmitSm(pdu) => pdu.to_bytes(),
            Frame::SubmitSmResponse(pdu) => pdu.to_bytes(),
            Frame::DeliverSm(pdu) => pdu.to_bytes(),
            Frame::DeliverSmResponse(pdu) => pdu.to_bytes(),
            Frame::EnquireLink(pdu) => pdu.to_bytes(),
            Frame::EnquireLinkResponse(pdu) => pdu.to_bytes(),
            Frame::Unbind(pdu) => pdu.to_bytes(),
            Frame::UnbindResponse(pdu) => pdu.to_bytes(),
            Frame::GenericNack(pdu) => pdu.to_bytes(),
        }
    }

    /// Sequence number carried in the frame header.
    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::Bind(pdu) => pdu.sequence_number,
            Frame::BindResponse(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResponse(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResponse(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResponse(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResponse(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
        }
    }
}

fn peek_u32(src: &Cursor<&[u8]>) -> u32 {
    let start = src.position() as usize;
    let bytes = &src.get_ref()[start..start + 4];
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Error {
        match err {
            CodecError::Incomplete => Error::Incomplete,
            other => Error::Codec(other),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Incomplete => "stream ended early".fmt(fmt),
            Error::Codec(err) => err.fmt(fmt),
        }
    }
}
