use crate::codec::{CodecError, Decodable, Encodable, PduHeader};
use crate::pdu::{CommandId, CommandStatus};
use bytes::BytesMut;
use std::io::Cursor;

/// enquire_link (Section 4.11.1). Body-less keep-alive probe; either side
/// may send it in a bound session.
#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLink {
    pub sequence_number: u32,
}

/// enquire_link_resp (Section 4.11.2). Always carries ESME_ROK.
#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLinkResponse {
    pub sequence_number: u32,
}

impl Encodable for EnquireLink {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: CommandId::EnquireLink,
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        }
        .encode(buf);
    }
}

impl Decodable for EnquireLink {
    fn decode_body(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(EnquireLink {
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for EnquireLinkResponse {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: CommandId::EnquireLinkResp,
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        }
        .encode(buf);
    }
}

impl Decodable for EnquireLinkResponse {
    fn decode_body(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(EnquireLinkResponse {
            sequence_number: header.sequence_number,
        })
    }
}
