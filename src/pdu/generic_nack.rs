use crate::codec::{CodecError, Decodable, Encodable, PduHeader};
use crate::pdu::{CommandId, CommandStatus};
use bytes::BytesMut;
use std::io::Cursor;

/// generic_nack (Section 4.3.1). Sent in place of a proper response when a
/// request cannot be attributed to a supported operation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericNack {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl Encodable for GenericNack {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: CommandId::GenericNack,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf);
    }
}

impl Decodable for GenericNack {
    fn decode_body(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(GenericNack {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}
