// ABOUTME: deliver_sm and deliver_sm_resp, the gateway-to-client SMS delivery pair
// ABOUTME: Shares the submit_sm mandatory field layout per Section 4.6.1

use crate::codec::{CodecError, Decodable, Encodable, PduHeader, put_cstring};
use crate::pdu::submit_sm::decode_sm_body;
use crate::pdu::{CommandId, CommandStatus, MAX_MESSAGE_ID};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// deliver_sm (Section 4.6.1): the gateway pushes a short message to a
/// bound receiver or transceiver session. The wire layout is identical to
/// submit_sm; schedule_delivery_time and validity_period must be null.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    pub sequence_number: u32,
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
    pub short_message: Vec<u8>,
}

impl DeliverSm {
    /// Build a plain-text delivery toward a bound peer.
    pub fn for_text(
        sequence_number: u32,
        source_addr: impl Into<String>,
        destination_addr: impl Into<String>,
        text: &str,
    ) -> Self {
        DeliverSm {
            sequence_number,
            service_type: String::new(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            source_addr: source_addr.into(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: destination_addr.into(),
            esm_class: 0,
            protocol_id: 0,
            priority_flag: 0,
            registered_delivery: 0,
            data_coding: 0,
            short_message: text.as_bytes().to_vec(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.short_message).into_owned()
    }
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSm,
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        put_cstring(buf, &self.service_type);
        buf.put_u8(self.source_addr_ton);
        buf.put_u8(self.source_addr_npi);
        put_cstring(buf, &self.source_addr);
        buf.put_u8(self.dest_addr_ton);
        buf.put_u8(self.dest_addr_npi);
        put_cstring(buf, &self.destination_addr);
        buf.put_u8(self.esm_class);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag);
        put_cstring(buf, ""); // schedule_delivery_time, always null
        put_cstring(buf, ""); // validity_period, always null
        buf.put_u8(self.registered_delivery);
        buf.put_u8(0); // replace_if_present_flag, always null
        buf.put_u8(self.data_coding);
        buf.put_u8(0); // sm_default_msg_id, always null
        let take = self.short_message.len().min(254);
        buf.put_u8(take as u8);
        buf.put_slice(&self.short_message[..take]);
    }
}

impl Decodable for DeliverSm {
    fn decode_body(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let body = decode_sm_body(header, buf)?;
        Ok(DeliverSm {
            sequence_number: header.sequence_number,
            service_type: body.service_type,
            source_addr_ton: body.source_addr_ton,
            source_addr_npi: body.source_addr_npi,
            source_addr: body.source_addr,
            dest_addr_ton: body.dest_addr_ton,
            dest_addr_npi: body.dest_addr_npi,
            destination_addr: body.destination_addr,
            esm_class: body.esm_class,
            protocol_id: body.protocol_id,
            priority_flag: body.priority_flag,
            registered_delivery: body.registered_delivery,
            data_coding: body.data_coding,
            short_message: body.short_message,
        })
    }
}

/// deliver_sm_resp (Section 4.6.2). The message_id field is unused and
/// must be null.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSmResp,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        put_cstring(buf, "");
    }
}

impl Decodable for DeliverSmResponse {
    fn decode_body(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        // Tolerate peers that omit the null message_id entirely.
        if (buf.position() as usize) < header.command_length as usize {
            let _ = crate::codec::get_cstring_field(buf, MAX_MESSAGE_ID, "message_id")?;
        }
        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}
