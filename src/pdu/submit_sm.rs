// ABOUTME: submit_sm and submit_sm_resp, the client-to-gateway SMS submission pair
// ABOUTME: Mandatory v3.4 fields only; trailing optional TLVs are consumed but not interpreted

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, get_cstring_field, get_u8_field, put_cstring,
};
use crate::pdu::{
    CommandId, CommandStatus, MAX_ADDR, MAX_DATETIME, MAX_MESSAGE_ID, MAX_SERVICE_TYPE,
};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

/// submit_sm (Section 4.4.1): a bound client hands a short message to the
/// gateway for onward transmission.
///
/// The short message body is capped at 254 octets in v3.4; longer content
/// arrives via the message_payload TLV, which the gateway does not
/// interpret.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
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
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Vec<u8>,
}

impl SubmitSm {
    pub fn new(
        sequence_number: u32,
        source_addr: impl Into<String>,
        destination_addr: impl Into<String>,
        text: &str,
    ) -> Self {
        SubmitSm {
            sequence_number,
            service_type: String::new(),
            source_addr_ton: 1, // international
            source_addr_npi: 1, // ISDN
            source_addr: source_addr.into(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: destination_addr.into(),
            esm_class: 0,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 0,
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: text.as_bytes().to_vec(),
        }
    }

    /// The short message interpreted as text. The gateway treats SMS
    /// content as UTF-8 end to end; undecodable octets are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.short_message).into_owned()
    }
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::SubmitSm,
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        encode_sm_body(self, buf);
    }
}

impl Decodable for SubmitSm {
    fn decode_body(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let body = decode_sm_body(header, buf)?;
        Ok(SubmitSm {
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
            schedule_delivery_time: body.schedule_delivery_time,
            validity_period: body.validity_period,
            registered_delivery: body.registered_delivery,
            replace_if_present_flag: body.replace_if_present_flag,
            data_coding: body.data_coding,
            sm_default_msg_id: body.sm_default_msg_id,
            short_message: body.short_message,
        })
    }
}

/// submit_sm_resp (Section 4.4.2), carrying the gateway-assigned message id.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::SubmitSmResp,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        put_cstring(buf, &self.message_id);
    }
}

impl Decodable for SubmitSmResponse {
    fn decode_body(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let message_id = if (buf.position() as usize) < header.command_length as usize {
            get_cstring_field(buf, MAX_MESSAGE_ID, "message_id")?
        } else {
            String::new()
        };
        Ok(SubmitSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

/// The mandatory field block shared between submit_sm and deliver_sm
/// (their wire layouts are identical, Sections 4.4.1 and 4.6.1).
pub(crate) struct SmBody {
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
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Vec<u8>,
}

pub(crate) fn decode_sm_body(
    header: &PduHeader,
    buf: &mut Cursor<&[u8]>,
) -> Result<SmBody, CodecError> {
    let service_type = get_cstring_field(buf, MAX_SERVICE_TYPE, "service_type")?;
    let source_addr_ton = get_u8_field(buf, "source_addr_ton")?;
    let source_addr_npi = get_u8_field(buf, "source_addr_npi")?;
    let source_addr = get_cstring_field(buf, MAX_ADDR, "source_addr")?;
    let dest_addr_ton = get_u8_field(buf, "dest_addr_ton")?;
    let dest_addr_npi = get_u8_field(buf, "dest_addr_npi")?;
    let destination_addr = get_cstring_field(buf, MAX_ADDR, "destination_addr")?;
    let esm_class = get_u8_field(buf, "esm_class")?;
    let protocol_id = get_u8_field(buf, "protocol_id")?;
    let priority_flag = get_u8_field(buf, "priority_flag")?;
    let schedule_delivery_time = get_cstring_field(buf, MAX_DATETIME, "schedule_delivery_time")?;
    let validity_period = get_cstring_field(buf, MAX_DATETIME, "validity_period")?;
    let registered_delivery = get_u8_field(buf, "registered_delivery")?;
    let replace_if_present_flag = get_u8_field(buf, "replace_if_present_flag")?;
    let data_coding = get_u8_field(buf, "data_coding")?;
    let sm_default_msg_id = get_u8_field(buf, "sm_default_msg_id")?;
    let sm_length = get_u8_field(buf, "sm_length")? as usize;

    if buf.remaining() < sm_length {
        return Err(CodecError::Truncated("short_message"));
    }
    let mut short_message = vec![0u8; sm_length];
    buf.copy_to_slice(&mut short_message);

    // Skip any optional TLVs up to the declared command_length; the gateway
    // routes on the mandatory fields alone.
    let body_end = header.command_length as usize;
    let position = buf.position() as usize;
    if position < body_end {
        buf.advance(body_end - position);
    }

    Ok(SmBody {
        service_type,
        source_addr_ton,
        source_addr_npi,
        source_addr,
        dest_addr_ton,
        dest_addr_npi,
        destination_addr,
        esm_class,
        protocol_id,
        priority_flag,
        schedule_delivery_time,
        validity_period,
        registered_delivery,
        replace_if_present_flag,
        data_coding,
        sm_default_msg_id,
        short_message,
    })
}

fn encode_sm_body(pdu: &SubmitSm, buf: &mut BytesMut) {
    put_cstring(buf, &pdu.service_type);
    buf.put_u8(pdu.source_addr_ton);
    buf.put_u8(pdu.source_addr_npi);
    put_cstring(buf, &pdu.source_addr);
    buf.put_u8(pdu.dest_addr_ton);
    buf.put_u8(pdu.dest_addr_npi);
    put_cstring(buf, &pdu.destination_addr);
    buf.put_u8(pdu.esm_class);
    buf.put_u8(pdu.protocol_id);
    buf.put_u8(pdu.priority_flag);
    put_cstring(buf, &pdu.schedule_delivery_time);
    put_cstring(buf, &pdu.validity_period);
    buf.put_u8(pdu.registered_delivery);
    buf.put_u8(pdu.replace_if_present_flag);
    buf.put_u8(pdu.data_coding);
    buf.put_u8(pdu.sm_default_msg_id);
    buf.put_u8(pdu.short_message.len().min(254) as u8);
    let take = pdu.short_message.len().min(254);
    buf.put_slice(&pdu.short_message[..take]);
}
