// ABOUTME: The three SMPP bind operations merged into one request/response pair
// ABOUTME: The gateway authenticates all bind variants identically and only records the kind

use crate::codec::{
    Decodable, Encodable, PduHeader, get_cstring_field, get_u8_field, put_cstring,
};
use crate::pdu::{
    CommandId, CommandStatus, MAX_ADDRESS_RANGE, MAX_PASSWORD, MAX_SYSTEM_ID, MAX_SYSTEM_TYPE,
};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// Which of the three bind operations a session performed (Section 4.1).
///
/// Transmitters may submit, receivers may be delivered to, transceivers do
/// both. The wire layout of the three requests is identical; only the
/// command id differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindKind {
    Transmitter,
    Receiver,
    Transceiver,
}

impl BindKind {
    pub fn request_id(self) -> CommandId {
        match self {
            BindKind::Transmitter => CommandId::BindTransmitter,
            BindKind::Receiver => CommandId::BindReceiver,
            BindKind::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn response_id(self) -> CommandId {
        match self {
            BindKind::Transmitter => CommandId::BindTransmitterResp,
            BindKind::Receiver => CommandId::BindReceiverResp,
            BindKind::Transceiver => CommandId::BindTransceiverResp,
        }
    }

    pub fn from_command(id: CommandId) -> Option<BindKind> {
        match id {
            CommandId::BindTransmitter => Some(BindKind::Transmitter),
            CommandId::BindReceiver => Some(BindKind::Receiver),
            CommandId::BindTransceiver => Some(BindKind::Transceiver),
            _ => None,
        }
    }

    /// Whether a session bound with this kind accepts deliver_sm.
    pub fn can_receive(self) -> bool {
        matches!(self, BindKind::Receiver | BindKind::Transceiver)
    }
}

/// bind_transmitter / bind_receiver / bind_transceiver (Section 4.1.1).
#[derive(Clone, Debug, PartialEq)]
pub struct Bind {
    pub kind: BindKind,
    pub sequence_number: u32,
    pub system_id: String,
    pub password: Option<String>,
    pub system_type: String,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
}

impl Bind {
    /// A v3.4 bind request with the addressing fields zeroed, which is what
    /// every client the gateway has seen actually sends.
    pub fn new(
        kind: BindKind,
        sequence_number: u32,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Bind {
            kind,
            sequence_number,
            system_id: system_id.into(),
            password: Some(password.into()),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        }
    }
}

impl Encodable for Bind {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0, // patched by to_bytes
            command_id: self.kind.request_id(),
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        put_cstring(buf, &self.system_id);
        put_cstring(buf, self.password.as_deref().unwrap_or(""));
        put_cstring(buf, &self.system_type);
        buf.put_u8(self.interface_version);
        buf.put_u8(self.addr_ton);
        buf.put_u8(self.addr_npi);
        put_cstring(buf, &self.address_range);
    }
}

impl Decodable for Bind {
    fn decode_body(
        header: &PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Self, crate::codec::CodecError> {
        let kind = BindKind::from_command(header.command_id)
            .ok_or(crate::codec::CodecError::InvalidCommandId(
                header.command_id as u32,
            ))?;
        let system_id = get_cstring_field(buf, MAX_SYSTEM_ID, "system_id")?;
        let password = get_cstring_field(buf, MAX_PASSWORD, "password")?;
        let system_type = get_cstring_field(buf, MAX_SYSTEM_TYPE, "system_type")?;
        let interface_version = get_u8_field(buf, "interface_version")?;
        let addr_ton = get_u8_field(buf, "addr_ton")?;
        let addr_npi = get_u8_field(buf, "addr_npi")?;
        let address_range = get_cstring_field(buf, MAX_ADDRESS_RANGE, "address_range")?;

        Ok(Bind {
            kind,
            sequence_number: header.sequence_number,
            system_id,
            password: if password.is_empty() {
                None
            } else {
                Some(password)
            },
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }
}

/// bind_*_resp (Section 4.1.2). Echoes the serving system id back to the
/// client; on failure the status carries the reason and the body may be
/// empty.
#[derive(Clone, Debug, PartialEq)]
pub struct BindResponse {
    pub kind: BindKind,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub system_id: String,
}

impl Encodable for BindResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0,
            command_id: self.kind.response_id(),
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        put_cstring(buf, &self.system_id);
    }
}

impl Decodable for BindResponse {
    fn decode_body(
        header: &PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Self, crate::codec::CodecError> {
        let kind = match header.command_id {
            CommandId::BindTransmitterResp => BindKind::Transmitter,
            CommandId::BindReceiverResp => BindKind::Receiver,
            CommandId::BindTransceiverResp => BindKind::Transceiver,
            other => return Err(crate::codec::CodecError::InvalidCommandId(other as u32)),
        };
        // Failed binds are allowed to omit the system_id body entirely.
        let system_id = if (buf.position() as usize) < header.command_length as usize {
            get_cstring_field(buf, MAX_SYSTEM_ID, "system_id")?
        } else {
            String::new()
        };

        Ok(BindResponse {
            kind,
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
        })
    }
}
