// ABOUTME: SMPP v3.4 command identifiers for the operations the gateway supports
// ABOUTME: Response PDUs carry the request id with bit 31 set, per Table 4-1

use num_enum::TryFromPrimitive;

/// SMPP v3.4 command identifiers (Table 4-1), restricted to the PDUs the
/// gateway exchanges with bound clients.
///
/// Bit 31 is the response indicator: a response PDU carries the request's
/// identifier with the MSB set.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// generic_nack (Section 4.3.1), the error response for invalid PDUs
    GenericNack = 0x8000_0000,

    /// bind_receiver (Section 4.1.1)
    BindReceiver = 0x0000_0001,
    /// bind_receiver_resp (Section 4.1.2)
    BindReceiverResp = 0x8000_0001,
    /// bind_transmitter (Section 4.1.1)
    BindTransmitter = 0x0000_0002,
    /// bind_transmitter_resp (Section 4.1.2)
    BindTransmitterResp = 0x8000_0002,

    /// submit_sm (Section 4.4.1), client to gateway message submission
    SubmitSm = 0x0000_0004,
    /// submit_sm_resp (Section 4.4.2)
    SubmitSmResp = 0x8000_0004,

    /// deliver_sm (Section 4.6.1), gateway to client message delivery
    DeliverSm = 0x0000_0005,
    /// deliver_sm_resp (Section 4.6.2)
    DeliverSmResp = 0x8000_0005,

    /// unbind (Section 4.2.1)
    Unbind = 0x0000_0006,
    /// unbind_resp (Section 4.2.2)
    UnbindResp = 0x8000_0006,

    /// bind_transceiver (Section 4.2.5)
    BindTransceiver = 0x0000_0009,
    /// bind_transceiver_resp (Section 4.2.6)
    BindTransceiverResp = 0x8000_0009,

    /// enquire_link (Section 4.11.1)
    EnquireLink = 0x0000_0015,
    /// enquire_link_resp (Section 4.11.2)
    EnquireLinkResp = 0x8000_0015,
}

impl CommandId {
    /// Whether this identifies a response PDU (bit 31 set).
    pub fn is_response(self) -> bool {
        (self as u32) & 0x8000_0000 != 0
    }
}
