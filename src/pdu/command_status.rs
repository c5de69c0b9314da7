// ABOUTME: SMPP v3.4 command status codes returned in response PDU headers
// ABOUTME: Covers the ESME_R* values the gateway emits or expects from peers

use num_enum::TryFromPrimitive;

/// SMPP v3.4 command status (Section 5.1.3).
///
/// Requests always carry `Ok`; responses carry the outcome of the request.
/// The set is trimmed to the statuses a gateway produces plus the ones
/// well-behaved clients are known to send back on deliver_sm_resp.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// ESME_ROK: no error
    Ok = 0x0000_0000,
    /// ESME_RINVMSGLEN: message length is invalid
    InvalidMsgLength = 0x0000_0001,
    /// ESME_RINVCMDLEN: command length is invalid
    InvalidCommandLength = 0x0000_0002,
    /// ESME_RINVCMDID: invalid command id
    InvalidCommandId = 0x0000_0003,
    /// ESME_RINVBNDSTS: incorrect bind status for given command
    InvalidBindStatus = 0x0000_0004,
    /// ESME_RALYBND: ESME already in bound state
    AlreadyBound = 0x0000_0005,
    /// ESME_RSYSERR: system error
    SystemError = 0x0000_0008,
    /// ESME_RINVSRCADR: invalid source address
    InvalidSourceAddress = 0x0000_000A,
    /// ESME_RINVDSTADR: invalid destination address
    InvalidDestAddress = 0x0000_000B,
    /// ESME_RINVMSGID: message id is invalid
    InvalidMessageId = 0x0000_000C,
    /// ESME_RBINDFAIL: bind failed
    BindFailed = 0x0000_000D,
    /// ESME_RINVPASWD: invalid password
    InvalidPassword = 0x0000_000E,
    /// ESME_RINVSYSID: invalid system id
    InvalidSystemId = 0x0000_000F,
    /// ESME_RMSGQFUL: message queue full
    MessageQueueFull = 0x0000_0014,
    /// ESME_RSUBMITFAIL: submit_sm failed
    SubmitFailed = 0x0000_0045,
    /// ESME_RTHROTTLED: throttling error, ESME exceeded message limits
    Throttled = 0x0000_0058,
    /// ESME_RUNKNOWNERR: unknown error
    UnknownError = 0x0000_00FF,
}
