//! Protocol listeners: SMPP over TCP for SMS clients, MM4 (SMTP-derived)
//! for MMS. Both translate inbound submissions into `MsgQueueItem`s on the
//! router's client channel and carry the outbound half of their protocol.

mod mm4;
mod smpp;

pub use mm4::{Mm4Error, Mm4Listener, Mm4Outbound};
pub use smpp::SmppListener;
