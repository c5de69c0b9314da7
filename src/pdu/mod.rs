//! The SMPP v3.4 PDU set the gateway speaks.
//!
//! Only the operations a carrier-facing gateway exchanges with bound
//! clients are modelled: the three bind variants, submit_sm, deliver_sm,
//! unbind, enquire_link, and generic_nack. Optional TLV parameters carried
//! after the mandatory fields are tolerated on decode but not interpreted.

mod bind;
mod command_id;
mod command_status;
mod deliver_sm;
mod enquire_link;
mod generic_nack;
mod submit_sm;
mod unbind;

pub use bind::{Bind, BindKind, BindResponse};
pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use deliver_sm::{DeliverSm, DeliverSmResponse};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use generic_nack::GenericNack;
pub use submit_sm::{SubmitSm, SubmitSmResponse};
pub use unbind::{Unbind, UnbindResponse};

// SMPP v3.4 field length limits, terminator octet included.
pub(crate) const MAX_SYSTEM_ID: usize = 16;
pub(crate) const MAX_PASSWORD: usize = 9;
pub(crate) const MAX_SYSTEM_TYPE: usize = 13;
pub(crate) const MAX_ADDRESS_RANGE: usize = 41;
pub(crate) const MAX_ADDR: usize = 21;
pub(crate) const MAX_SERVICE_TYPE: usize = 6;
pub(crate) const MAX_DATETIME: usize = 17;
pub(crate) const MAX_MESSAGE_ID: usize = 65;
