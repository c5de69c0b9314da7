pub mod addressing;
pub mod broker;
pub mod carrier;
pub mod codec;
pub mod config;
pub mod connection;
pub mod frame;
pub mod gateway;
pub mod listener;
pub mod message;
pub mod pdu;
pub mod router;
pub mod routes;
pub mod session;

#[cfg(test)]
mod tests;

// Re-export the types most callers touch so the binary and integration
// consumers do not have to spell out module paths.
pub use codec::{CodecError, Decodable, Encodable, PduHeader};
pub use frame::Frame;
pub use gateway::Gateway;
pub use message::{MessageContent, MessageKind, MmsEnvelope, MsgQueueItem, Queue};
pub use router::{ClientSink, DispatchError, Router};

/// Error returned by the connection and composition layers.
///
/// The protocol, broker, carrier, and routing modules each define a
/// specialized error `enum`; this boxed type is only used where errors of
/// several of those kinds funnel into one task result (accept loops, the
/// gateway runner). Hot paths such as frame parsing keep their own enums so
/// an expected partial read never allocates.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
