//! Upstream carrier handlers.
//!
//! One handler per carrier tag, polymorphic over exactly two operations:
//! send an SMS, send an MMS. The router only ever sees the capability
//! trait; vendor specifics stay inside each implementation.

mod twilio;

pub use twilio::{TWILIO_TAG, TwilioHandler};

use crate::message::MsgQueueItem;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarrierError {
    /// The carrier API answered and said no. Retried through the broker.
    #[error("carrier rejected the message: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the carrier (timeout, DNS, TLS).
    #[error("carrier transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Capability interface of one upstream carrier (spec Section 4.6).
#[async_trait]
pub trait CarrierHandler: Send + Sync {
    async fn send_sms(&self, msg: &MsgQueueItem) -> Result<(), CarrierError>;
    async fn send_mms(&self, msg: &MsgQueueItem) -> Result<(), CarrierError>;
}

/// Handlers keyed by carrier tag. An unknown tag is a routing-time error,
/// never a panic.
#[derive(Default)]
pub struct CarrierRegistry {
    handlers: HashMap<String, Arc<dyn CarrierHandler>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        CarrierRegistry::default()
    }

    pub fn register(&mut self, tag: impl Into<String>, handler: Arc<dyn CarrierHandler>) {
        self.handlers.insert(tag.into(), handler);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn CarrierHandler>> {
        self.handlers.get(tag).cloned()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
