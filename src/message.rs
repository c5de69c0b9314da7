// ABOUTME: The universal in-flight message record exchanged between listeners, broker, and router
// ABOUTME: Serializes to the canonical JSON broker payload with the delivery handle stripped

use crate::broker::DeliveryHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The two logical broker queues (spec Section 4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Queue {
    /// Messages whose next hop is a connected client session.
    Client,
    /// Messages whose next hop is an upstream carrier API.
    Carrier,
}

impl Queue {
    pub fn as_str(self) -> &'static str {
        match self {
            Queue::Client => "client",
            Queue::Carrier => "carrier",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message type, immutable across routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sms,
    Mms,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Sms => f.write_str("sms"),
            MessageKind::Mms => f.write_str("mms"),
        }
    }
}

/// Message body: UTF-8 text for SMS, an opaque envelope for MMS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Mms(MmsEnvelope),
}

impl MessageContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Mms(_) => None,
        }
    }

    pub fn envelope(&self) -> Option<&MmsEnvelope> {
        match self {
            MessageContent::Text(_) => None,
            MessageContent::Mms(envelope) => Some(envelope),
        }
    }
}

/// MM4 envelope: transfer headers plus the multipart body, carried through
/// the gateway without interpretation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MmsEnvelope {
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl MmsEnvelope {
    pub fn new(headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        MmsEnvelope { headers, body }
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The universal in-flight message record (spec Section 3).
///
/// A message is broker-born iff `delivery` is present; that presence flips
/// the failure policy in the router (reject-with-requeue versus publish).
/// The field never crosses the wire: the broker payload is the canonical
/// JSON of everything else.
#[derive(Clone, Serialize, Deserialize)]
pub struct MsgQueueItem {
    /// Opaque correlation id attached at ingress.
    pub log_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub from: String,
    pub to: String,
    pub content: MessageContent,
    #[serde(skip)]
    pub delivery: Option<Arc<dyn DeliveryHandle>>,
    /// Pre-resolved carrier tag, when ingress already knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl MsgQueueItem {
    /// A locally born SMS (no broker delivery attached).
    pub fn sms(from: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        MsgQueueItem {
            log_id: Uuid::new_v4().to_string(),
            kind: MessageKind::Sms,
            from: from.into(),
            to: to.into(),
            content: MessageContent::Text(text.into()),
            delivery: None,
            route: None,
        }
    }

    /// A locally born MMS (no broker delivery attached).
    pub fn mms(from: impl Into<String>, to: impl Into<String>, envelope: MmsEnvelope) -> Self {
        MsgQueueItem {
            log_id: Uuid::new_v4().to_string(),
            kind: MessageKind::Mms,
            from: from.into(),
            to: to.into(),
            content: MessageContent::Mms(envelope),
            delivery: None,
            route: None,
        }
    }

    /// Attach the broker delivery that produced this message.
    pub fn with_delivery(mut self, delivery: Arc<dyn DeliveryHandle>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Canonical JSON broker payload (the `delivery` handle is skipped).
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a broker payload; the caller re-attaches the delivery handle.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

impl fmt::Debug for MsgQueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsgQueueItem")
            .field("log_id", &self.log_id)
            .field("kind", &self.kind)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("content", &self.content)
            .field("delivery", &self.delivery.is_some())
            .field("route", &self.route)
            .finish()
    }
}

// Delivery handles carry live broker state and are deliberately excluded
// from equality: two messages are the same message if their payloads match.
impl PartialEq for MsgQueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.log_id == other.log_id
            && self.kind == other.kind
            && self.from == other.from
            && self.to == other.to
            && self.content == other.content
            && self.route == other.route
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
