// ABOUTME: The routing core: drains both input channels, picks a direction, dispatches,
// ABOUTME: and applies the ack/requeue/publish terminal-action contract per message

use crate::addressing::AddressIndex;
use crate::broker::{BrokerError, QueuePublisher};
use crate::carrier::{CarrierError, CarrierRegistry};
use crate::message::{MessageKind, MsgQueueItem, Queue};
use crate::routes::RouteTable;
use crate::session::SessionError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Failure taxonomy for message dispatch (spec Section 7).
///
/// `NotBound`, `PeerSendFailed`, and `Handler` are transient and requeue;
/// `Unroutable` rejects broker-born messages back for redelivery once an
/// operator fixes routing; `Serialization` and `Broker` are drop-error.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no live session or peer for {0}")]
    NotBound(String),

    #[error("peer send failed: {0}")]
    PeerSendFailed(String),

    #[error("no client and no carrier match")]
    Unroutable,

    #[error(transparent)]
    Handler(#[from] CarrierError),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl From<SessionError> for DispatchError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotBound(number) => DispatchError::NotBound(number),
        }
    }
}

/// Delivery toward connected clients, as the router sees it. Implemented
/// over the session registry (SMS) and the MM4 peer client (MMS); tests
/// substitute recording stubs.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn deliver_sms(&self, msg: &MsgQueueItem) -> Result<(), DispatchError>;
    async fn deliver_mms(&self, msg: &MsgQueueItem) -> Result<(), DispatchError>;
}

/// Central dispatcher (spec Section 4.7).
///
/// The router is handed exactly the capabilities it needs (address
/// resolution, client delivery, broker publishing, carrier lookup) and
/// holds no reference back to the composition root.
pub struct Router {
    index: Arc<AddressIndex>,
    clients: Arc<dyn ClientSink>,
    publisher: Arc<dyn QueuePublisher>,
    carriers: Arc<CarrierRegistry>,
    routes: RouteTable,
}

impl Router {
    pub fn new(
        index: Arc<AddressIndex>,
        clients: Arc<dyn ClientSink>,
        publisher: Arc<dyn QueuePublisher>,
        carriers: Arc<CarrierRegistry>,
        routes: RouteTable,
    ) -> Arc<Self> {
        Arc::new(Router {
            index,
            clients,
            publisher,
            carriers,
            routes,
        })
    }

    /// Drain both input channels until they close. One logical consumer per
    /// channel: client-bound messages are handled inline (session writes
    /// are cheap), carrier-bound dispatch is spawned per message so a slow
    /// carrier call cannot head-of-line block the loop.
    pub async fn run(
        self: Arc<Self>,
        client_rx: mpsc::Receiver<MsgQueueItem>,
        carrier_rx: mpsc::Receiver<MsgQueueItem>,
    ) {
        let client_loop = {
            let router = self.clone();
            tokio::spawn(async move { router.client_loop(client_rx).await })
        };
        let carrier_loop = tokio::spawn(self.clone().carrier_loop(carrier_rx));
        let _ = tokio::join!(client_loop, carrier_loop);
    }

    async fn client_loop(&self, mut rx: mpsc::Receiver<MsgQueueItem>) {
        while let Some(msg) = rx.recv().await {
            self.route_client_bound(msg).await;
        }
        debug!("client channel closed");
    }

    async fn carrier_loop(self: Arc<Self>, mut rx: mpsc::Receiver<MsgQueueItem>) {
        while let Some(msg) = rx.recv().await {
            let router = self.clone();
            tokio::spawn(async move { router.route_carrier_bound(msg).await });
        }
        debug!("carrier channel closed");
    }

    /// Client-bound resolution: in-process delivery first, carrier bounce
    /// second, unroutable last.
    pub async fn route_client_bound(&self, msg: MsgQueueItem) {
        if self.index.find_client_by_number(&msg.to).is_some() {
            let delivered = match msg.kind {
                MessageKind::Sms => self.clients.deliver_sms(&msg).await,
                MessageKind::Mms => self.clients.deliver_mms(&msg).await,
            };
            match delivered {
                Ok(()) => {
                    debug!(log_id = %msg.log_id, kind = %msg.kind, to = %msg.to, "delivered to client");
                    self.finish_ack(&msg).await;
                }
                Err(err) => {
                    warn!(log_id = %msg.log_id, %err, "client delivery failed, requeueing");
                    self.finish_requeue(&msg, Queue::Client).await;
                }
            }
            return;
        }

        // Destination is not ours: bounce toward the carrier queue when the
        // source is attributable to a client.
        if self
            .index
            .client_outbound_carrier(&msg.from)
            .is_some()
        {
            self.publish_across(&msg, Queue::Carrier).await;
            return;
        }

        error!(log_id = %msg.log_id, from = %msg.from, to = %msg.to, "unroutable message");
        self.finish_unroutable(&msg).await;
    }

    /// Carrier-bound resolution: pick a handler for the destination or
    /// source, dispatch, requeue on handler failure.
    pub async fn route_carrier_bound(&self, msg: MsgQueueItem) {
        let tag = msg
            .route
            .clone()
            .or_else(|| self.index.carrier_of(&msg.to).ok())
            .or_else(|| self.index.client_outbound_carrier(&msg.from));

        let handler = self
            .routes
            .resolve(tag.as_deref(), &msg.to)
            .and_then(|route| self.carriers.get(&route.endpoint));

        let Some(handler) = handler else {
            error!(log_id = %msg.log_id, carrier = tag.as_deref().unwrap_or("-"), to = %msg.to,
                   "no carrier handler for message");
            self.finish_unroutable(&msg).await;
            return;
        };

        let sent = match msg.kind {
            MessageKind::Sms => handler.send_sms(&msg).await,
            MessageKind::Mms => handler.send_mms(&msg).await,
        };
        match sent {
            Ok(()) => {
                debug!(log_id = %msg.log_id, kind = %msg.kind, to = %msg.to, "dispatched to carrier");
                self.finish_ack(&msg).await;
            }
            Err(err) => {
                warn!(log_id = %msg.log_id, %err, "carrier dispatch failed, requeueing");
                self.finish_requeue(&msg, Queue::Carrier).await;
            }
        }
    }

    /// Publish the message onto the opposite queue; terminal on success
    /// (the inbound delivery, if any, is acked).
    async fn publish_across(&self, msg: &MsgQueueItem, queue: Queue) {
        let payload = match msg.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                error!(log_id = %msg.log_id, %err, "serialization failed, dropping");
                self.finish_drop(msg).await;
                return;
            }
        };
        if let Err(err) = self.publisher.publish(queue, payload).await {
            error!(log_id = %msg.log_id, %err, "broker publish failed, dropping");
            self.finish_drop(msg).await;
            return;
        }
        debug!(log_id = %msg.log_id, %queue, "published across");
        self.finish_ack(msg).await;
    }

    // Terminal actions (spec Section 4.7). Exactly one runs per message.

    /// ack: settle the broker delivery; a no-op for locally born messages.
    async fn finish_ack(&self, msg: &MsgQueueItem) {
        if let Some(delivery) = &msg.delivery {
            if let Err(err) = delivery.ack().await {
                error!(log_id = %msg.log_id, %err, "broker ack failed");
            }
        }
    }

    /// requeue: broker-born messages are left in the broker via
    /// reject-with-requeue; locally born ones are persisted into it by
    /// publishing their JSON onto the originating queue.
    async fn finish_requeue(&self, msg: &MsgQueueItem, origin: Queue) {
        match &msg.delivery {
            Some(delivery) => {
                if let Err(err) = delivery.reject(true).await {
                    error!(log_id = %msg.log_id, %err, "broker reject failed");
                }
            }
            None => {
                let payload = match msg.to_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        error!(log_id = %msg.log_id, %err, "requeue serialization failed, dropping");
                        return;
                    }
                };
                if let Err(err) = self.publisher.publish(origin, payload).await {
                    error!(log_id = %msg.log_id, %err, "requeue publish failed, dropping");
                }
            }
        }
    }

    /// Unroutable terminal: broker-born messages go back for redelivery so
    /// an operator can fix routing first; locally born ones were already
    /// logged and are discarded.
    async fn finish_unroutable(&self, msg: &MsgQueueItem) {
        if let Some(delivery) = &msg.delivery {
            if let Err(err) = delivery.reject(true).await {
                error!(log_id = %msg.log_id, %err, "broker reject failed");
            }
        }
    }

    /// drop-error terminal: broker-born messages are nacked back for
    /// redelivery; locally born ones are discarded after logging.
    async fn finish_drop(&self, msg: &MsgQueueItem) {
        if let Some(delivery) = &msg.delivery {
            if let Err(err) = delivery.nack(false, true).await {
                error!(log_id = %msg.log_id, %err, "broker nack failed");
            }
        }
    }
}
