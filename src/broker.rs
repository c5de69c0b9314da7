// ABOUTME: AMQP broker adapter: durable queue publishing, consumption, and ack primitives
// ABOUTME: Consumed payloads are decoded and pumped into the router channels with a live handle

use crate::message::{MsgQueueItem, Queue};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How many unacked deliveries the broker hands this gateway at once.
const PREFETCH: u16 = 64;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker transport error: {0}")]
    Transport(#[from] lapin::Error),
}

/// Publishing half of the broker, as the router sees it.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Fire-and-forget publish of a canonical JSON payload.
    async fn publish(&self, queue: Queue, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// Broker-side token authorizing ack/reject/nack of one consumed message
/// (spec Section 4.5).
#[async_trait]
pub trait DeliveryHandle: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
    async fn reject(&self, requeue: bool) -> Result<(), BrokerError>;
    async fn nack(&self, multiple: bool, requeue: bool) -> Result<(), BrokerError>;
}

/// AMQP 0.9.1 broker adapter. Both logical queues are declared durable on
/// connect; the broker's own durability is all the persistence the gateway
/// relies on.
pub struct AmqpBroker {
    channel: Channel,
}

impl AmqpBroker {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        for queue in [Queue::Client, Queue::Carrier] {
            channel
                .queue_declare(
                    queue.as_str(),
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }
        channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await?;

        info!(%url, "connected to broker");
        Ok(AmqpBroker { channel })
    }

    /// Consume `queue` until the channel or the router goes away, feeding
    /// each decoded message (with its delivery handle attached) into `tx`.
    ///
    /// A payload that does not decode is rejected without requeue: putting
    /// it back would redeliver it forever, and the reject leaves a trace in
    /// the broker's dead-letter accounting where one is configured.
    pub async fn run_consumer(
        &self,
        queue: Queue,
        tx: mpsc::Sender<MsgQueueItem>,
    ) -> Result<(), BrokerError> {
        let mut consumer = self
            .channel
            .basic_consume(
                queue.as_str(),
                &format!("smsgate-{queue}"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(%queue, "broker consumer started");
        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(err) => {
                    error!(%queue, %err, "broker consumer stream error");
                    return Err(err.into());
                }
            };

            match MsgQueueItem::from_payload(&delivery.data) {
                Ok(msg) => {
                    debug!(%queue, log_id = %msg.log_id, "consumed message");
                    let msg = msg.with_delivery(Arc::new(AmqpDelivery {
                        acker: delivery.acker,
                    }));
                    if tx.send(msg).await.is_err() {
                        // Router channel closed; the unacked delivery will be
                        // redelivered after this consumer goes away.
                        warn!(%queue, "router channel closed, stopping consumer");
                        return Ok(());
                    }
                }
                Err(err) => {
                    warn!(%queue, %err, "rejecting undecodable payload");
                    if let Err(err) = delivery
                        .acker
                        .reject(BasicRejectOptions { requeue: false })
                        .await
                    {
                        error!(%queue, %err, "reject of undecodable payload failed");
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl QueuePublisher for AmqpBroker {
    async fn publish(&self, queue: Queue, payload: Vec<u8>) -> Result<(), BrokerError> {
        // Fire-and-forget: the returned publisher confirm is not awaited.
        let _confirm = self
            .channel
            .basic_publish(
                "",
                queue.as_str(),
                BasicPublishOptions::default(),
                &payload,
                // delivery_mode 2: persist with the durable queue.
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?;
        Ok(())
    }
}

/// Delivery handle backed by a live lapin acker.
struct AmqpDelivery {
    acker: lapin::acker::Acker,
}

#[async_trait]
impl DeliveryHandle for AmqpDelivery {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions { multiple: false })
            .await
            .map_err(BrokerError::from)
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map_err(BrokerError::from)
    }

    async fn nack(&self, multiple: bool, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions { multiple, requeue })
            .await
            .map_err(BrokerError::from)
    }
}
