// ABOUTME: Composition root: builds the index, registry, broker, listeners, and router
// ABOUTME: The router receives narrow capability values; the gateway never becomes a collaborator

use crate::addressing::{AddressIndex, Client};
use crate::broker::AmqpBroker;
use crate::carrier::{CarrierRegistry, TWILIO_TAG, TwilioHandler};
use crate::config::GatewayConfig;
use crate::frame::Frame;
use crate::listener::{Mm4Error, Mm4Listener, Mm4Outbound, SmppListener};
use crate::message::{MsgQueueItem, Queue};
use crate::pdu::DeliverSm;
use crate::router::{ClientSink, DispatchError, Router};
use crate::routes::{Route, RouteTable};
use crate::session::SessionRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Depth of the router input channels. Backpressure past this point lands
/// on the broker consumers and the listener tasks, which is where it
/// belongs.
const CHANNEL_DEPTH: usize = 1024;

/// The gateway process: owns every long-lived value and wires the tasks
/// together at startup (spec Section 9: composition root, not a runtime
/// collaborator).
pub struct Gateway {
    config: GatewayConfig,
    index: Arc<AddressIndex>,
    sessions: Arc<SessionRegistry>,
    carriers: Arc<CarrierRegistry>,
}

impl Gateway {
    /// Assemble the gateway from configuration and the boot-time client
    /// records. The address data must be complete before the first message
    /// is accepted; later refreshes go through `AddressIndex::reload`.
    pub fn new(config: GatewayConfig, clients: Vec<Client>) -> crate::Result<Self> {
        let index = Arc::new(AddressIndex::with_clients(
            config.strict_number_match,
            clients,
        ));
        let sessions = SessionRegistry::new(index.clone());

        let mut carriers = CarrierRegistry::new();
        if let Some(twilio) = &config.twilio {
            carriers.register(
                TWILIO_TAG,
                Arc::new(TwilioHandler::new(twilio, config.carrier_timeout)?),
            );
        }

        Ok(Gateway {
            config,
            index,
            sessions,
            carriers: Arc::new(carriers),
        })
    }

    pub fn index(&self) -> Arc<AddressIndex> {
        self.index.clone()
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    /// Run until ctrl-c. In-flight broker deliveries that have not reached
    /// a terminal action are redelivered by the broker after exit.
    pub async fn run(self) -> crate::Result<()> {
        let broker = Arc::new(AmqpBroker::connect(&self.config.amqp_url).await?);

        let (client_tx, client_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (carrier_tx, carrier_rx) = mpsc::channel(CHANNEL_DEPTH);

        let mm4_out = Mm4Outbound::new(
            self.config.local_host.clone(),
            self.config.mm4_peers.clone(),
        );
        let sinks = Arc::new(ProtocolSinks {
            index: self.index.clone(),
            sessions: self.sessions.clone(),
            mm4: mm4_out,
        });

        // Every registered carrier is reachable through a tag route;
        // prefix routes would be appended here once provisioning carries
        // them.
        let routes = RouteTable::new(self.carriers.tags().map(Route::carrier).collect());

        let router = Router::new(
            self.index.clone(),
            sinks,
            broker.clone(),
            self.carriers.clone(),
            routes,
        );

        let smpp = SmppListener::bind(
            &self.config.smpp_bind,
            self.index.clone(),
            self.sessions.clone(),
            client_tx.clone(),
        )
        .await?;
        let mm4 = Mm4Listener::bind(
            &self.config.mm4_bind,
            self.config.local_host.clone(),
            client_tx.clone(),
        )
        .await?;

        let client_consumer = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.run_consumer(Queue::Client, client_tx).await })
        };
        let carrier_consumer = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.run_consumer(Queue::Carrier, carrier_tx).await })
        };
        let smpp_task = tokio::spawn(smpp.run());
        let mm4_task = tokio::spawn(mm4.run());
        let router_task = tokio::spawn(router.run(client_rx, carrier_rx));

        info!("gateway running");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
            }
            result = client_consumer => {
                error!(?result, "client consumer terminated");
            }
            result = carrier_consumer => {
                error!(?result, "carrier consumer terminated");
            }
            result = smpp_task => {
                error!(?result, "SMPP listener terminated");
            }
            result = mm4_task => {
                error!(?result, "MM4 listener terminated");
            }
        }
        // Dropping the remaining tasks closes the listeners and channels;
        // unacked broker deliveries are redelivered on the next start.
        router_task.abort();
        Ok(())
    }
}

/// Client-facing delivery: SMS through the bound SMPP session, MMS through
/// the destination client's MM4 peer.
pub struct ProtocolSinks {
    pub index: Arc<AddressIndex>,
    pub sessions: Arc<SessionRegistry>,
    pub mm4: Arc<Mm4Outbound>,
}

#[async_trait]
impl ClientSink for ProtocolSinks {
    async fn deliver_sms(&self, msg: &MsgQueueItem) -> Result<(), DispatchError> {
        let session = self.sessions.find_session_for_number(&msg.to)?;
        let text = msg.content.text().unwrap_or_default();
        let pdu = DeliverSm::for_text(session.next_sequence(), &msg.from, &msg.to, text);
        session
            .send(&Frame::DeliverSm(Box::new(pdu)))
            .await
            .map_err(|err| DispatchError::PeerSendFailed(err.to_string()))
    }

    async fn deliver_mms(&self, msg: &MsgQueueItem) -> Result<(), DispatchError> {
        let client = self
            .index
            .find_client_by_number(&msg.to)
            .ok_or_else(|| DispatchError::NotBound(msg.to.clone()))?;
        self.mm4
            .forward(&client.username, msg)
            .await
            .map_err(|err| match err {
                Mm4Error::NoPeer(username) => DispatchError::NotBound(username),
                other => DispatchError::PeerSendFailed(other.to_string()),
            })
    }
}
