// ABOUTME: SMPP listener: accepts TCP binds, authenticates, and turns submit_sm into messages
// ABOUTME: One task per connection; the bound session's writer half lives in the registry

use crate::addressing::AddressIndex;
use crate::connection;
use crate::frame::Frame;
use crate::message::MsgQueueItem;
use crate::pdu::{
    BindResponse, CommandStatus, EnquireLinkResponse, GenericNack, SubmitSmResponse,
    UnbindResponse,
};
use crate::session::{SessionRegistry, SmppSession};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Accepts SMPP client connections (spec Section 4.3).
///
/// Per-connection state machine: Accept → AwaitBind → Bound → Closed. The
/// first PDU must be a bind; credentials are checked against the address
/// index, and a successful bind registers the session (replacing any prior
/// bind for the same username).
pub struct SmppListener {
    listener: TcpListener,
    index: Arc<AddressIndex>,
    sessions: Arc<SessionRegistry>,
    ingress: mpsc::Sender<MsgQueueItem>,
}

impl SmppListener {
    pub async fn bind(
        addr: &str,
        index: Arc<AddressIndex>,
        sessions: Arc<SessionRegistry>,
        ingress: mpsc::Sender<MsgQueueItem>,
    ) -> crate::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(SmppListener {
            listener,
            index,
            sessions,
            ingress,
        })
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the listening socket errors or the task is
    /// dropped at shutdown; each connection gets its own task.
    pub async fn run(self) -> crate::Result<()> {
        info!(addr = %self.listener.local_addr()?, "SMPP listener started");
        loop {
            let (socket, peer) = self.listener.accept().await?;
            let index = self.index.clone();
            let sessions = self.sessions.clone();
            let ingress = self.ingress.clone();
            tokio::spawn(async move {
                handle_connection(socket, peer, index, sessions, ingress).await;
            });
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    index: Arc<AddressIndex>,
    sessions: Arc<SessionRegistry>,
    ingress: mpsc::Sender<MsgQueueItem>,
) {
    let (mut reader, mut writer) = connection::split(socket);

    // AwaitBind: the first frame decides whether a session exists at all.
    let bind = match reader.read_frame().await {
        Ok(Some(Frame::Bind(bind))) => bind,
        Ok(Some(other)) => {
            debug!(%peer, frame = ?other, "PDU before bind, closing");
            let nack = GenericNack {
                command_status: CommandStatus::InvalidBindStatus,
                sequence_number: other.sequence_number(),
            };
            let _ = writer.write_frame(&Frame::GenericNack(nack)).await;
            return;
        }
        Ok(None) => return,
        Err(err) => {
            debug!(%peer, %err, "read error before bind");
            return;
        }
    };

    let password = bind.password.as_deref().unwrap_or("");
    let client = match index.authenticate(&bind.system_id, password) {
        Some(client) => client,
        None => {
            warn!(%peer, system_id = %bind.system_id, "bind authentication failed");
            let refusal = BindResponse {
                kind: bind.kind,
                command_status: CommandStatus::BindFailed,
                sequence_number: bind.sequence_number,
                system_id: bind.system_id.clone(),
            };
            let _ = writer.write_frame(&Frame::BindResponse(refusal)).await;
            return;
        }
    };

    // Register before acking the bind so the session is routable the moment
    // the client sees the response.
    let session = SmppSession::new(&client, bind.kind, writer);
    if let Some(replaced) = sessions.register(session.clone()) {
        debug!(username = %client.username, old = %replaced.id(), "session replaced by new bind");
    }
    let accepted = BindResponse {
        kind: bind.kind,
        command_status: CommandStatus::Ok,
        sequence_number: bind.sequence_number,
        system_id: bind.system_id.clone(),
    };
    if let Err(err) = session.send(&Frame::BindResponse(accepted)).await {
        debug!(%peer, %err, "failed to write bind response");
        sessions.drop_session(&session);
        return;
    }
    info!(%peer, username = %client.username, kind = ?bind.kind, "client bound");

    // Bound: read PDUs until the peer goes away.
    loop {
        let frame = match reader.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                debug!(%peer, username = %client.username, %err, "read error, closing session");
                break;
            }
        };

        match frame {
            Frame::SubmitSm(submit) => {
                // Respond before routing even begins; delivery is decoupled
                // through the broker (spec Section 7).
                let response = SubmitSmResponse {
                    command_status: CommandStatus::Ok,
                    sequence_number: submit.sequence_number,
                    message_id: next_message_id(),
                };
                if let Err(err) = session.send(&Frame::SubmitSmResponse(response)).await {
                    debug!(%peer, %err, "failed to write submit_sm_resp");
                    break;
                }

                let owner = index.client_of(&submit.source_addr);
                debug!(
                    username = %client.username,
                    source = %submit.source_addr,
                    dest = %submit.destination_addr,
                    owner = owner.as_ref().map(|c| c.username.as_str()).unwrap_or("-"),
                    "submit_sm accepted"
                );

                let msg =
                    MsgQueueItem::sms(&submit.source_addr, &submit.destination_addr, submit.text());
                if ingress.send(msg).await.is_err() {
                    // Router gone; nothing left to do for this process.
                    warn!(%peer, "ingress channel closed, dropping session");
                    break;
                }
            }
            Frame::EnquireLink(probe) => {
                let response = EnquireLinkResponse {
                    sequence_number: probe.sequence_number,
                };
                if session
                    .send(&Frame::EnquireLinkResponse(response))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Frame::Unbind(unbind) => {
                let response = UnbindResponse {
                    command_status: CommandStatus::Ok,
                    sequence_number: unbind.sequence_number,
                };
                let _ = session.send(&Frame::UnbindResponse(response)).await;
                break;
            }
            Frame::DeliverSmResponse(_) => {
                // Settlement of a delivery we pushed; nothing to track.
            }
            other => {
                // Anything else is echoed back to the peer.
                if session.send(&other).await.is_err() {
                    break;
                }
            }
        }
    }

    sessions.drop_session(&session);
    info!(%peer, username = %client.username, "session closed");
}

/// Message ids only need to be unique per client session; a millisecond
/// timestamp satisfies that and stays sortable in client logs.
fn next_message_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
