//! Integration tests for the routing core and the protocol listeners.
//!
//! The router tests drive `route_client_bound` / `route_carrier_bound`
//! directly with recording stubs standing in for the broker, the carrier
//! APIs, and the client sinks; the listener tests run real sockets.

use crate::addressing::{AddressIndex, Client, ClientNumber, password_digest};
use crate::broker::{BrokerError, DeliveryHandle, QueuePublisher};
use crate::carrier::{CarrierError, CarrierHandler, CarrierRegistry};
use crate::connection;
use crate::frame::Frame;
use crate::gateway::ProtocolSinks;
use crate::listener::{Mm4Listener, Mm4Outbound, SmppListener};
use crate::message::{MessageContent, MessageKind, MmsEnvelope, MsgQueueItem, Queue};
use crate::pdu::{Bind, BindKind, CommandStatus, DeliverSm, SubmitSm, Unbind};
use crate::router::{ClientSink, DispatchError, Router};
use crate::routes::{Route, RouteTable};
use crate::session::SessionRegistry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Recording stubs

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeliveryEvent {
    Ack,
    Reject { requeue: bool },
    Nack { multiple: bool, requeue: bool },
}

#[derive(Default)]
struct StubDelivery {
    events: Mutex<Vec<DeliveryEvent>>,
}

impl StubDelivery {
    fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryHandle for StubDelivery {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.events.lock().unwrap().push(DeliveryEvent::Ack);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.events
            .lock()
            .unwrap()
            .push(DeliveryEvent::Reject { requeue });
        Ok(())
    }

    async fn nack(&self, multiple: bool, requeue: bool) -> Result<(), BrokerError> {
        self.events
            .lock()
            .unwrap()
            .push(DeliveryEvent::Nack { multiple, requeue });
        Ok(())
    }
}

struct RecordingPublisher {
    published: Mutex<Vec<(Queue, Vec<u8>)>>,
    fail: bool,
}

impl RecordingPublisher {
    fn new() -> Arc<Self> {
        Arc::new(RecordingPublisher {
            published: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(RecordingPublisher {
            published: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    fn published(&self) -> Vec<(Queue, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueuePublisher for RecordingPublisher {
    async fn publish(&self, queue: Queue, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.fail {
            return Err(BrokerError::Transport(lapin::Error::IOError(Arc::new(
                io::Error::new(io::ErrorKind::BrokenPipe, "stub publish failure"),
            ))));
        }
        self.published.lock().unwrap().push((queue, payload));
        Ok(())
    }
}

struct StubSink {
    delivered: Mutex<Vec<MsgQueueItem>>,
    bound: bool,
}

impl StubSink {
    fn bound() -> Arc<Self> {
        Arc::new(StubSink {
            delivered: Mutex::new(Vec::new()),
            bound: true,
        })
    }

    fn unbound() -> Arc<Self> {
        Arc::new(StubSink {
            delivered: Mutex::new(Vec::new()),
            bound: false,
        })
    }

    fn delivered(&self) -> Vec<MsgQueueItem> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientSink for StubSink {
    async fn deliver_sms(&self, msg: &MsgQueueItem) -> Result<(), DispatchError> {
        if !self.bound {
            return Err(DispatchError::NotBound(msg.to.clone()));
        }
        self.delivered.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn deliver_mms(&self, msg: &MsgQueueItem) -> Result<(), DispatchError> {
        self.deliver_sms(msg).await
    }
}

struct StubCarrier {
    sent: Mutex<Vec<MsgQueueItem>>,
    ok: bool,
}

impl StubCarrier {
    fn succeeding() -> Arc<Self> {
        Arc::new(StubCarrier {
            sent: Mutex::new(Vec::new()),
            ok: true,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(StubCarrier {
            sent: Mutex::new(Vec::new()),
            ok: false,
        })
    }

    fn sent(&self) -> Vec<MsgQueueItem> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CarrierHandler for StubCarrier {
    async fn send_sms(&self, msg: &MsgQueueItem) -> Result<(), CarrierError> {
        if !self.ok {
            return Err(CarrierError::Rejected("stub carrier says no".to_string()));
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn send_mms(&self, msg: &MsgQueueItem) -> Result<(), CarrierError> {
        self.send_sms(msg).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures

fn client_a() -> Client {
    Client {
        id: 1,
        username: "clientA".to_string(),
        password_hash: password_digest("secretA"),
        numbers: vec![ClientNumber {
            number: "+15550001".to_string(),
            client_id: 1,
            carrier: "twilio".to_string(),
        }],
    }
}

fn client_b() -> Client {
    Client {
        id: 2,
        username: "clientB".to_string(),
        password_hash: password_digest("secretB"),
        numbers: vec![ClientNumber {
            number: "+15550999".to_string(),
            client_id: 2,
            carrier: "twilio".to_string(),
        }],
    }
}

struct Fixture {
    router: Arc<Router>,
    sink: Arc<StubSink>,
    publisher: Arc<RecordingPublisher>,
    carrier: Arc<StubCarrier>,
}

fn fixture(
    clients: Vec<Client>,
    sink: Arc<StubSink>,
    publisher: Arc<RecordingPublisher>,
    carrier: Arc<StubCarrier>,
) -> Fixture {
    let index = Arc::new(AddressIndex::with_clients(false, clients));
    let mut registry = CarrierRegistry::new();
    registry.register("twilio", carrier.clone());
    let router = Router::new(
        index,
        sink.clone(),
        publisher.clone(),
        Arc::new(registry),
        RouteTable::new(vec![Route::carrier("twilio")]),
    );
    Fixture {
        router,
        sink,
        publisher,
        carrier,
    }
}

fn decode(payload: &[u8]) -> MsgQueueItem {
    MsgQueueItem::from_payload(payload).unwrap()
}

// ---------------------------------------------------------------------------
// Router scenarios (spec Section 8)

/// Client-bound SMS with a live session: sinked to the client, nothing
/// published.
#[tokio::test]
async fn client_bound_sms_with_session() {
    let f = fixture(
        vec![client_a()],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let msg = MsgQueueItem::sms("+15550999", "+15550001", "hi");

    f.router.route_client_bound(msg.clone()).await;

    assert_eq!(f.sink.delivered(), vec![msg]);
    assert!(f.publisher.published().is_empty());
    assert!(f.carrier.sent().is_empty());
}

/// Client-bound SMS without a session: a locally born message is persisted
/// into the broker on the originating queue, and the JSON round-trips.
#[tokio::test]
async fn client_bound_sms_without_session_requeues_to_broker() {
    let f = fixture(
        vec![client_a()],
        StubSink::unbound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let msg = MsgQueueItem::sms("+15550999", "+15550001", "hi");

    f.router.route_client_bound(msg.clone()).await;

    let published = f.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, Queue::Client);
    assert_eq!(decode(&published[0].1), msg);
}

/// Same, but broker-born: the delivery is rejected with requeue and no new
/// publish happens (the broker still owns the message).
#[tokio::test]
async fn broker_born_sms_without_session_rejects_with_requeue() {
    let f = fixture(
        vec![client_a()],
        StubSink::unbound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let delivery = Arc::new(StubDelivery::default());
    let msg = MsgQueueItem::sms("+15550999", "+15550001", "hi").with_delivery(delivery.clone());

    f.router.route_client_bound(msg).await;

    assert_eq!(delivery.events(), vec![DeliveryEvent::Reject { requeue: true }]);
    assert!(f.publisher.published().is_empty());
}

/// Outbound via carrier: destination unknown, source attributable to a
/// client, so the message bounces onto the carrier queue unchanged.
#[tokio::test]
async fn outbound_bounces_to_carrier_queue() {
    let f = fixture(
        vec![client_b()],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let msg = MsgQueueItem::sms("+15550999", "+15550001", "onward");

    f.router.route_client_bound(msg.clone()).await;

    assert!(f.sink.delivered().is_empty());
    let published = f.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, Queue::Carrier);
    assert_eq!(decode(&published[0].1), msg);
}

/// Carrier dispatch success acks the broker delivery.
#[tokio::test]
async fn carrier_dispatch_success_acks() {
    let f = fixture(
        vec![client_b()],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let delivery = Arc::new(StubDelivery::default());
    let mut msg = MsgQueueItem::sms("+15550999", "+15550001", "onward");
    msg.route = Some("twilio".to_string());
    let msg = msg.with_delivery(delivery.clone());

    f.router.route_carrier_bound(msg).await;

    assert_eq!(f.carrier.sent().len(), 1);
    assert_eq!(delivery.events(), vec![DeliveryEvent::Ack]);
}

/// Carrier dispatch failure rejects with requeue and never acks.
#[tokio::test]
async fn carrier_dispatch_failure_requeues() {
    let f = fixture(
        vec![client_b()],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::failing(),
    );
    let delivery = Arc::new(StubDelivery::default());
    let mut msg = MsgQueueItem::sms("+15550999", "+15550001", "onward");
    msg.route = Some("twilio".to_string());
    let msg = msg.with_delivery(delivery.clone());

    f.router.route_carrier_bound(msg).await;

    assert_eq!(delivery.events(), vec![DeliveryEvent::Reject { requeue: true }]);
}

// ---------------------------------------------------------------------------
// Router invariants (spec Section 8)

/// Direction rule: when the destination is a known client number, the
/// client path is attempted first even though the source would also
/// resolve to a carrier.
#[tokio::test]
async fn direction_rule_prefers_client_path() {
    let f = fixture(
        vec![client_a(), client_b()],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let msg = MsgQueueItem::sms("+15550999", "+15550001", "hi");

    f.router.route_client_bound(msg.clone()).await;

    assert_eq!(f.sink.delivered(), vec![msg]);
    assert!(f.publisher.published().is_empty());
}

/// Broker-origin unroutable messages are rejected back for redelivery,
/// never silently dropped.
#[tokio::test]
async fn unroutable_broker_message_is_rejected_with_requeue() {
    let f = fixture(
        vec![],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let delivery = Arc::new(StubDelivery::default());
    let msg = MsgQueueItem::sms("+17770000", "+18880000", "lost").with_delivery(delivery.clone());

    f.router.route_client_bound(msg).await;

    assert_eq!(delivery.events(), vec![DeliveryEvent::Reject { requeue: true }]);
    assert!(f.publisher.published().is_empty());
}

/// Locally born unroutable messages are dropped without any broker action.
#[tokio::test]
async fn unroutable_local_message_is_dropped() {
    let f = fixture(
        vec![],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let msg = MsgQueueItem::sms("+17770000", "+18880000", "lost");

    f.router.route_client_bound(msg).await;

    assert!(f.publisher.published().is_empty());
    assert!(f.sink.delivered().is_empty());
}

/// A broker publish failure on the bounce path is drop-error: the
/// broker-born message is nacked back with requeue.
#[tokio::test]
async fn publish_failure_nacks_broker_message() {
    let f = fixture(
        vec![client_b()],
        StubSink::bound(),
        RecordingPublisher::failing(),
        StubCarrier::succeeding(),
    );
    let delivery = Arc::new(StubDelivery::default());
    let msg = MsgQueueItem::sms("+15550999", "+15550001", "onward").with_delivery(delivery.clone());

    f.router.route_client_bound(msg).await;

    assert_eq!(
        delivery.events(),
        vec![DeliveryEvent::Nack {
            multiple: false,
            requeue: true
        }]
    );
}

/// Exactly one terminal action per message, whatever the path taken.
#[tokio::test]
async fn single_terminal_action_per_message() {
    for sink in [StubSink::bound(), StubSink::unbound()] {
        let f = fixture(
            vec![client_a()],
            sink,
            RecordingPublisher::new(),
            StubCarrier::succeeding(),
        );
        let delivery = Arc::new(StubDelivery::default());
        let msg = MsgQueueItem::sms("+15550999", "+15550001", "hi").with_delivery(delivery.clone());

        f.router.route_client_bound(msg).await;

        assert_eq!(delivery.events().len(), 1);
    }
}

/// MMS follows the same client-bound contract as SMS.
#[tokio::test]
async fn client_bound_mms_uses_mms_sink() {
    let f = fixture(
        vec![client_a()],
        StubSink::bound(),
        RecordingPublisher::new(),
        StubCarrier::succeeding(),
    );
    let envelope = MmsEnvelope::new(
        vec![("X-Mms-Message-Type".to_string(), "MM4_forward.REQ".to_string())],
        b"parts".to_vec(),
    );
    let msg = MsgQueueItem::mms("+15550999", "+15550001", envelope);

    f.router.route_client_bound(msg.clone()).await;

    assert_eq!(f.sink.delivered(), vec![msg]);
}

// ---------------------------------------------------------------------------
// SMPP listener end to end

async fn start_smpp(
    clients: Vec<Client>,
) -> (
    std::net::SocketAddr,
    Arc<AddressIndex>,
    Arc<SessionRegistry>,
    mpsc::Receiver<MsgQueueItem>,
) {
    let index = Arc::new(AddressIndex::with_clients(false, clients));
    let sessions = SessionRegistry::new(index.clone());
    let (tx, rx) = mpsc::channel(16);
    let listener = SmppListener::bind("127.0.0.1:0", index.clone(), sessions.clone(), tx)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run());
    (addr, index, sessions, rx)
}

#[tokio::test]
async fn smpp_bind_submit_and_deliver_flow() {
    let (addr, _index, sessions, mut rx) = start_smpp(vec![client_a()]).await;

    let socket = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = connection::split(socket);

    // Bind and expect an Ok response echoing the system id.
    writer
        .write_frame(&Frame::Bind(Bind::new(
            BindKind::Transceiver,
            1,
            "clientA",
            "secretA",
        )))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::BindResponse(resp) => {
            assert_eq!(resp.command_status, CommandStatus::Ok);
            assert_eq!(resp.system_id, "clientA");
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // Submit an SMS and expect a response before routing happens.
    writer
        .write_frame(&Frame::SubmitSm(Box::new(SubmitSm::new(
            2,
            "+15550001",
            "+15559999",
            "outbound text",
        ))))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::SubmitSmResponse(resp) => {
            assert_eq!(resp.command_status, CommandStatus::Ok);
            assert!(!resp.message_id.is_empty());
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // The ingress channel carries the translated message.
    let msg = rx.recv().await.unwrap();
    assert_eq!(msg.kind, MessageKind::Sms);
    assert_eq!(msg.from, "+15550001");
    assert_eq!(msg.to, "+15559999");
    assert_eq!(msg.content, MessageContent::Text("outbound text".to_string()));
    assert!(msg.delivery.is_none());

    // Outbound: a deliver_sm written through the registry reaches the peer.
    let session = sessions.find_session_for_number("+15550001").unwrap();
    session
        .send(&Frame::DeliverSm(Box::new(DeliverSm::for_text(
            session.next_sequence(),
            "+15550999",
            "+15550001",
            "hi",
        ))))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::DeliverSm(pdu) => assert_eq!(pdu.text(), "hi"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn smpp_pdu_before_bind_is_nacked() {
    let (addr, _index, _sessions, _rx) = start_smpp(vec![client_a()]).await;

    let socket = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = connection::split(socket);

    writer
        .write_frame(&Frame::SubmitSm(Box::new(SubmitSm::new(
            1,
            "+15550001",
            "+15559999",
            "too early",
        ))))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::GenericNack(nack) => {
            assert_eq!(nack.command_status, CommandStatus::InvalidBindStatus);
            assert_eq!(nack.sequence_number, 1);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    assert!(reader.read_frame().await.unwrap().is_none());
}

#[tokio::test]
async fn smpp_bind_with_bad_password_is_refused() {
    let (addr, _index, sessions, _rx) = start_smpp(vec![client_a()]).await;

    let socket = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = connection::split(socket);

    writer
        .write_frame(&Frame::Bind(Bind::new(
            BindKind::Transmitter,
            1,
            "clientA",
            "wrong",
        )))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::BindResponse(resp) => {
            assert_eq!(resp.command_status, CommandStatus::BindFailed);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    // The connection closes without a session being registered.
    assert!(reader.read_frame().await.unwrap().is_none());
    assert_eq!(sessions.bound_count(), 0);
}

#[tokio::test]
async fn smpp_unbind_closes_session() {
    let (addr, _index, sessions, _rx) = start_smpp(vec![client_a()]).await;

    let socket = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = connection::split(socket);

    writer
        .write_frame(&Frame::Bind(Bind::new(
            BindKind::Transceiver,
            1,
            "clientA",
            "secretA",
        )))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::BindResponse(resp) => assert_eq!(resp.command_status, CommandStatus::Ok),
        other => panic!("unexpected frame: {other:?}"),
    }
    assert_eq!(sessions.bound_count(), 1);

    writer
        .write_frame(&Frame::Unbind(Unbind { sequence_number: 2 }))
        .await
        .unwrap();
    match reader.read_frame().await.unwrap().unwrap() {
        Frame::UnbindResponse(resp) => {
            assert_eq!(resp.command_status, CommandStatus::Ok);
            assert_eq!(resp.sequence_number, 2);
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // The listener drops the session and closes the connection; the
    // registry entry is gone by the time the peer sees EOF.
    assert!(reader.read_frame().await.unwrap().is_none());
    assert_eq!(sessions.bound_count(), 0);
}

#[tokio::test]
async fn rebind_replaces_prior_session() {
    let (addr, _index, sessions, _rx) = start_smpp(vec![client_a()]).await;

    let first = TcpStream::connect(addr).await.unwrap();
    let (mut first_reader, mut first_writer) = connection::split(first);
    first_writer
        .write_frame(&Frame::Bind(Bind::new(
            BindKind::Transceiver,
            1,
            "clientA",
            "secretA",
        )))
        .await
        .unwrap();
    first_reader.read_frame().await.unwrap().unwrap();
    let original = sessions.find_session_for_number("+15550001").unwrap();

    let second = TcpStream::connect(addr).await.unwrap();
    let (mut second_reader, mut second_writer) = connection::split(second);
    second_writer
        .write_frame(&Frame::Bind(Bind::new(
            BindKind::Transceiver,
            1,
            "clientA",
            "secretA",
        )))
        .await
        .unwrap();
    second_reader.read_frame().await.unwrap().unwrap();

    // Exactly one active session per username, and it is the newer bind.
    assert_eq!(sessions.bound_count(), 1);
    let replacement = sessions.find_session_for_number("+15550001").unwrap();
    assert_ne!(replacement.id(), original.id());

    // The delivery path reaches the replacement connection.
    replacement
        .send(&Frame::DeliverSm(Box::new(DeliverSm::for_text(
            replacement.next_sequence(),
            "+15550999",
            "+15550001",
            "to the new bind",
        ))))
        .await
        .unwrap();
    match second_reader.read_frame().await.unwrap().unwrap() {
        Frame::DeliverSm(pdu) => assert_eq!(pdu.text(), "to the new bind"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// MM4 listener end to end

#[tokio::test]
async fn mm4_submission_becomes_message() {
    let (tx, mut rx) = mpsc::channel(16);
    let listener = Mm4Listener::bind("127.0.0.1:0", "mmsc.gateway.test", tx)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run());

    let socket = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let banner = lines.next_line().await.unwrap().unwrap();
    assert!(banner.starts_with("220"));

    for (command, expected) in [
        ("HELO mmsc.peer.test", "250"),
        ("MAIL FROM:<+15550999/TYPE=PLMN@mmsc.peer.test>", "250"),
        ("RCPT TO:<+15550001/TYPE=PLMN@mmsc.gateway.test>", "250"),
        ("DATA", "354"),
    ] {
        write_half
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert!(reply.starts_with(expected), "{command} -> {reply}");
    }

    let data = "X-Mms-Message-Type: MM4_forward.REQ\r\n\
                X-Mms-Transaction-Id: tx-123\r\n\
                Content-Type: multipart/related\r\n\
                \r\n\
                part payload\r\n\
                ..stuffed line\r\n\
                .\r\n";
    write_half.write_all(data.as_bytes()).await.unwrap();
    let accepted = lines.next_line().await.unwrap().unwrap();
    assert!(accepted.starts_with("250"));

    let msg = rx.recv().await.unwrap();
    assert_eq!(msg.kind, MessageKind::Mms);
    assert_eq!(msg.from, "+15550999");
    assert_eq!(msg.to, "+15550001");
    let envelope = msg.content.envelope().unwrap();
    assert_eq!(envelope.header("X-Mms-Transaction-Id"), Some("tx-123"));
    let body = String::from_utf8(envelope.body.clone()).unwrap();
    assert!(body.contains("part payload"));
    assert!(body.contains(".stuffed line"));
}

#[tokio::test]
async fn mm4_outbound_forwards_envelope() {
    // A fake peer MMSC that speaks just enough SMTP to accept one message.
    let peer = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    tokio::spawn(async move {
        let (socket, _) = peer.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();
        write_half.write_all(b"220 peer ready\r\n").await.unwrap();
        let mut in_data = false;
        while let Ok(Some(line)) = lines.next_line().await {
            sink.lock().unwrap().push(line.clone());
            if in_data {
                // Stay quiet inside DATA until the terminating dot.
                if line == "." {
                    in_data = false;
                    write_half.write_all(b"250 accepted\r\n").await.unwrap();
                }
                continue;
            }
            match line.split_whitespace().next().unwrap_or("").to_uppercase().as_str() {
                "DATA" => {
                    in_data = true;
                    write_half.write_all(b"354 go ahead\r\n").await.unwrap();
                }
                "QUIT" => {
                    write_half.write_all(b"221 bye\r\n").await.unwrap();
                    break;
                }
                _ => write_half.write_all(b"250 ok\r\n").await.unwrap(),
            }
        }
    });

    let outbound = Mm4Outbound::new(
        "mmsc.gateway.test",
        HashMap::from([("clientA".to_string(), peer_addr.to_string())]),
    );
    let envelope = MmsEnvelope::new(
        vec![("X-Mms-Message-Type".to_string(), "MM4_forward.REQ".to_string())],
        b"media parts\r\n".to_vec(),
    );
    let msg = MsgQueueItem::mms("+15550999", "+15550001", envelope);

    outbound.forward("clientA", &msg).await.unwrap();

    let transcript = received.lock().unwrap().clone();
    assert!(transcript.iter().any(|l| l.starts_with("MAIL FROM:<+15550999")));
    assert!(transcript.iter().any(|l| l.starts_with("RCPT TO:<+15550001")));
    assert!(transcript.iter().any(|l| l.contains("MM4_forward.REQ")));
    assert!(transcript.iter().any(|l| l.contains("media parts")));
}

#[tokio::test]
async fn mm4_outbound_without_peer_is_not_bound() {
    let outbound = Mm4Outbound::new("mmsc.gateway.test", HashMap::new());
    let index = Arc::new(AddressIndex::with_clients(false, vec![client_a()]));
    let sessions = SessionRegistry::new(index.clone());
    let sinks = ProtocolSinks {
        index,
        sessions,
        mm4: outbound,
    };

    let envelope = MmsEnvelope::new(Vec::new(), Vec::new());
    let msg = MsgQueueItem::mms("+15550999", "+15550001", envelope);
    match sinks.deliver_mms(&msg).await {
        Err(DispatchError::NotBound(_)) => {}
        other => panic!("expected NotBound, got {other:?}"),
    }
}
