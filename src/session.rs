// ABOUTME: Live SMPP session state and the registry mapping bound usernames to sessions
// ABOUTME: Registration replaces any prior bind for the same username atomically

use crate::addressing::{AddressIndex, Client};
use crate::connection::FrameWriter;
use crate::frame::Frame;
use crate::pdu::BindKind;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One bound SMPP session. Created on a successful bind, destroyed when
/// the socket closes. Writes go through an async mutex so the router and
/// the per-connection task can both respond on the same socket.
pub struct SmppSession {
    id: Uuid,
    pub username: String,
    pub numbers: Vec<String>,
    pub bind_kind: BindKind,
    pub bound_at: Instant,
    writer: Mutex<FrameWriter>,
    sequence: AtomicU32,
}

impl SmppSession {
    pub fn new(client: &Client, bind_kind: BindKind, writer: FrameWriter) -> Arc<Self> {
        Arc::new(SmppSession {
            id: Uuid::new_v4(),
            username: client.username.clone(),
            numbers: client.numbers.iter().map(|n| n.number.clone()).collect(),
            bind_kind,
            bound_at: Instant::now(),
            writer: Mutex::new(writer),
            sequence: AtomicU32::new(0),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next sequence number for a gateway-originated PDU on this session.
    /// Zero is reserved, so the counter starts at one and skips it on wrap.
    pub fn next_sequence(&self) -> u32 {
        loop {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if seq != 0 {
                return seq;
            }
        }
    }

    /// Write one frame to the bound peer.
    pub async fn send(&self, frame: &Frame) -> io::Result<()> {
        self.writer.lock().await.write_frame(frame).await
    }
}

impl std::fmt::Debug for SmppSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmppSession")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("bind_kind", &self.bind_kind)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no live SMPP session for {0}")]
    NotBound(String),
}

/// Tracks currently bound sessions keyed by client username
/// (spec Section 4.2). At most one session per username; the latest bind
/// replaces any previous entry.
pub struct SessionRegistry {
    index: Arc<AddressIndex>,
    sessions: RwLock<HashMap<String, Arc<SmppSession>>>,
}

impl SessionRegistry {
    pub fn new(index: Arc<AddressIndex>) -> Arc<Self> {
        Arc::new(SessionRegistry {
            index,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Register a session, returning the session it displaced (if any) so
    /// the caller can log or tear it down.
    pub fn register(&self, session: Arc<SmppSession>) -> Option<Arc<SmppSession>> {
        self.write().insert(session.username.clone(), session)
    }

    /// Remove a session on socket close. A session that was already
    /// replaced by a newer bind must not evict its replacement, so the
    /// entry is only removed when the ids match.
    pub fn drop_session(&self, session: &SmppSession) {
        let mut sessions = self.write();
        if let Some(current) = sessions.get(&session.username) {
            if current.id() == session.id() {
                sessions.remove(&session.username);
            }
        }
    }

    /// Session able to receive a message for `to`: resolves the owning
    /// client through the address index, then requires a live bind for that
    /// client's username. Fails fast when either half is missing.
    pub fn find_session_for_number(&self, to: &str) -> Result<Arc<SmppSession>, SessionError> {
        let client = self
            .index
            .find_client_by_number(to)
            .ok_or_else(|| SessionError::NotBound(to.to_string()))?;
        self.read()
            .get(&client.username)
            .cloned()
            .ok_or_else(|| SessionError::NotBound(to.to_string()))
    }

    /// Live session for a username, if bound.
    pub fn session_for(&self, username: &str) -> Option<Arc<SmppSession>> {
        self.read().get(username).cloned()
    }

    pub fn bound_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SmppSession>>> {
        self.sessions.read().expect("session registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SmppSession>>> {
        self.sessions.write().expect("session registry lock poisoned")
    }
}
