// ABOUTME: Client and number ownership records plus the read-mostly address index
// ABOUTME: Every routing decision starts here: number to (client, carrier) resolution

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A phone number owned by a client and hosted on an upstream carrier.
/// The `(number, client_id)` pair is unique across the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientNumber {
    pub number: String,
    pub client_id: u64,
    pub carrier: String,
}

/// A client account. The credential pair authenticates SMPP binds; the
/// number set drives both directions of routing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Client {
    pub id: u64,
    pub username: String,
    /// Lowercase hex SHA-256 of the bind password.
    pub password_hash: String,
    pub numbers: Vec<ClientNumber>,
}

impl Client {
    pub fn owns_number(&self, number: &str) -> bool {
        self.numbers.iter().any(|n| n.number == number)
    }
}

/// SHA-256 digest of a bind password, as stored in `Client::password_hash`.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("no carrier hosts number {0}")]
    NotFound(String),
}

/// In-memory mapping from phone number to owning client and hosting
/// carrier (spec Section 4.1).
///
/// Read-mostly: queries take the read lock; the only write is the atomic
/// bulk `reload` performed at boot or on an operator-driven refresh. All
/// queries are side-effect-free.
pub struct AddressIndex {
    strict_number_match: bool,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    clients: Vec<Arc<Client>>,
    by_username: HashMap<String, Arc<Client>>,
    by_number: HashMap<String, (Arc<Client>, String)>,
}

impl Inner {
    fn build(clients: Vec<Client>) -> Inner {
        let clients: Vec<Arc<Client>> = clients.into_iter().map(Arc::new).collect();
        let mut by_username = HashMap::new();
        let mut by_number = HashMap::new();
        for client in &clients {
            by_username.insert(client.username.clone(), client.clone());
            for number in &client.numbers {
                by_number.insert(
                    number.number.clone(),
                    (client.clone(), number.carrier.clone()),
                );
            }
        }
        Inner {
            clients,
            by_username,
            by_number,
        }
    }
}

impl AddressIndex {
    pub fn new(strict_number_match: bool) -> Self {
        AddressIndex {
            strict_number_match,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn with_clients(strict_number_match: bool, clients: Vec<Client>) -> Self {
        AddressIndex {
            strict_number_match,
            inner: RwLock::new(Inner::build(clients)),
        }
    }

    /// Atomically replace the whole record set.
    pub fn reload(&self, clients: Vec<Client>) {
        let rebuilt = Inner::build(clients);
        *self.inner.write().expect("address index lock poisoned") = rebuilt;
    }

    /// Carrier hosting `number`, when the number is known to the gateway.
    pub fn carrier_of(&self, number: &str) -> Result<String, AddressError> {
        self.read()
            .by_number
            .get(number)
            .map(|(_, carrier)| carrier.clone())
            .ok_or_else(|| AddressError::NotFound(number.to_string()))
    }

    /// Owning client of `number` by exact lookup.
    pub fn client_of(&self, number: &str) -> Option<Arc<Client>> {
        self.read()
            .by_number
            .get(number)
            .map(|(client, _)| client.clone())
    }

    /// Owning client of a destination number; non-None means the message is
    /// client-bound. Resolution matches `client_of`; the containment rule
    /// below applies only to outbound source attribution.
    pub fn find_client_by_number(&self, to: &str) -> Option<Arc<Client>> {
        self.client_of(to)
    }

    /// Carrier to use for a message leaving `source`.
    ///
    /// Scans every client-owned number for one contained in the inbound
    /// source (or equal to it). Containment rather than equality lets a
    /// stored `5550001` match an inbound `+15550001` where the stored form
    /// lacks the country code. With `strict_number_match` set, only exact
    /// matches count. When two clients' numbers both match, the first hit
    /// in scan order wins; the scan order itself is unspecified.
    pub fn client_outbound_carrier(&self, source: &str) -> Option<String> {
        let inner = self.read();
        for client in &inner.clients {
            for number in &client.numbers {
                let matched = if self.strict_number_match {
                    number.number == source
                } else {
                    source.contains(number.number.as_str())
                };
                if matched {
                    return Some(number.carrier.clone());
                }
            }
        }
        None
    }

    /// Validate SMPP bind credentials, returning the account on success.
    pub fn authenticate(&self, system_id: &str, password: &str) -> Option<Arc<Client>> {
        let inner = self.read();
        let client = inner.by_username.get(system_id)?;
        if client.password_hash == password_digest(password) {
            Some(client.clone())
        } else {
            None
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("address index lock poisoned")
    }
}
