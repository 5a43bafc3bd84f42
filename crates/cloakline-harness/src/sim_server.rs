//! Simulated Cloakline server.
//!
//! Speaks the server half of the protocol for a single client connection:
//! key exchange, MAC issue, accounts, presence, contact-key lookup and
//! message relay. Accounts live in memory and passwords are compared in the
//! clear. Other users exist only as directory entries with a public key; the
//! server never reads message bodies, it just records what it was asked to
//! deliver.

use std::collections::BTreeMap;

use cloakline_crypto::{ChunkCipher, CipherConfig, CryptoError, PrivateKey, PublicKeyHandle};
use cloakline_proto::{
    Contact, EventKind, WireEvent,
    payloads::{
        AuthResponse, Authenticated, Credentials, Empty, OnlineUsersResponse, OutgoingMessage,
        PublicKeyRequest, PublicKeyResponse, RelayedMessage,
    },
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// MAC issued to every session.
pub const SESSION_MAC: &str = "sim-session-mac";

/// Why the simulated server refused a client event.
#[derive(Debug, Error)]
pub enum SimError {
    /// Payload could not be decrypted or parsed.
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),

    /// Encrypted event before the client sent its key.
    #[error("client public key not received")]
    NoClientKey,

    /// Request carried the wrong MAC.
    #[error("invalid MAC")]
    BadMac,

    /// Chat request before login.
    #[error("not logged in")]
    NotLoggedIn,

    /// Event the server does not accept from clients.
    #[error("unexpected {0} event")]
    Unexpected(EventKind),
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    contact: Contact,
    pem: String,
}

/// Server half of the protocol.
#[derive(Debug)]
pub struct SimServer {
    key: PrivateKey,
    cipher: ChunkCipher,
    accounts: BTreeMap<String, String>,
    directory: BTreeMap<String, DirectoryEntry>,
    next_id: u64,
    client_key: Option<PublicKeyHandle>,
    client: Option<Contact>,
    delivered: Vec<OutgoingMessage>,
    anonymous_key_responses: bool,
    misdirected_mac: bool,
}

impl SimServer {
    /// Create a server with no accounts and nobody online.
    pub fn new(key: PrivateKey, cipher: CipherConfig) -> Self {
        Self {
            key,
            cipher: ChunkCipher::new(cipher),
            accounts: BTreeMap::new(),
            directory: BTreeMap::new(),
            next_id: 0,
            client_key: None,
            client: None,
            delivered: Vec::new(),
            anonymous_key_responses: false,
            misdirected_mac: false,
        }
    }

    /// Add an account.
    #[must_use]
    pub fn with_account(mut self, username: &str, password: &str) -> Self {
        self.accounts.insert(username.to_string(), password.to_string());
        self
    }

    /// Add another user who is online and has published `pem`.
    #[must_use]
    pub fn with_online_user(mut self, username: &str, pem: impl Into<String>) -> Self {
        self.set_online(username, pem);
        self
    }

    /// Answer `userPublicKey` without echoing the username, like servers that
    /// rely on request order.
    #[must_use]
    pub fn with_anonymous_key_responses(mut self) -> Self {
        self.anonymous_key_responses = true;
        self
    }

    /// Encrypt the session MAC to the server's own key, so the client cannot
    /// read it.
    #[must_use]
    pub fn with_misdirected_mac(mut self) -> Self {
        self.misdirected_mac = true;
        self
    }

    /// Bring a user online.
    pub fn set_online(&mut self, username: &str, pem: impl Into<String>) {
        let contact = Contact::new(username, self.allocate_id());
        self.directory.insert(username.to_string(), DirectoryEntry { contact, pem: pem.into() });
    }

    /// Take a user offline.
    pub fn set_offline(&mut self, username: &str) {
        self.directory.remove(username);
    }

    /// Directory entry for an online user.
    pub fn contact(&self, username: &str) -> Option<&Contact> {
        self.directory.get(username).map(|entry| &entry.contact)
    }

    /// Logged-in client, if any.
    pub fn client(&self) -> Option<&Contact> {
        self.client.as_ref()
    }

    /// Messages the client asked to have delivered, oldest first.
    pub fn delivered(&self) -> &[OutgoingMessage] {
        &self.delivered
    }

    /// Start a connection: forget the previous client and offer our key.
    pub fn on_connect(&mut self) -> Result<Vec<WireEvent>, SimError> {
        self.client_key = None;
        self.client = None;
        let pem = self.key.public_key().to_pem()?;
        Ok(vec![WireEvent::new(EventKind::SendPublicKey, pem)])
    }

    /// Process one client event and return the replies.
    pub fn handle(&mut self, event: WireEvent) -> Result<Vec<WireEvent>, SimError> {
        tracing::trace!(event = %event.event, "sim server received");

        match event.event {
            EventKind::SendPublicKey => {
                let key = PublicKeyHandle::parse(&event.data)?;
                let target = if self.misdirected_mac { self.key.public_key() } else { key.clone() };
                let mac = self.cipher.encrypt(&target, SESSION_MAC.as_bytes())?;
                self.client_key = Some(key);
                Ok(vec![WireEvent::new(EventKind::SendMac, mac.to_json())])
            },
            EventKind::Login => {
                let credentials: Credentials = self.open_authenticated(&event.data)?;
                let valid = self.accounts.get(&credentials.username) == Some(&credentials.password);
                let response = if valid {
                    self.sign_in(&credentials.username, "Login successful")
                } else {
                    rejected("Invalid username or password")
                };
                Ok(vec![self.seal(EventKind::Login, &response)?])
            },
            EventKind::Register => {
                let credentials: Credentials = self.open_authenticated(&event.data)?;
                let response = if self.accounts.contains_key(&credentials.username) {
                    rejected("Username already taken")
                } else {
                    self.accounts.insert(credentials.username.clone(), credentials.password);
                    self.sign_in(&credentials.username, "Registration successful")
                };
                Ok(vec![self.seal(EventKind::Register, &response)?])
            },
            EventKind::OnlineUsers => {
                let Empty {} = self.open_signed_in(&event.data)?;
                let mut users: Vec<Contact> = self.directory.values().map(|e| e.contact.clone()).collect();
                users.extend(self.client.clone());
                Ok(vec![self.seal(EventKind::OnlineUsers, &OnlineUsersResponse { users })?])
            },
            EventKind::UserPublicKey => {
                let PublicKeyRequest { username } = self.open_signed_in(&event.data)?;
                let response = match self.directory.get(&username) {
                    Some(entry) => PublicKeyResponse {
                        success: true,
                        public_key: Some(entry.pem.clone()),
                        message: None,
                        username: Some(username),
                    },
                    None => PublicKeyResponse {
                        success: false,
                        public_key: None,
                        message: Some("User not found".into()),
                        username: Some(username),
                    },
                };
                let response = if self.anonymous_key_responses {
                    PublicKeyResponse { username: None, ..response }
                } else {
                    response
                };
                Ok(vec![self.seal(EventKind::UserPublicKey, &response)?])
            },
            EventKind::Message => {
                let message: OutgoingMessage = self.open_signed_in(&event.data)?;
                let echo = RelayedMessage {
                    from: self.client.as_ref().map(|c| c.username.clone()),
                    to: Some(message.to.clone()),
                    message: message.echo.clone(),
                };
                self.delivered.push(message);
                Ok(vec![self.seal(EventKind::MessageResult, &echo)?])
            },
            other => Err(SimError::Unexpected(other)),
        }
    }

    /// A message from another user, as the server would relay it.
    ///
    /// `kind` is `message` for live traffic or `loadMessage` for history.
    pub fn relay(&self, kind: EventKind, from: &str, to: Option<&str>, body: &str) -> Result<WireEvent, SimError> {
        let client_key = self.client_key.as_ref().ok_or(SimError::NoClientKey)?;
        let relayed = RelayedMessage {
            from: Some(from.to_string()),
            to: to.map(str::to_string),
            message: self.cipher.encrypt(client_key, body.as_bytes())?,
        };
        self.seal(kind, &relayed)
    }

    fn sign_in(&mut self, username: &str, message: &str) -> AuthResponse {
        self.client = Some(Contact::new(username, self.allocate_id()));
        AuthResponse { success: true, message: message.to_string(), username: Some(username.to_string()) }
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn open_authenticated<T: DeserializeOwned>(&self, data: &str) -> Result<T, SimError> {
        let request: Authenticated<T> = self.cipher.decrypt_wire_object(&self.key, data)?;
        if request.mac != SESSION_MAC {
            return Err(SimError::BadMac);
        }
        Ok(request.data)
    }

    fn open_signed_in<T: DeserializeOwned>(&self, data: &str) -> Result<T, SimError> {
        if self.client.is_none() {
            return Err(SimError::NotLoggedIn);
        }
        self.open_authenticated(data)
    }

    fn seal<T: Serialize>(&self, kind: EventKind, value: &T) -> Result<WireEvent, SimError> {
        let client_key = self.client_key.as_ref().ok_or(SimError::NoClientKey)?;
        Ok(WireEvent::new(kind, self.cipher.encrypt_object(client_key, value)?.to_json()))
    }
}

fn rejected(message: &str) -> AuthResponse {
    AuthResponse { success: false, message: message.to_string(), username: None }
}
