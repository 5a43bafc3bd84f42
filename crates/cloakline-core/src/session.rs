//! Session state machine for the Cloakline client.
//!
//! Drives one connection from transport-connect through key exchange, MAC
//! exchange and authentication, then routes encrypted chat traffic.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as a parameter
//! - Methods return `Result<Vec<SessionAction>, SessionError>`
//! - The driver executes the actions (send events, close, render)
//!
//! Nothing here touches the network or the filesystem. Crypto is synchronous
//! and runs inline.
//!
//! # Phases
//!
//! ```text
//!               connect                sendPublicKey (reply with ours)
//! ┌──────────────┐   ┌───────────────┐<──────┐
//! │ Disconnected │──>│ KeyExchanging │───────┘
//! └──────────────┘   └───────────────┘
//!        ^                  │ sendMac (decrypts)
//!        │                  ↓
//!        │           ┌────────────────┐  login/register failed
//!        │           │ Authenticating │<──────┐
//!        │           └────────────────┘───────┘
//!        │                  │ login/register succeeded
//!        │                  ↓
//!        │           ┌───────────────┐  onlineUsers, userPublicKey,
//!        │           │ Authenticated │  message, loadMessage, messageResult
//!        │           └───────────────┘
//!        │                  │
//!        └──────────────────┘ disconnect (any phase), MAC decrypt failure
//! ```
//!
//! # Failure policy
//!
//! - An event outside the phase that expects it returns
//!   [`SessionError::HandshakeViolation`] and changes nothing.
//! - A MAC that cannot be decrypted is fatal: the transport is closed and the
//!   session returns to `Disconnected`.
//! - Any other undecryptable or malformed payload becomes a
//!   [`SessionAction::ShowError`] and the session carries on.

use std::{collections::HashMap, time::Instant};

use cloakline_crypto::{ChunkCipher, CryptoError, KeyStore, PrivateKey, PublicKeyHandle};
use cloakline_proto::{
    Contact, Envelope, EventKind, WireEvent,
    payloads::{
        AuthResponse, Authenticated, Credentials, Empty, OnlineUsersResponse, OutgoingMessage,
        PublicKeyRequest, PublicKeyResponse, RelayedMessage,
    },
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    action::{AuthForm, ErrorScope, SessionAction, View},
    backlog::{ChatMessage, ConversationBacklog, Direction, Routed},
    config::SessionConfig,
    error::{RequestError, SessionError},
    event::SessionEvent,
    pending::PendingRequests,
    presence::PresenceTracker,
};

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No transport.
    Disconnected,
    /// Connected, exchanging public keys and waiting for the MAC.
    KeyExchanging,
    /// MAC received, waiting for login or registration.
    Authenticating,
    /// Logged in.
    Authenticated,
}

#[derive(Debug, Clone)]
struct Submission {
    form: AuthForm,
    username: String,
}

/// Per-connection session state.
///
/// Everything here is discarded on disconnect except the generation counter,
/// which only ever grows.
#[derive(Debug, Clone)]
pub struct SessionContext {
    phase: Phase,
    generation: u64,
    server_key: Option<PublicKeyHandle>,
    mac: Option<String>,
    username: Option<String>,
    submission: Option<Submission>,
    next_presence_due: Option<Instant>,
}

impl SessionContext {
    fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
            generation: 0,
            server_key: None,
            mac: None,
            username: None,
            submission: None,
            next_presence_due: None,
        }
    }

    fn reset(&mut self) {
        *self = Self { generation: self.generation, ..Self::new() };
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Connection generation, incremented on every connect.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Server public key, once exchanged.
    pub fn server_key(&self) -> Option<&PublicKeyHandle> {
        self.server_key.as_ref()
    }

    /// Session MAC, once decrypted.
    pub fn mac(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    /// Logged-in username.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Auth form awaiting a response, if any.
    pub fn in_flight(&self) -> Option<AuthForm> {
        self.submission.as_ref().map(|s| s.form)
    }
}

/// Client session state machine.
///
/// Owns the session context together with presence, backlog, pending
/// contact-key lookups and the contact keys fetched on this connection.
#[derive(Debug)]
pub struct SessionHandshake {
    config: SessionConfig,
    cipher: ChunkCipher,
    private_key: PrivateKey,
    public_key: PublicKeyHandle,
    public_pem: String,
    ctx: SessionContext,
    presence: PresenceTracker,
    backlog: ConversationBacklog,
    pending: PendingRequests,
    contact_keys: HashMap<String, PublicKeyHandle>,
    next_message_id: u64,
}

impl SessionHandshake {
    /// Create a disconnected session for the unlocked local key.
    ///
    /// # Errors
    ///
    /// `Crypto` if the public half cannot be encoded.
    pub fn new(config: SessionConfig, private_key: PrivateKey) -> Result<Self, SessionError> {
        let public_key = private_key.public_key();
        let public_pem = public_key.to_pem()?;

        Ok(Self {
            cipher: ChunkCipher::new(config.cipher),
            config,
            private_key,
            public_key,
            public_pem,
            ctx: SessionContext::new(),
            presence: PresenceTracker::new(),
            backlog: ConversationBacklog::new(),
            pending: PendingRequests::new(),
            contact_keys: HashMap::new(),
            next_message_id: 0,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.ctx.phase
    }

    /// Session context.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Our public key as sent on `sendPublicKey`.
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// Presence snapshot.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Conversation state.
    pub fn backlog(&self) -> &ConversationBacklog {
        &self.backlog
    }

    /// Outstanding contact-key lookups.
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Contact key known on this connection.
    pub fn contact_key(&self, username: &str) -> Option<&PublicKeyHandle> {
        self.contact_keys.get(username)
    }

    /// Process one event.
    ///
    /// # Errors
    ///
    /// - `HandshakeViolation` if the event is not valid in the current phase
    /// - `SubmissionInFlight`, `NoActiveContact`, `ContactKeyUnavailable` for
    ///   user requests that cannot be carried out
    /// - `Crypto` if an outgoing request cannot be encrypted
    ///
    /// On error the session is unchanged.
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Result<Vec<SessionAction>, SessionError> {
        tracing::debug!(phase = ?self.ctx.phase, event = event.name(), "session event");

        match event {
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::Disconnected => Ok(self.on_disconnected()),
            SessionEvent::Received(wire) => self.on_wire(wire, now),
            SessionEvent::SubmitLogin(credentials) => self.submit(AuthForm::Login, credentials, None),
            SessionEvent::SubmitRegister { credentials, confirm } => {
                self.submit(AuthForm::Register, credentials, Some(confirm))
            },
            SessionEvent::OpenConversation { contact, cached_key } => {
                self.open_conversation(contact, cached_key)
            },
            SessionEvent::SendMessage { text } => self.send_message(&text),
            SessionEvent::ClearConversation => {
                self.expect_phase(Phase::Authenticated, "clearConversation")?;
                self.backlog.clear();
                Ok(vec![SessionAction::ClearConversation])
            },
        }
    }

    /// Periodic work: requests a presence snapshot when one is due.
    ///
    /// Does nothing outside `Authenticated`.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.ctx.phase != Phase::Authenticated {
            return Vec::new();
        }

        // A tick may land up to half an interval either side of the deadline.
        let slack = self.config.presence_interval / 2;
        let due = self.ctx.next_presence_due.is_none_or(|due| now + slack >= due);
        if !due {
            return Vec::new();
        }

        match self.presence_request(now) {
            Ok(action) => vec![action],
            Err(e) => {
                tracing::warn!(error = %e, "failed to build presence request");
                Vec::new()
            },
        }
    }

    fn on_connected(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Disconnected, "connect")?;

        self.ctx.generation += 1;
        self.ctx.phase = Phase::KeyExchanging;
        tracing::info!(generation = self.ctx.generation, "connected, exchanging keys");

        Ok(vec![SessionAction::PhaseChanged(Phase::KeyExchanging)])
    }

    fn on_disconnected(&mut self) -> Vec<SessionAction> {
        if self.ctx.phase == Phase::Disconnected {
            return Vec::new();
        }
        self.teardown()
    }

    /// Drop all connection state and report what the UI must undo.
    fn teardown(&mut self) -> Vec<SessionAction> {
        let generation = self.ctx.generation;

        let mut actions: Vec<_> = self
            .pending
            .reject_generation(generation)
            .into_iter()
            .map(|request| SessionAction::RequestFailed {
                username: request.contact.username,
                error: RequestError::Disconnected,
            })
            .collect();

        if let Some(form) = self.ctx.in_flight() {
            actions.push(SessionAction::SetSubmitEnabled { form, enabled: true });
        }

        self.ctx.reset();
        self.presence.reset();
        self.backlog.reset();
        self.contact_keys.clear();
        tracing::info!(generation, rejected = actions.len(), "session closed");

        actions.push(SessionAction::PhaseChanged(Phase::Disconnected));
        actions.push(SessionAction::ShowView(View::Connection));
        actions
    }

    fn on_wire(&mut self, wire: WireEvent, now: Instant) -> Result<Vec<SessionAction>, SessionError> {
        match wire.event {
            EventKind::SendPublicKey => self.on_server_key(&wire.data),
            EventKind::SendMac => self.on_mac(&wire.data),
            EventKind::Login => self.on_auth_response(AuthForm::Login, &wire.data, now),
            EventKind::Register => self.on_auth_response(AuthForm::Register, &wire.data, now),
            EventKind::OnlineUsers => self.on_online_users(&wire.data),
            EventKind::UserPublicKey => self.on_contact_key(&wire.data),
            EventKind::Message | EventKind::LoadMessage | EventKind::MessageResult => {
                self.on_relayed(wire.event, &wire.data)
            },
            EventKind::Error => self.on_server_error(wire.data),
        }
    }

    fn on_server_key(&mut self, data: &str) -> Result<Vec<SessionAction>, SessionError> {
        if self.ctx.phase != Phase::KeyExchanging || self.ctx.server_key.is_some() {
            return Err(self.violation("sendPublicKey"));
        }

        match KeyStore::parse_public_key(data) {
            Ok(key) => {
                tracing::debug!(bits = key.bits(), "received server public key");
                self.ctx.server_key = Some(key);
                Ok(vec![SessionAction::Send(WireEvent::new(EventKind::SendPublicKey, self.public_pem.clone()))])
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse server public key");
                Ok(vec![show_error(ErrorScope::Connection, "Failed to parse server public key")])
            },
        }
    }

    fn on_mac(&mut self, data: &str) -> Result<Vec<SessionAction>, SessionError> {
        if self.ctx.phase != Phase::KeyExchanging || self.ctx.server_key.is_none() {
            return Err(self.violation("sendMac"));
        }

        let decrypted = Envelope::from_json(data)
            .map_err(CryptoError::from)
            .and_then(|envelope| self.cipher.decrypt_text(&self.private_key, &envelope));

        match decrypted {
            Ok(mac) => {
                self.ctx.mac = Some(mac);
                self.ctx.phase = Phase::Authenticating;
                tracing::info!("session MAC received, awaiting login");
                Ok(vec![SessionAction::PhaseChanged(Phase::Authenticating), SessionAction::ShowView(View::Auth)])
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to decrypt session MAC");
                let mut actions =
                    vec![show_error(ErrorScope::Connection, "Failed to decrypt MAC"), SessionAction::CloseTransport];
                actions.extend(self.teardown());
                Ok(actions)
            },
        }
    }

    fn on_auth_response(
        &mut self,
        form: AuthForm,
        data: &str,
        now: Instant,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Authenticating, form.as_str())?;

        let submitted = self.ctx.submission.take();
        let reenable = SessionAction::SetSubmitEnabled { form, enabled: true };

        let response: AuthResponse = match self.open(data) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, form = form.as_str(), "failed to decrypt auth response");
                let message = format!("Failed to decrypt {} data", form.as_str());
                return Ok(vec![show_error(ErrorScope::Auth, message), reenable]);
            },
        };

        if !response.success {
            tracing::info!(form = form.as_str(), reason = %response.message, "auth rejected");
            return Ok(vec![show_error(ErrorScope::Auth, response.message), reenable]);
        }

        let username = response.username.filter(|u| !u.is_empty()).or(submitted.map(|s| s.username));
        let Some(username) = username else {
            tracing::warn!(form = form.as_str(), "auth success names no user");
            let message = format!("Invalid {} response", form.as_str());
            return Ok(vec![show_error(ErrorScope::Auth, message), reenable]);
        };
        tracing::info!(username = %username, "authenticated");

        self.ctx.username = Some(username);
        self.ctx.phase = Phase::Authenticated;

        let mut actions =
            vec![reenable, SessionAction::PhaseChanged(Phase::Authenticated), SessionAction::ShowView(View::Chat)];
        match self.presence_request(now) {
            Ok(action) => actions.push(action),
            Err(e) => tracing::warn!(error = %e, "failed to build presence request"),
        }
        Ok(actions)
    }

    fn on_online_users(&mut self, data: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Authenticated, "onlineUsers")?;

        match self.open::<OnlineUsersResponse>(data) {
            Ok(response) => {
                let diff = self.presence.reconcile(response.users);
                if diff.is_empty() {
                    return Ok(Vec::new());
                }
                tracing::debug!(added = diff.added.len(), removed = diff.removed.len(), "presence changed");
                Ok(vec![SessionAction::PresenceChanged(diff)])
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to decrypt online users");
                Ok(vec![show_error(ErrorScope::Chat, "Failed to decrypt online users")])
            },
        }
    }

    fn on_contact_key(&mut self, data: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Authenticated, "userPublicKey")?;

        let response: PublicKeyResponse = match self.open(data) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decrypt public key response");
                return Ok(vec![show_error(ErrorScope::Chat, "Failed to decrypt public key response")]);
            },
        };

        let Some(request) = self.pending.resolve(response.username.as_deref(), self.ctx.generation) else {
            tracing::warn!(username = ?response.username, "public key response matches no request");
            return Ok(Vec::new());
        };
        let username = request.contact.username.clone();

        let key = match (response.success, response.public_key) {
            (true, Some(pem)) => KeyStore::parse_public_key(&pem).map(|key| (key, pem)).map_err(|e| {
                tracing::warn!(username = %username, error = %e, "contact sent an unusable key");
                Some(format!("Invalid public key for {username}"))
            }),
            (true, None) => Err(Some(format!("No public key for {username}"))),
            (false, _) => Err(response.message),
        };

        match key {
            Ok((key, pem)) => {
                tracing::debug!(username = %username, "contact key resolved");
                self.contact_keys.insert(username, key);
                Ok(vec![SessionAction::CacheContactKey { contact: request.contact, pem }])
            },
            Err(reason) => {
                let error = RequestError::Rejected { reason };
                Ok(vec![
                    show_error(ErrorScope::Chat, format!("Could not get public key for {username}: {error}")),
                    SessionAction::RequestFailed { username, error },
                ])
            },
        }
    }

    fn on_relayed(&mut self, kind: EventKind, data: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Authenticated, kind.as_str())?;

        let (contact, direction, body) = match self.read_relayed(kind, data) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(error = %e, event = kind.as_str(), "failed to read message");
                return Ok(vec![show_error(ErrorScope::Chat, "Failed to decrypt message")]);
            },
        };

        self.next_message_id += 1;
        let message = ChatMessage { id: self.next_message_id, contact: contact.clone(), body, direction };

        match self.backlog.route(message.clone()) {
            Routed::Delivered => Ok(vec![SessionAction::DeliverMessage(message)]),
            Routed::Queued { newly_unread: true } => Ok(vec![SessionAction::MarkUnread { contact }]),
            Routed::Queued { newly_unread: false } => Ok(Vec::new()),
        }
    }

    /// Decrypt a relayed message and work out whose conversation it belongs to.
    fn read_relayed(&self, kind: EventKind, data: &str) -> Result<(String, Direction, String), CryptoError> {
        let relayed: RelayedMessage = self.open(data)?;
        let me = self.ctx.username.as_deref();

        let counterpart = match kind {
            EventKind::Message => relayed.from.clone().map(|from| (from, Direction::Incoming)),
            EventKind::LoadMessage => match relayed.from.as_deref() {
                Some(from) if Some(from) != me => Some((from.to_string(), Direction::Incoming)),
                _ => relayed.to.clone().map(|to| (to, Direction::Outgoing)),
            },
            _ => relayed
                .to
                .clone()
                .or_else(|| self.backlog.active().map(str::to_string))
                .map(|to| (to, Direction::Outgoing)),
        };
        let (contact, direction) = counterpart
            .ok_or_else(|| CryptoError::PayloadFormat(format!("{kind} without a counterpart")))?;

        let body = self.cipher.decrypt_text(&self.private_key, &relayed.message)?;
        Ok((contact, direction, body))
    }

    fn on_server_error(&mut self, message: String) -> Result<Vec<SessionAction>, SessionError> {
        let scope = match self.ctx.phase {
            Phase::Disconnected => return Err(self.violation("error")),
            Phase::KeyExchanging => ErrorScope::Connection,
            Phase::Authenticating => ErrorScope::Auth,
            Phase::Authenticated => ErrorScope::Chat,
        };
        tracing::warn!(message = %message, "server reported an error");
        Ok(vec![show_error(scope, message)])
    }

    fn submit(
        &mut self,
        form: AuthForm,
        credentials: Credentials,
        confirm: Option<String>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let event = match form {
            AuthForm::Login => "submitLogin",
            AuthForm::Register => "submitRegister",
        };
        self.expect_phase(Phase::Authenticating, event)?;

        if let Some(busy) = self.ctx.in_flight() {
            return Err(SessionError::SubmissionInFlight(busy.as_str()));
        }
        if confirm.is_some_and(|confirm| confirm != credentials.password) {
            return Ok(vec![show_error(ErrorScope::Auth, "Passwords do not match")]);
        }

        let kind = match form {
            AuthForm::Login => EventKind::Login,
            AuthForm::Register => EventKind::Register,
        };
        let username = credentials.username.clone();
        let request = self.authenticated_request(kind, credentials)?;

        tracing::debug!(form = form.as_str(), username = %username, "submitting credentials");
        self.ctx.submission = Some(Submission { form, username });

        Ok(vec![SessionAction::SetSubmitEnabled { form, enabled: false }, SessionAction::Send(request)])
    }

    fn open_conversation(
        &mut self,
        contact: Contact,
        cached_key: Option<PublicKeyHandle>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Authenticated, "openConversation")?;

        let username = contact.username.clone();
        let needs_lookup = cached_key.is_none()
            && !self.contact_keys.contains_key(&username)
            && !self.pending.contains(&username);

        // Build the lookup first so a failure leaves the backlog untouched.
        let lookup = if needs_lookup {
            Some(self.authenticated_request(
                EventKind::UserPublicKey,
                PublicKeyRequest { username: username.clone() },
            )?)
        } else {
            None
        };

        if let Some(key) = cached_key {
            self.contact_keys.insert(username.clone(), key);
        }

        let messages = self.backlog.activate(&username);
        let mut actions = vec![SessionAction::ShowConversation { contact: username, messages }];

        if let Some(request) = lookup {
            self.pending.insert(contact, self.ctx.generation);
            actions.push(SessionAction::Send(request));
        }
        Ok(actions)
    }

    fn send_message(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_phase(Phase::Authenticated, "sendMessage")?;

        let to = self.backlog.active().ok_or(SessionError::NoActiveContact)?.to_string();
        let recipient_key = self
            .contact_keys
            .get(&to)
            .ok_or_else(|| SessionError::ContactKeyUnavailable { username: to.clone() })?;

        let message = self.cipher.encrypt(recipient_key, text.as_bytes())?;
        let echo = self.cipher.encrypt(&self.public_key, text.as_bytes())?;
        let request = self.authenticated_request(EventKind::Message, OutgoingMessage { to, message, echo })?;

        Ok(vec![SessionAction::Send(request)])
    }

    fn presence_request(&mut self, now: Instant) -> Result<SessionAction, SessionError> {
        let request = self.authenticated_request(EventKind::OnlineUsers, Empty {})?;
        let base = self.ctx.next_presence_due.map_or(now, |due| due.max(now));
        self.ctx.next_presence_due = Some(base + self.config.presence_interval);
        Ok(SessionAction::Send(request))
    }

    /// Encrypt `{MAC, data}` to the server.
    fn authenticated_request<T: Serialize>(&self, kind: EventKind, data: T) -> Result<WireEvent, SessionError> {
        let (Some(server_key), Some(mac)) = (&self.ctx.server_key, &self.ctx.mac) else {
            return Err(self.violation(kind.as_str()));
        };
        let envelope = self.cipher.encrypt_object(server_key, &Authenticated::new(mac.as_str(), data))?;
        Ok(WireEvent::new(kind, envelope.to_json()))
    }

    fn open<T: DeserializeOwned>(&self, data: &str) -> Result<T, CryptoError> {
        self.cipher.decrypt_wire_object(&self.private_key, data)
    }

    fn expect_phase(&self, expected: Phase, event: &'static str) -> Result<(), SessionError> {
        if self.ctx.phase == expected { Ok(()) } else { Err(self.violation(event)) }
    }

    fn violation(&self, event: &'static str) -> SessionError {
        SessionError::HandshakeViolation { phase: self.ctx.phase, event }
    }
}

fn show_error(scope: ErrorScope, message: impl Into<String>) -> SessionAction {
    SessionAction::ShowError { scope, message: message.into() }
}
