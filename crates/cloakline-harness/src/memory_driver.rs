//! In-memory [`Driver`] wired straight to a [`SimServer`].
//!
//! Sending an event runs the server synchronously and queues its replies, so
//! by the time `send_event` returns the responses are ready to be received.
//! Everything the runtime presents is recorded for assertions.

use std::collections::VecDeque;

use cloakline_app::Driver;
use cloakline_core::{ServerAddress, SessionAction};
use cloakline_proto::{EventKind, WireEvent};
use thiserror::Error;

use crate::sim_server::SimServer;

/// In-memory transport failure.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Connection attempts are being refused.
    #[error("connection refused")]
    Refused,

    /// Send on a closed transport.
    #[error("not connected")]
    NotConnected,

    /// Send failure injected by the test.
    #[error("broken pipe")]
    BrokenPipe,
}

/// Driver backed by a simulated server.
#[derive(Debug)]
pub struct MemoryDriver {
    server: SimServer,
    inbox: VecDeque<WireEvent>,
    connected: bool,
    peer_closed: bool,
    refuse: bool,
    fail_sends: bool,
    connect_attempts: usize,
    last_addr: Option<ServerAddress>,
    sent: Vec<WireEvent>,
    presented: Vec<SessionAction>,
}

impl MemoryDriver {
    /// Driver for `server`, initially disconnected.
    pub fn new(server: SimServer) -> Self {
        Self {
            server,
            inbox: VecDeque::new(),
            connected: false,
            peer_closed: false,
            refuse: false,
            fail_sends: false,
            connect_attempts: 0,
            last_addr: None,
            sent: Vec::new(),
            presented: Vec::new(),
        }
    }

    /// Simulated server.
    pub fn server(&self) -> &SimServer {
        &self.server
    }

    /// Simulated server, mutably.
    pub fn server_mut(&mut self) -> &mut SimServer {
        &mut self.server
    }

    /// Queue an event as if the server had pushed it.
    pub fn inject(&mut self, event: WireEvent) {
        self.inbox.push_back(event);
    }

    /// Close from the server side once the inbox drains.
    pub fn close_from_server(&mut self) {
        self.peer_closed = true;
    }

    /// Refuse (or accept again) connection attempts.
    pub fn refuse_connections(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    /// Make every send fail (or succeed again).
    pub fn fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    /// Events waiting to be received.
    pub fn pending_events(&self) -> usize {
        self.inbox.len()
    }

    /// How many times `connect` was called.
    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts
    }

    /// Address of the last connection attempt.
    pub fn last_addr(&self) -> Option<&ServerAddress> {
        self.last_addr.as_ref()
    }

    /// Every event sent to the server, oldest first.
    pub fn sent(&self) -> &[WireEvent] {
        &self.sent
    }

    /// Events of one kind sent to the server.
    pub fn sent_of(&self, kind: EventKind) -> impl Iterator<Item = &WireEvent> {
        self.sent.iter().filter(move |e| e.event == kind)
    }

    /// Every presented action, oldest first.
    pub fn presented(&self) -> &[SessionAction] {
        &self.presented
    }

    /// Drain the presented actions.
    pub fn take_presented(&mut self) -> Vec<SessionAction> {
        std::mem::take(&mut self.presented)
    }
}

impl Driver for MemoryDriver {
    type Error = MemoryError;

    async fn connect(&mut self, addr: &ServerAddress) -> Result<(), MemoryError> {
        self.connect_attempts += 1;
        self.last_addr = Some(addr.clone());
        if self.refuse {
            return Err(MemoryError::Refused);
        }

        self.connected = true;
        self.peer_closed = false;
        self.inbox.clear();
        match self.server.on_connect() {
            Ok(events) => self.inbox.extend(events),
            Err(e) => tracing::warn!(error = %e, "sim server failed to greet"),
        }
        Ok(())
    }

    async fn send_event(&mut self, event: WireEvent) -> Result<(), MemoryError> {
        if !self.connected {
            return Err(MemoryError::NotConnected);
        }
        if self.fail_sends {
            return Err(MemoryError::BrokenPipe);
        }
        self.sent.push(event.clone());

        match self.server.handle(event) {
            Ok(replies) => self.inbox.extend(replies),
            Err(e) => self.inbox.push_back(WireEvent::new(EventKind::Error, e.to_string())),
        }
        Ok(())
    }

    async fn recv_event(&mut self) -> Option<WireEvent> {
        if let Some(event) = self.inbox.pop_front() {
            return Some(event);
        }
        if self.peer_closed || !self.connected {
            self.connected = false;
            return None;
        }
        std::future::pending().await
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        self.inbox.clear();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn present(&mut self, action: &SessionAction) -> Result<(), MemoryError> {
        self.presented.push(action.clone());
        Ok(())
    }
}
