//! World state for scenario execution.
//!
//! The World owns the client session and the simulated server, shuttles
//! events between them, keeps the clock, and records everything the client
//! asked the UI to do so oracles can inspect it afterwards.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use cloakline_core::{Phase, SessionAction, SessionError, SessionEvent, SessionHandshake};
use cloakline_proto::{EventKind, WireEvent};

use crate::sim_server::SimServer;

/// Client session, simulated server, and what passed between them.
#[derive(Debug)]
pub struct World {
    session: SessionHandshake,
    server: SimServer,
    now: Instant,
    connected: bool,
    actions: Vec<SessionAction>,
    violations: Vec<SessionError>,
    events_sent: usize,
    events_received: usize,
}

impl World {
    /// World with a disconnected session.
    pub fn new(session: SessionHandshake, server: SimServer) -> Self {
        Self {
            session,
            server,
            now: Instant::now(),
            connected: false,
            actions: Vec::new(),
            violations: Vec::new(),
            events_sent: 0,
            events_received: 0,
        }
    }

    /// Client session.
    pub fn session(&self) -> &SessionHandshake {
        &self.session
    }

    /// Simulated server.
    pub fn server(&self) -> &SimServer {
        &self.server
    }

    /// Simulated server, mutably.
    pub fn server_mut(&mut self) -> &mut SimServer {
        &mut self.server
    }

    /// Current simulated time.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Every non-transport action the client produced, oldest first.
    pub fn actions(&self) -> &[SessionAction] {
        &self.actions
    }

    /// Drain the recorded actions.
    pub fn take_actions(&mut self) -> Vec<SessionAction> {
        std::mem::take(&mut self.actions)
    }

    /// Server events the session rejected.
    pub fn violations(&self) -> &[SessionError] {
        &self.violations
    }

    /// Number of events the client sent.
    pub fn events_sent(&self) -> usize {
        self.events_sent
    }

    /// Number of events the client received.
    pub fn events_received(&self) -> usize {
        self.events_received
    }

    /// Error messages shown so far, in order.
    pub fn errors(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::ShowError { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Open the transport and run the key exchange the server starts.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        let actions = self.session.handle(SessionEvent::Connected, self.now)?;
        self.connected = true;
        self.pump(actions);

        match self.server.on_connect() {
            Ok(greeting) => {
                for event in greeting {
                    self.deliver(event);
                }
            },
            Err(e) => tracing::warn!(error = %e, "sim server failed to greet"),
        }
        Ok(())
    }

    /// Close the transport from the client side.
    pub fn disconnect(&mut self) {
        self.connected = false;
        match self.session.handle(SessionEvent::Disconnected, self.now) {
            Ok(actions) => self.pump(actions),
            Err(e) => self.violations.push(e),
        }
    }

    /// Feed a user event to the session and carry out the result.
    pub fn client(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let actions = self.session.handle(event, self.now)?;
        self.pump(actions);
        Ok(())
    }

    /// Deliver a server event to the session.
    ///
    /// Rejected events are recorded as violations.
    pub fn deliver(&mut self, event: WireEvent) {
        if !self.connected {
            tracing::debug!(event = %event.event, "transport closed, dropping server event");
            return;
        }
        self.events_received += 1;
        match self.session.handle(SessionEvent::Received(event), self.now) {
            Ok(actions) => self.pump(actions),
            Err(e) => self.violations.push(e),
        }
    }

    /// Advance the clock and run periodic session work.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
        let actions = self.session.tick(self.now);
        self.pump(actions);
    }

    /// Phase shortcut.
    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn pump(&mut self, actions: Vec<SessionAction>) {
        let mut outbox = VecDeque::from(actions);

        while let Some(action) = outbox.pop_front() {
            match action {
                SessionAction::Send(event) => {
                    if !self.connected {
                        continue;
                    }
                    self.events_sent += 1;
                    let replies = self
                        .server
                        .handle(event)
                        .unwrap_or_else(|e| vec![WireEvent::new(EventKind::Error, e.to_string())]);

                    for reply in replies {
                        self.events_received += 1;
                        match self.session.handle(SessionEvent::Received(reply), self.now) {
                            Ok(more) => outbox.extend(more),
                            Err(e) => self.violations.push(e),
                        }
                    }
                },
                SessionAction::CloseTransport => self.connected = false,
                other => self.actions.push(other),
            }
        }
    }
}
