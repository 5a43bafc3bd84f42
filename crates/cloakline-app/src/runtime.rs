//! Generic runtime that executes session actions through a [`Driver`].
//!
//! ```text
//! commands ──┐
//! transport ─┼──> SessionHandshake::handle / tick ──> Vec<SessionAction>
//! interval ──┘                                              │
//!                       Send / CloseTransport / CacheContactKey: runtime
//!                       everything else: Driver::present
//! ```
//!
//! One task owns the session, so nothing is shared or locked.

use std::{collections::VecDeque, time::Instant};

use cloakline_core::{
    ErrorScope, ServerAddress, SessionAction, SessionConfig, SessionError, SessionEvent, SessionHandshake,
};
use cloakline_crypto::{CryptoError, KeyStore};
use cloakline_proto::{
    WireEvent,
    payloads::Credentials,
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};

use crate::{commands::Command, driver::Driver};

/// Runtime failure.
#[derive(Debug, Error)]
pub enum RuntimeError<E>
where
    E: std::error::Error + 'static,
{
    /// Session rejected an operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Driver I/O failed.
    #[error("driver error: {0}")]
    Driver(#[source] E),

    /// Key cache failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Drives a [`SessionHandshake`] with a [`Driver`].
#[derive(Debug)]
pub struct Runtime<D: Driver> {
    driver: D,
    session: SessionHandshake,
    keystore: KeyStore,
}

impl<D: Driver> Runtime<D> {
    /// Create a runtime around an existing session.
    pub fn new(driver: D, session: SessionHandshake, keystore: KeyStore) -> Self {
        Self { driver, session, keystore }
    }

    /// Load or create the local identity from `keystore` and start a session.
    pub fn open(driver: D, keystore: KeyStore, config: SessionConfig) -> Result<Self, RuntimeError<D::Error>> {
        let pair = keystore.get_or_create_key_pair()?;
        let private_key = pair.unlock(keystore.passphrase())?;
        let session = SessionHandshake::new(config, private_key)?;
        Ok(Self::new(driver, session, keystore))
    }

    /// Session state.
    pub fn session(&self) -> &SessionHandshake {
        &self.session
    }

    /// Driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Key cache.
    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    /// Validate the address and open the transport.
    ///
    /// An open session is closed first.
    ///
    /// # Errors
    ///
    /// `Session(InvalidAddress)` before any I/O if the address is malformed,
    /// `Session(Connection)` if the transport cannot be opened.
    pub async fn connect(&mut self, host: &str, port: &str) -> Result<(), RuntimeError<D::Error>> {
        let addr = ServerAddress::parse(host, port).map_err(SessionError::from)?;

        if self.driver.is_connected() {
            self.close().await?;
        }

        tracing::info!(%addr, "connecting");
        if let Err(e) = self.driver.connect(&addr).await {
            tracing::warn!(%addr, error = %e, "connection failed");
            return Err(SessionError::Connection(e.to_string()).into());
        }
        self.dispatch(SessionEvent::Connected).await
    }

    /// Close the transport and reset the session.
    pub async fn close(&mut self) -> Result<(), RuntimeError<D::Error>> {
        self.driver.disconnect().await;
        self.dispatch(SessionEvent::Disconnected).await
    }

    /// Feed one event to the session and execute the resulting actions.
    ///
    /// # Errors
    ///
    /// Session errors are returned unchanged; the session state is untouched
    /// in that case.
    pub async fn dispatch(&mut self, event: SessionEvent) -> Result<(), RuntimeError<D::Error>> {
        let actions = self.session.handle(event, now())?;
        self.execute(actions).await
    }

    /// Process one server event.
    ///
    /// Phase violations from the server are logged and dropped.
    pub async fn handle_incoming(&mut self, event: WireEvent) -> Result<(), RuntimeError<D::Error>> {
        match self.dispatch(SessionEvent::Received(event)).await {
            Err(RuntimeError::Session(e)) => {
                tracing::warn!(error = %e, "ignoring server event");
                Ok(())
            },
            other => other,
        }
    }

    /// Run periodic session work.
    pub async fn tick(&mut self) -> Result<(), RuntimeError<D::Error>> {
        let actions = self.session.tick(now());
        self.execute(actions).await
    }

    /// Carry out a user command.
    ///
    /// Rejections the user can act on are presented as errors rather than
    /// returned. Returns false for [`Command::Quit`].
    ///
    /// # Errors
    ///
    /// Driver failures only.
    pub async fn handle_command(&mut self, command: Command) -> Result<bool, RuntimeError<D::Error>> {
        let result = match command {
            Command::Quit => return Ok(false),
            Command::Connect { host, port } => self.connect(&host, &port).await,
            Command::Login { username, password } => {
                self.dispatch(SessionEvent::SubmitLogin(Credentials::new(username, password))).await
            },
            Command::Register { username, password, confirm } => {
                let credentials = Credentials::new(username, password);
                self.dispatch(SessionEvent::SubmitRegister { credentials, confirm }).await
            },
            Command::Open { username } => self.open_conversation(&username).await,
            Command::Clear => self.dispatch(SessionEvent::ClearConversation).await,
            Command::Message { content } if content.is_empty() => Ok(()),
            Command::Message { content } => self.dispatch(SessionEvent::SendMessage { text: content }).await,
            Command::Unknown { input } => {
                self.present_error(ErrorScope::Chat, format!("Unknown command: {input}"))
            },
            Command::InvalidArgs { error, .. } => self.present_error(ErrorScope::Chat, error),
        };

        match result {
            Err(RuntimeError::Session(e)) => {
                tracing::debug!(error = %e, "command rejected");
                let scope = match e {
                    SessionError::InvalidAddress(_) | SessionError::Connection(_) => ErrorScope::Connection,
                    SessionError::SubmissionInFlight(_) => ErrorScope::Auth,
                    _ => ErrorScope::Chat,
                };
                self.present_error(scope, e.to_string())?;
            },
            other => other?,
        }
        Ok(true)
    }

    /// Main loop: server events, presence ticks and user commands until
    /// [`Command::Quit`] or the command channel closes.
    ///
    /// Server events are drained before the next command is taken, so a
    /// command always sees the effects of everything the server has sent.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) -> Result<(), RuntimeError<D::Error>> {
        let mut ticker = time::interval(self.session.config().presence_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                event = self.driver.recv_event(), if self.driver.is_connected() => match event {
                    Some(event) => self.handle_incoming(event).await?,
                    None => {
                        tracing::info!("transport closed by peer");
                        self.close().await?;
                    },
                },

                _ = ticker.tick() => self.tick().await?,

                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await? {
                            break;
                        }
                    },
                    None => break,
                },
            }
        }

        if self.driver.is_connected() {
            self.close().await?;
        }
        Ok(())
    }

    async fn open_conversation(&mut self, username: &str) -> Result<(), RuntimeError<D::Error>> {
        let Some(contact) = self.session.presence().find(username).cloned() else {
            return self.present_error(ErrorScope::Chat, format!("{username} is not online"));
        };

        let cached_key = match self.keystore.load_cached_public_key(&contact) {
            Ok(key) => Some(key),
            Err(CryptoError::KeyNotCached { .. }) => None,
            Err(e) => {
                tracing::warn!(contact = %username, error = %e, "ignoring unreadable cached key");
                None
            },
        };

        self.dispatch(SessionEvent::OpenConversation { contact, cached_key }).await
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) -> Result<(), RuntimeError<D::Error>> {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Send(event) => {
                    if !self.driver.is_connected() {
                        tracing::debug!(event = %event.event, "transport closed, dropping event");
                        continue;
                    }
                    if let Err(e) = self.driver.send_event(event).await {
                        tracing::warn!(error = %e, "send failed, closing session");
                        self.driver.disconnect().await;
                        queue.extend(self.session.handle(SessionEvent::Disconnected, now())?);
                    }
                },
                SessionAction::CloseTransport => self.driver.disconnect().await,
                SessionAction::CacheContactKey { contact, pem } => {
                    if let Err(e) = self.keystore.cache_public_key(&contact, &pem) {
                        tracing::warn!(contact = %contact.username, error = %e, "failed to cache contact key");
                    }
                },
                other => self.driver.present(&other).map_err(RuntimeError::Driver)?,
            }
        }
        Ok(())
    }

    fn present_error(&mut self, scope: ErrorScope, message: String) -> Result<(), RuntimeError<D::Error>> {
        self.driver.present(&SessionAction::ShowError { scope, message }).map_err(RuntimeError::Driver)
    }
}

fn now() -> Instant {
    time::Instant::now().into_std()
}
