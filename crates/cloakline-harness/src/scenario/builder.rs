//! Scenario builder API.
//!
//! Declarative setup for session tests: who exists on the server, who is
//! online, whether the client logs in, and a list of steps. A scenario cannot
//! run without an oracle.

use std::time::Duration;

use cloakline_core::SessionEvent;
use cloakline_crypto::PrivateKey;
use cloakline_proto::{EventKind, payloads::Credentials};

use crate::{
    fixtures,
    scenario::{OracleFn, World},
    sim_server::SimServer,
};

/// One thing that happens after the client is connected.
#[derive(Debug, Clone)]
pub enum Step {
    /// Open the conversation with an online user, fetching their key.
    Open(String),
    /// Send text to the active conversation.
    Send(String),
    /// Another user sends the client a live message.
    Relay {
        /// Sender.
        from: String,
        /// Plaintext body.
        body: String,
    },
    /// A user comes online.
    Online {
        /// Username.
        username: String,
        /// Published key.
        pem: String,
    },
    /// A user goes offline.
    Offline(String),
    /// Let time pass.
    Advance(Duration),
    /// Drop the connection.
    Disconnect,
    /// Reconnect and log in again with the scenario credentials.
    Reconnect,
}

/// Scenario builder.
pub struct Scenario {
    name: String,
    client_key: PrivateKey,
    accounts: Vec<(String, String)>,
    online: Vec<(String, String)>,
    login: Option<(String, String)>,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    ///
    /// The client uses the shared fixture key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client_key: fixtures::client_key().clone(),
            accounts: Vec::new(),
            online: Vec::new(),
            login: None,
            steps: Vec::new(),
        }
    }

    /// Use a different client key.
    #[must_use]
    pub fn client_key(mut self, key: PrivateKey) -> Self {
        self.client_key = key;
        self
    }

    /// Register an account on the server.
    #[must_use]
    pub fn account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.push((username.into(), password.into()));
        self
    }

    /// Put another user online with a published key.
    #[must_use]
    pub fn online(mut self, username: impl Into<String>, pem: impl Into<String>) -> Self {
        self.online.push((username.into(), pem.into()));
        self
    }

    /// Log in after the key exchange.
    #[must_use]
    pub fn login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some((username.into(), password.into()));
        self
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// 1. Build the server with the configured accounts and online users
    /// 2. Connect and complete the key exchange
    /// 3. Log in, if configured
    /// 4. Run the steps in order
    /// 5. Hand the world to the oracle
    pub fn run(self) -> Result<(), String> {
        let name = self.scenario.name.clone();
        let world = self.build().map_err(|e| format!("Scenario '{name}': {e}"))?;
        (self.oracle)(&world)
    }

    fn build(&self) -> Result<World, String> {
        let scenario = &self.scenario;

        let mut server = SimServer::new(fixtures::server_key().clone(), fixtures::cipher_config());
        for (username, password) in &scenario.accounts {
            server = server.with_account(username, password);
        }
        for (username, pem) in &scenario.online {
            server.set_online(username, pem.clone());
        }

        let session = cloakline_core::SessionHandshake::new(fixtures::session_config(), scenario.client_key.clone())
            .map_err(|e| format!("session setup failed: {e}"))?;

        let mut world = World::new(session, server);
        self.sign_in(&mut world)?;

        for step in &scenario.steps {
            run_step(&mut world, step, scenario.login.as_ref())?;
        }
        Ok(world)
    }

    fn sign_in(&self, world: &mut World) -> Result<(), String> {
        world.connect().map_err(|e| format!("connect failed: {e}"))?;
        if let Some((username, password)) = &self.scenario.login {
            world
                .client(SessionEvent::SubmitLogin(Credentials::new(username.clone(), password.clone())))
                .map_err(|e| format!("login as {username} failed: {e}"))?;
        }
        Ok(())
    }
}

fn run_step(world: &mut World, step: &Step, login: Option<&(String, String)>) -> Result<(), String> {
    match step {
        Step::Open(username) => {
            let contact = world
                .session()
                .presence()
                .find(username)
                .cloned()
                .ok_or_else(|| format!("{username} is not online"))?;
            world
                .client(SessionEvent::OpenConversation { contact, cached_key: None })
                .map_err(|e| format!("open {username} failed: {e}"))
        },
        Step::Send(text) => {
            world.client(SessionEvent::SendMessage { text: text.clone() }).map_err(|e| format!("send failed: {e}"))
        },
        Step::Relay { from, body } => {
            let event = world
                .server()
                .relay(EventKind::Message, from, None, body)
                .map_err(|e| format!("relay from {from} failed: {e}"))?;
            world.deliver(event);
            Ok(())
        },
        Step::Online { username, pem } => {
            world.server_mut().set_online(username, pem.clone());
            Ok(())
        },
        Step::Offline(username) => {
            world.server_mut().set_offline(username);
            Ok(())
        },
        Step::Advance(by) => {
            world.advance(*by);
            Ok(())
        },
        Step::Disconnect => {
            world.disconnect();
            Ok(())
        },
        Step::Reconnect => {
            world.connect().map_err(|e| format!("reconnect failed: {e}"))?;
            if let Some((username, password)) = login {
                world
                    .client(SessionEvent::SubmitLogin(Credentials::new(username.clone(), password.clone())))
                    .map_err(|e| format!("login as {username} failed: {e}"))?;
            }
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use cloakline_core::Phase;

    use super::*;

    #[test]
    fn scenario_connects_and_exchanges_keys() {
        Scenario::new("key exchange")
            .oracle(Box::new(|world| {
                assert_eq!(world.phase(), Phase::Authenticating);
                assert!(world.session().context().mac().is_some());
                Ok(())
            }))
            .run()
            .expect("scenario should succeed");
    }

    #[test]
    fn open_requires_presence() {
        let result = Scenario::new("offline contact")
            .account("alice", "pw")
            .login("alice", "pw")
            .step(Step::Open("nobody".into()))
            .oracle(Box::new(|_| Ok(())))
            .run();

        let err = result.expect_err("opening an offline contact fails");
        assert!(err.contains("nobody is not online"), "{err}");
    }
}
