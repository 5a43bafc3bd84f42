//! Runtime tests over the in-memory driver.
//!
//! Tokio's clock is paused, so presence ticks happen exactly on the interval
//! and idle waits cost nothing.

use std::time::Duration;

use cloakline_app::{Command, Driver, Runtime, RuntimeError};
use cloakline_core::{ErrorScope, Phase, SessionAction, SessionConfig, SessionError, SessionHandshake, View};
use cloakline_crypto::{CipherConfig, KeyStore, KeyStoreConfig};
use cloakline_harness::{MemoryDriver, SimServer, fixtures};
use cloakline_proto::{EventKind, WireEvent};
use tempfile::TempDir;
use tokio::{sync::mpsc, time};

fn keystore(dir: &TempDir) -> KeyStore {
    KeyStore::open(KeyStoreConfig { dir: dir.path().to_path_buf(), identity: "tester".into(), key_bits: 1024 })
        .expect("keystore")
}

fn server() -> SimServer {
    SimServer::new(fixtures::server_key().clone(), fixtures::cipher_config())
        .with_account("alice", "secret")
        .with_online_user("bob", fixtures::pem_of(fixtures::bob_key()))
}

fn runtime(dir: &TempDir) -> Runtime<MemoryDriver> {
    Runtime::new(MemoryDriver::new(server()), fixtures::session().expect("session"), keystore(dir))
}

fn connect() -> Command {
    Command::Connect { host: "localhost".into(), port: "8084".into() }
}

fn login() -> Command {
    Command::Login { username: "alice".into(), password: "secret".into() }
}

/// Hand every queued server event to the runtime.
async fn pump(rt: &mut Runtime<MemoryDriver>) {
    while rt.driver().pending_events() > 0 {
        let event = rt.driver_mut().recv_event().await.expect("queued event");
        rt.handle_incoming(event).await.expect("handled");
    }
}

async fn signed_in(rt: &mut Runtime<MemoryDriver>) {
    assert!(rt.handle_command(connect()).await.expect("connect"));
    pump(rt).await;
    assert!(rt.handle_command(login()).await.expect("login"));
    pump(rt).await;
    assert_eq!(rt.session().phase(), Phase::Authenticated);
}

async fn run_commands(rt: &mut Runtime<MemoryDriver>, commands: Vec<Command>) {
    let (tx, rx) = mpsc::channel(16);
    for command in commands {
        tx.send(command).await.expect("queue command");
    }
    drop(tx);
    rt.run(rx).await.expect("run");
}

fn errors(presented: &[SessionAction]) -> Vec<(ErrorScope, &str)> {
    presented
        .iter()
        .filter_map(|a| match a {
            SessionAction::ShowError { scope, message } => Some((*scope, message.as_str())),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn invalid_address_is_rejected_before_any_io() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);

    for (host, port) in [("", "8084"), ("localhost", ""), ("localhost", "http"), ("localhost", "70000")] {
        let keep_going =
            rt.handle_command(Command::Connect { host: host.into(), port: port.into() }).await.expect("handled");
        assert!(keep_going);
    }

    assert_eq!(rt.driver().connect_attempts(), 0);
    let shown = errors(rt.driver().presented());
    assert_eq!(shown.len(), 4);
    assert!(shown.iter().all(|(scope, _)| *scope == ErrorScope::Connection));
    assert_eq!(rt.session().phase(), Phase::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn refused_connection_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);
    rt.driver_mut().refuse_connections(true);

    let keep_going = rt.handle_command(connect()).await.expect("handled");
    assert!(keep_going);
    assert_eq!(rt.driver().connect_attempts(), 1);
    assert_eq!(rt.session().phase(), Phase::Disconnected);
    assert_eq!(errors(rt.driver().presented()), vec![(ErrorScope::Connection, "connection error: connection refused")]);

    // A direct connect reports the typed error.
    let err = rt.connect("localhost", "8084").await.expect_err("refused");
    assert!(matches!(err, RuntimeError::Session(SessionError::Connection(_))));
}

#[tokio::test(start_paused = true)]
async fn run_loop_completes_login_from_commands() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);

    run_commands(&mut rt, vec![connect(), login(), Command::Quit]).await;

    let presented = rt.driver().presented();
    assert!(presented.contains(&SessionAction::PhaseChanged(Phase::Authenticated)));
    assert!(presented.contains(&SessionAction::ShowView(View::Chat)));
    assert!(presented.iter().any(|a| matches!(
        a,
        SessionAction::PresenceChanged(diff) if diff.added.iter().any(|c| c.username == "bob")
    )));
    assert_eq!(rt.driver().last_addr().map(ToString::to_string), Some("localhost:8084".into()));

    // Quit closes the session.
    assert!(!rt.driver().is_connected());
    assert_eq!(rt.session().phase(), Phase::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn presence_refreshes_on_the_interval() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);
    signed_in(&mut rt).await;
    assert_eq!(rt.driver().sent_of(EventKind::OnlineUsers).count(), 1);

    let (_tx, rx) = mpsc::channel(1);
    let _ = time::timeout(Duration::from_millis(3500), rt.run(rx)).await;

    assert_eq!(rt.driver().sent_of(EventKind::OnlineUsers).count(), 4);
}

#[tokio::test]
async fn presence_keeps_pace_with_a_real_clock() {
    let dir = TempDir::new().expect("tempdir");
    let config = SessionConfig { presence_interval: Duration::from_millis(200), cipher: fixtures::cipher_config() };
    let session = SessionHandshake::new(config, fixtures::client_key().clone()).expect("session");
    let mut rt = Runtime::new(MemoryDriver::new(server()), session, keystore(&dir));
    signed_in(&mut rt).await;

    let (_tx, rx) = mpsc::channel(1);
    let _ = time::timeout(Duration::from_millis(2100), rt.run(rx)).await;

    // One refresh at login plus one per elapsed interval, less at most one.
    let refreshes = rt.driver().sent_of(EventKind::OnlineUsers).count();
    assert!(refreshes >= 10, "only {refreshes} presence refreshes in 2.1s");
}

#[tokio::test(start_paused = true)]
async fn fetched_contact_key_is_cached_and_reused() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);
    let open_bob = || Command::Open { username: "bob".into() };

    run_commands(&mut rt, vec![connect(), login(), open_bob(), Command::Quit]).await;
    assert_eq!(rt.driver().sent_of(EventKind::UserPublicKey).count(), 1);

    let bob = rt.driver().server().contact("bob").cloned().expect("bob online");
    let cached = rt.keystore().load_cached_public_key(&bob).expect("bob's key cached");
    assert_eq!(cached, fixtures::bob_key().public_key());

    // Next session: the key comes from the cache.
    run_commands(&mut rt, vec![connect(), login(), open_bob(), Command::Quit]).await;
    assert_eq!(rt.driver().sent_of(EventKind::UserPublicKey).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn user_mistakes_are_presented_not_returned() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);

    // Chat before connecting.
    rt.handle_command(Command::Message { content: "hi".into() }).await.expect("handled");

    assert!(rt.handle_command(connect()).await.expect("connect"));
    pump(&mut rt).await;

    // Second submission while the first is unanswered.
    rt.handle_command(login()).await.expect("handled");
    rt.handle_command(login()).await.expect("handled");
    pump(&mut rt).await;

    rt.handle_command(Command::Open { username: "nobody".into() }).await.expect("handled");
    rt.handle_command(Command::Unknown { input: "/dance".into() }).await.expect("handled");
    rt.handle_command(Command::Message { content: "hi".into() }).await.expect("handled");

    let presented = rt.driver().presented().to_vec();
    let shown = errors(&presented);
    let scopes: Vec<ErrorScope> = shown.iter().map(|(scope, _)| *scope).collect();
    assert_eq!(
        scopes,
        vec![ErrorScope::Chat, ErrorScope::Auth, ErrorScope::Chat, ErrorScope::Chat, ErrorScope::Chat]
    );
    assert_eq!(shown[2].1, "nobody is not online");
    assert_eq!(shown[3].1, "Unknown command: /dance");

    // Empty messages are ignored outright.
    rt.driver_mut().take_presented();
    rt.handle_command(Command::Message { content: String::new() }).await.expect("handled");
    assert!(rt.driver().presented().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pushed_server_events_are_presented_or_dropped() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);
    signed_in(&mut rt).await;
    rt.driver_mut().take_presented();

    // Out-of-phase handshake event, then a server error notice.
    rt.driver_mut().inject(WireEvent::new(EventKind::SendMac, "[\"AAAA\"]"));
    rt.driver_mut().inject(WireEvent::new(EventKind::Error, "server restarting"));
    pump(&mut rt).await;

    assert_eq!(rt.session().phase(), Phase::Authenticated);
    assert_eq!(errors(rt.driver().presented()), vec![(ErrorScope::Chat, "server restarting")]);
}

#[tokio::test(start_paused = true)]
async fn peer_close_resets_the_session() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);
    signed_in(&mut rt).await;

    rt.driver_mut().close_from_server();
    run_commands(&mut rt, Vec::new()).await;

    assert_eq!(rt.session().phase(), Phase::Disconnected);
    assert!(rt.driver().presented().contains(&SessionAction::ShowView(View::Connection)));
    assert_eq!(rt.session().presence().online().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_failure_tears_the_session_down() {
    let dir = TempDir::new().expect("tempdir");
    let mut rt = runtime(&dir);
    signed_in(&mut rt).await;

    rt.driver_mut().fail_sends(true);
    rt.handle_command(Command::Open { username: "bob".into() }).await.expect("handled");

    assert_eq!(rt.session().phase(), Phase::Disconnected);
    assert!(!rt.driver().is_connected());
    assert!(rt.driver().presented().iter().any(|a| matches!(
        a,
        SessionAction::RequestFailed { username, .. } if username == "bob"
    )));
}

#[tokio::test(start_paused = true)]
async fn open_creates_a_persistent_identity() {
    let dir = TempDir::new().expect("tempdir");
    let config = SessionConfig { presence_interval: Duration::from_secs(1), cipher: CipherConfig { chunk_size: 64 } };
    let server = || {
        SimServer::new(fixtures::server_key().clone(), CipherConfig { chunk_size: 64 }).with_account("alice", "secret")
    };

    let mut rt = Runtime::open(MemoryDriver::new(server()), keystore(&dir), config).expect("open");
    let first_pem = rt.session().public_pem().to_string();
    assert!(rt.keystore().is_cached());

    signed_in(&mut rt).await;
    assert!(rt.driver().presented().contains(&SessionAction::ShowView(View::Chat)));

    let again = Runtime::open(MemoryDriver::new(server()), keystore(&dir), config).expect("reopen");
    assert_eq!(again.session().public_pem(), first_pem);
}
