//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from the transport and the
//! screen. The CLI implements it over a WebSocket and stdout; the test
//! harness implements it in memory against a simulated server. The generic
//! [`crate::Runtime`] is the same in both.

use std::future::Future;

use cloakline_core::{ServerAddress, SessionAction};
use cloakline_proto::WireEvent;

/// Abstracts transport and presentation for the runtime.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the transport to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn connect(&mut self, addr: &ServerAddress) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send an event to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or the write fails.
    fn send_event(&mut self, event: WireEvent) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receive the next event from the server.
    ///
    /// Returns `None` once the transport has closed; [`Driver::is_connected`]
    /// must report false from then on.
    fn recv_event(&mut self) -> impl Future<Output = Option<WireEvent>> + Send;

    /// Close the transport. Idempotent.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Whether the transport is open.
    fn is_connected(&self) -> bool;

    /// Show a user-visible effect.
    ///
    /// Receives every action except `Send`, `CloseTransport` and
    /// `CacheContactKey`, which the runtime carries out itself.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn present(&mut self, action: &SessionAction) -> Result<(), Self::Error>;
}
