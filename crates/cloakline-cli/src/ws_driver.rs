//! WebSocket [`Driver`]: one JSON `{"event", "data"}` object per text frame.

use std::io::{self, Stdout};

use cloakline_app::Driver;
use cloakline_core::{ServerAddress, SessionAction};
use cloakline_proto::{ProtocolError, WireEvent};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};

use crate::presenter::Presenter;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport failure.
#[derive(Debug, Error)]
pub enum WsError {
    /// Handshake or frame I/O failed.
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Outgoing event could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Send without an open connection.
    #[error("not connected")]
    NotConnected,

    /// Terminal output failed.
    #[error("output: {0}")]
    Io(#[from] io::Error),
}

/// Driver over a plain `ws://` connection, presenting to stdout.
#[derive(Debug)]
pub struct WsDriver {
    stream: Option<WsStream>,
    presenter: Presenter<Stdout>,
}

impl WsDriver {
    /// Disconnected driver.
    pub fn new(presenter: Presenter<Stdout>) -> Self {
        Self { stream: None, presenter }
    }
}

impl Driver for WsDriver {
    type Error = WsError;

    async fn connect(&mut self, addr: &ServerAddress) -> Result<(), WsError> {
        let url = format!("ws://{addr}/");
        let (stream, response) = connect_async(url.as_str()).await?;
        tracing::debug!(%url, status = %response.status(), "websocket open");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send_event(&mut self, event: WireEvent) -> Result<(), WsError> {
        let stream = self.stream.as_mut().ok_or(WsError::NotConnected)?;
        tracing::trace!(event = %event.event, "sending");
        stream.send(Message::text(event.to_json()?)).await?;
        Ok(())
    }

    async fn recv_event(&mut self) -> Option<WireEvent> {
        let Some(stream) = self.stream.as_mut() else {
            return std::future::pending().await;
        };

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match WireEvent::from_json(text.as_str()) {
                    Ok(event) => return Some(event),
                    Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "server closed websocket");
                    break;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket read failed");
                    break;
                },
                None => break,
            }
        }

        self.stream = None;
        None
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "websocket close failed");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn present(&mut self, action: &SessionAction) -> Result<(), WsError> {
        Ok(self.presenter.present(action)?)
    }
}
