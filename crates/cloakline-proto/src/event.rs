//! Named protocol events.
//!
//! Events are symmetric: the same name is used for a client request and the
//! server's response (`login` out, `login` back). Transport-level
//! connect/disconnect are not events on the wire and are modelled by the
//! session layer instead.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Event names carried on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// PEM public key, unencrypted. Sent by both peers.
    SendPublicKey,
    /// Session MAC, encrypted to the client's key.
    SendMac,
    /// Login request / response.
    Login,
    /// Registration request / response.
    Register,
    /// Presence snapshot request / response.
    OnlineUsers,
    /// Contact public key request / response.
    UserPublicKey,
    /// Chat message (outgoing send, or incoming relay).
    Message,
    /// Historical message replayed by the server.
    LoadMessage,
    /// Server echo of a message we sent.
    MessageResult,
    /// Server-reported error, unencrypted.
    Error,
}

impl EventKind {
    /// All protocol events.
    pub const ALL: [Self; 10] = [
        Self::SendPublicKey,
        Self::SendMac,
        Self::Login,
        Self::Register,
        Self::OnlineUsers,
        Self::UserPublicKey,
        Self::Message,
        Self::LoadMessage,
        Self::MessageResult,
        Self::Error,
    ];

    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendPublicKey => "sendPublicKey",
            Self::SendMac => "sendMac",
            Self::Login => "login",
            Self::Register => "register",
            Self::OnlineUsers => "onlineUsers",
            Self::UserPublicKey => "userPublicKey",
            Self::Message => "message",
            Self::LoadMessage => "loadMessage",
            Self::MessageResult => "messageResult",
            Self::Error => "error",
        }
    }

    /// Whether the payload of this event is an envelope.
    pub fn is_encrypted(self) -> bool {
        !matches!(self, Self::SendPublicKey | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownEvent(s.to_string()))
    }
}

/// One event on the channel.
///
/// `data` is kept as an opaque string: a PEM for `sendPublicKey`, envelope
/// JSON for encrypted events, free text for `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event name.
    pub event: EventKind,
    /// Raw payload.
    pub data: String,
}

impl WireEvent {
    /// Create an event.
    pub fn new(event: EventKind, data: impl Into<String>) -> Self {
        Self { event, data: data.into() }
    }

    /// Decode a `{"event": ..., "data": ...}` text frame.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }

    /// Encode as a `{"event": ..., "data": ...}` text frame.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn serde_names_match_wire_names() {
        for kind in EventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn unknown_event_rejected() {
        let err = "sendKeys".parse::<EventKind>().unwrap_err();
        assert_eq!(err, ProtocolError::UnknownEvent("sendKeys".into()));
    }

    #[test]
    fn only_key_exchange_and_error_are_cleartext() {
        let clear: Vec<_> = EventKind::ALL.into_iter().filter(|k| !k.is_encrypted()).collect();
        assert_eq!(clear, vec![EventKind::SendPublicKey, EventKind::Error]);
    }

    #[test]
    fn wire_frame_format() {
        let event = WireEvent::new(EventKind::SendMac, "[\"AAAA\"]");
        insta::assert_snapshot!(event.to_json().unwrap(), @r#"{"event":"sendMac","data":"[\"AAAA\"]"}"#);
    }

    #[test]
    fn malformed_frame_rejected() {
        assert!(matches!(WireEvent::from_json("{\"event\":\"login\"}"), Err(ProtocolError::MalformedFrame(_))));
        assert!(matches!(
            WireEvent::from_json("{\"event\":\"nope\",\"data\":\"\"}"),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }
}
