//! Line-oriented rendering of session actions.

use std::io::{self, Write};

use cloakline_core::{ChatMessage, Direction, ErrorScope, SessionAction, View};

/// Writes one line (or a block of lines) per user-visible action.
#[derive(Debug)]
pub struct Presenter<W> {
    out: W,
}

impl<W: Write> Presenter<W> {
    /// Presenter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Render an action. Actions with nothing to show are skipped.
    pub fn present(&mut self, action: &SessionAction) -> io::Result<()> {
        if let Some(text) = render(action) {
            writeln!(self.out, "{text}")?;
            self.out.flush()?;
        }
        Ok(())
    }
}

/// Text for an action, if it has any.
pub fn render(action: &SessionAction) -> Option<String> {
    let text = match action {
        SessionAction::ShowView(View::Connection) => "Disconnected. /connect <host> <port>".to_string(),
        SessionAction::ShowView(View::Auth) => {
            "Connected. /login <user> <password> or /register <user> <password> <confirm>".to_string()
        },
        SessionAction::ShowView(View::Chat) => "Logged in. /open <user> to start a conversation".to_string(),
        SessionAction::ShowError { scope, message } => {
            let scope = match scope {
                ErrorScope::Connection => "connection",
                ErrorScope::Auth => "auth",
                ErrorScope::Chat => "chat",
            };
            format!("! [{scope}] {message}")
        },
        SessionAction::PresenceChanged(diff) => {
            let online = diff.added.iter().map(|c| format!("+ {} is online", c.username));
            let offline = diff.removed.iter().map(|c| format!("- {} went offline", c.username));
            online.chain(offline).collect::<Vec<_>>().join("\n")
        },
        SessionAction::DeliverMessage(message) => line(message),
        SessionAction::MarkUnread { contact } => format!("* new message from {contact} (/open {contact})"),
        SessionAction::ShowConversation { contact, messages } => {
            let mut lines = vec![format!("--- {contact} ---")];
            lines.extend(messages.iter().map(line));
            lines.join("\n")
        },
        SessionAction::ClearConversation => "--- cleared ---".to_string(),
        SessionAction::RequestFailed { username, error } => format!("! key request for {username}: {error}"),
        SessionAction::Send(_)
        | SessionAction::CloseTransport
        | SessionAction::PhaseChanged(_)
        | SessionAction::SetSubmitEnabled { .. }
        | SessionAction::CacheContactKey { .. } => return None,
    };
    Some(text)
}

fn line(message: &ChatMessage) -> String {
    match message.direction {
        Direction::Incoming => format!("<{}> {}", message.contact, message.body),
        Direction::Outgoing => format!("<me> {}", message.body),
    }
}

#[cfg(test)]
mod tests {
    use cloakline_core::{PresenceDiff, RequestError};
    use cloakline_proto::Contact;

    use super::*;

    fn message(id: u64, contact: &str, body: &str, direction: Direction) -> ChatMessage {
        ChatMessage { id, contact: contact.into(), body: body.into(), direction }
    }

    #[test]
    fn conversation_block() {
        let action = SessionAction::ShowConversation {
            contact: "bob".into(),
            messages: vec![
                message(1, "bob", "hi", Direction::Incoming),
                message(2, "bob", "hello bob", Direction::Outgoing),
            ],
        };
        insta::assert_snapshot!(render(&action).unwrap(), @r"
        --- bob ---
        <bob> hi
        <me> hello bob
        ");
    }

    #[test]
    fn presence_diff_lines() {
        let action = SessionAction::PresenceChanged(PresenceDiff {
            added: vec![Contact::new("carol", "3")],
            removed: vec![Contact::new("bob", "2")],
        });
        insta::assert_snapshot!(render(&action).unwrap(), @r"
        + carol is online
        - bob went offline
        ");
    }

    #[test]
    fn errors_carry_scope() {
        let action = SessionAction::ShowError { scope: ErrorScope::Auth, message: "Passwords do not match".into() };
        assert_eq!(render(&action).unwrap(), "! [auth] Passwords do not match");

        let action = SessionAction::RequestFailed { username: "bob".into(), error: RequestError::Disconnected };
        assert_eq!(render(&action).unwrap(), "! key request for bob: disconnected before response");
    }

    #[test]
    fn internal_actions_are_silent() {
        assert!(render(&SessionAction::CloseTransport).is_none());
        assert!(render(&SessionAction::PhaseChanged(cloakline_core::Phase::Authenticated)).is_none());
    }

    #[test]
    fn presenter_writes_lines() {
        let mut presenter = Presenter::new(Vec::new());
        presenter.present(&SessionAction::MarkUnread { contact: "carol".into() }).unwrap();
        presenter.present(&SessionAction::CloseTransport).unwrap();
        presenter.present(&SessionAction::ClearConversation).unwrap();

        let out = String::from_utf8(presenter.out).unwrap();
        assert_eq!(out, "* new message from carol (/open carol)\n--- cleared ---\n");
    }
}
