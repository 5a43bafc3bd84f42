//! Command parsing for text-based interfaces.
//!
//! This module parses input lines into structured [`Command`] values.

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to a server. Fields are raw input; the runtime validates them.
    Connect {
        /// Hostname.
        host: String,
        /// Port, unparsed.
        port: String,
    },

    /// Log in.
    Login {
        /// Account name.
        username: String,
        /// Password.
        password: String,
    },

    /// Create an account.
    Register {
        /// Account name.
        username: String,
        /// Password.
        password: String,
        /// Password again.
        confirm: String,
    },

    /// Open the conversation with an online user.
    Open {
        /// Username.
        username: String,
    },

    /// Clear the conversation view.
    Clear,

    /// Quit the application.
    Quit,

    /// Send a message to the active conversation.
    Message {
        /// Message content.
        content: String,
    },

    /// Unknown command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse a user input line into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");
    let arg = |i: usize| parts.get(i).map(|s| (*s).to_string());

    match command {
        // Missing pieces become empty strings so address validation reports them.
        "connect" => Command::Connect { host: arg(1).unwrap_or_default(), port: arg(2).unwrap_or_default() },

        "login" => match (arg(1), arg(2)) {
            (Some(username), Some(password)) => Command::Login { username, password },
            _ => Command::InvalidArgs {
                command: "login".into(),
                error: "Usage: /login <username> <password>".into(),
            },
        },

        "register" => match (arg(1), arg(2), arg(3)) {
            (Some(username), Some(password), Some(confirm)) => {
                Command::Register { username, password, confirm }
            },
            _ => Command::InvalidArgs {
                command: "register".into(),
                error: "Usage: /register <username> <password> <confirm>".into(),
            },
        },

        "open" | "o" => match arg(1) {
            Some(username) => Command::Open { username },
            None => Command::InvalidArgs { command: "open".into(), error: "Usage: /open <username>".into() },
        },

        "clear" => Command::Clear,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_message() {
        assert_eq!(parse("hello world"), Command::Message { content: "hello world".into() });
    }

    #[test]
    fn parse_empty() {
        assert_eq!(parse("   "), Command::Message { content: String::new() });
    }

    #[test]
    fn parse_connect() {
        assert_eq!(
            parse("/connect localhost 8084"),
            Command::Connect { host: "localhost".into(), port: "8084".into() }
        );
    }

    #[test]
    fn parse_connect_missing_parts() {
        assert_eq!(parse("/connect"), Command::Connect { host: String::new(), port: String::new() });
        assert_eq!(parse("/connect h"), Command::Connect { host: "h".into(), port: String::new() });
    }

    #[test]
    fn parse_login() {
        assert_eq!(
            parse("/login alice secret"),
            Command::Login { username: "alice".into(), password: "secret".into() }
        );
        assert!(matches!(parse("/login alice"), Command::InvalidArgs { command, .. } if command == "login"));
    }

    #[test]
    fn parse_register() {
        assert_eq!(
            parse("/register bob pw pw"),
            Command::Register { username: "bob".into(), password: "pw".into(), confirm: "pw".into() }
        );
        assert!(matches!(parse("/register bob pw"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_open() {
        assert_eq!(parse("/open carol"), Command::Open { username: "carol".into() });
        assert_eq!(parse("/o carol"), Command::Open { username: "carol".into() });
        assert!(matches!(parse("/open"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_clear_and_quit() {
        assert_eq!(parse("/clear"), Command::Clear);
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/q"), Command::Quit);
    }

    #[test]
    fn parse_unknown_command() {
        assert!(matches!(parse("/dance"), Command::Unknown { input } if input == "/dance"));
    }
}
