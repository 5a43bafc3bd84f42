use std::time::Duration;

use cloakline_crypto::CipherConfig;

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How often to request a presence snapshot once authenticated.
    pub presence_interval: Duration,
    /// Envelope chunking.
    pub cipher: CipherConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { presence_interval: Duration::from_secs(1), cipher: CipherConfig::default() }
    }
}
