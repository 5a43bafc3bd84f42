//! Cloakline command-line client.
//!
//! Reads commands from stdin, prints the conversation to stdout and logs to
//! stderr (`RUST_LOG` controls the level).

mod presenter;
mod ws_driver;

use std::{io, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use cloakline_app::{Command, Runtime, commands};
use cloakline_core::SessionConfig;
use cloakline_crypto::{CipherConfig, DEFAULT_CHUNK_SIZE, KeyStore, KeyStoreConfig, keystore::DEFAULT_KEY_BITS};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::EnvFilter;

use crate::{presenter::Presenter, ws_driver::WsDriver};

#[derive(Debug, Parser)]
#[command(name = "cloakline")]
#[command(about = "End-to-end encrypted chat client")]
struct Args {
    /// Connect to this host on startup.
    #[arg(long)]
    host: Option<String>,

    /// Server port used with `--host`.
    #[arg(long, default_value = "8084")]
    port: String,

    /// Key cache directory.
    #[arg(long, default_value = "keys")]
    key_dir: PathBuf,

    /// Local identity the key passphrase is derived from (defaults to the OS user).
    #[arg(long)]
    identity: Option<String>,

    /// Plaintext bytes per RSA block.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Modulus size when generating a new identity.
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    key_bits: usize,

    /// Online-user refresh interval.
    #[arg(long, default_value_t = 1000)]
    presence_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args = Args::parse();

    let defaults = KeyStoreConfig::default();
    let keystore = KeyStore::open(KeyStoreConfig {
        dir: args.key_dir,
        identity: args.identity.unwrap_or(defaults.identity),
        key_bits: args.key_bits,
    })
    .context("opening key cache")?;

    if !keystore.is_cached() {
        tracing::info!(dir = %keystore.dir().display(), bits = args.key_bits, "generating identity keypair");
    }

    let config = SessionConfig {
        presence_interval: Duration::from_millis(args.presence_interval_ms),
        cipher: CipherConfig { chunk_size: args.chunk_size },
    };
    let driver = WsDriver::new(Presenter::new(io::stdout()));
    let mut runtime = Runtime::open(driver, keystore, config).context("loading identity")?;

    let (tx, rx) = mpsc::channel(32);
    if let Some(host) = args.host {
        tx.send(Command::Connect { host, port: args.port }).await?;
    }
    tokio::spawn(read_commands(tx));

    runtime.run(rx).await?;
    Ok(())
}

/// Forward stdin lines as commands until EOF or the runtime stops listening.
async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(commands::parse(&line)).await.is_err() {
                    break;
                }
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            },
        }
    }
}
