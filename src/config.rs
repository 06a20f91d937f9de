//! Configuration loading from `.env` files.

use std::{env, time::Duration};

use anyhow::{Context, Result};

/// Relays queried for every fetch, in addition to identifier hints.
pub const DEFAULT_RELAYS: [&str; 5] = [
    "wss://yabu.me",
    "wss://relay-jp.nostr.wirednet.jp",
    "wss://nos.lol",
    "wss://relay.damus.io",
    "wss://relay.nostr.band",
];

/// Default time a relay fetch may take before the note counts as missing.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings derived from environment variables.
#[derive(Clone)]
pub struct Settings {
    /// HTTP bind address, e.g. `127.0.0.1:8787`.
    pub bind_http: String,
    /// SQLite connection URL, e.g. `sqlite://gazobot.db`.
    pub database_url: String,
    /// Bot secret key as `nsec1…` or hex.
    pub bot_nsec: String,
    /// Relays queried when fetching notes.
    pub relays: Vec<String>,
    /// Base URL of the collection pages linked by `list`.
    pub public_url: String,
    /// Deadline for a single note fetch.
    pub fetch_timeout: Duration,
    /// Verify Schnorr signatures of fetched notes.
    pub verify_sig: bool,
    /// Optional Tor SOCKS proxy (host:port).
    pub tor_socks: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("bind_http", &self.bind_http)
            .field("database_url", &self.database_url)
            .field("bot_nsec", &"<redacted>")
            .field("relays", &self.relays)
            .field("public_url", &self.public_url)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("verify_sig", &self.verify_sig)
            .field("tor_socks", &self.tor_socks)
            .finish()
    }
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let bind_http = env::var("BIND_HTTP").context("BIND_HTTP")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL")?;
        let bot_nsec = env::var("BOT_NSEC").context("BOT_NSEC")?;
        let relays = match csv_strings(env::var("RELAYS").unwrap_or_default()) {
            v if v.is_empty() => DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            v => v,
        };
        let public_url = env::var("PUBLIC_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("http://{bind_http}"));
        let fetch_timeout = env::var("FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);
        let verify_sig = env::var("VERIFY_SIG").unwrap_or_else(|_| "0".into()) == "1";
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        Ok(Self {
            bind_http,
            database_url,
            bot_nsec,
            relays,
            public_url,
            fetch_timeout,
            verify_sig,
            tor_socks,
        })
    }
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    input
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
