//! Command line interface for the image bot. Supports creating the database,
//! serving the HTTP endpoints that receive mentions, and printing the bot's
//! public key.

mod bot;
mod command;
mod config;
mod error;
mod event;
mod images;
mod nip19;
mod relay;
mod reply;
mod server;
mod storage;

use std::{
    fs,
    net::SocketAddr,
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Settings;
use tracing::info;
use url::Url;

use crate::{
    bot::Bot,
    event::Keys,
    relay::RelayFetcher,
    reply::ReplyBuilder,
    storage::SqliteStore,
};

/// Command line interface entry point.
#[derive(Parser)]
#[command(name = "gazobot", author, version, about = "Nostr image collection bot")]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Create the database and its `images` table.
    Init,
    /// Serve `/command`, `/select` and the collection endpoints.
    Serve,
    /// Print the bot's public key as hex and npub.
    Pubkey,
}

/// Execute the selected CLI subcommand.
async fn run(
    cli: Cli,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    let keys = load_keys(&cfg)?;
    match cli.command {
        Commands::Init => {
            open_store(&cfg).await?;
            info!(database = %cfg.database_url, "database ready");
        }
        Commands::Serve => {
            let store = open_store(&cfg).await?;
            let public_url = Url::parse(&cfg.public_url).context("PUBLIC_URL")?;
            let addr: SocketAddr = cfg.bind_http.as_str().parse().context("BIND_HTTP")?;
            let replies = ReplyBuilder::new(keys);
            info!(pubkey = %replies.public_key(), relays = cfg.relays.len(), "starting bot");
            let bot = Bot::new(
                Arc::new(store),
                RelayFetcher::from_settings(&cfg),
                replies,
                public_url,
            );
            server::serve_http(addr, bot, shutdown).await?;
        }
        Commands::Pubkey => {
            println!("{}", keys.public_key());
            println!("{}", nip19::encode_npub(keys.public_key())?);
        }
    }
    Ok(())
}

fn load_keys(cfg: &Settings) -> anyhow::Result<Keys> {
    let secret = nip19::decode_secret_key(&cfg.bot_nsec).context("BOT_NSEC")?;
    Keys::from_secret_bytes(&secret).context("BOT_NSEC")
}

async fn open_store(cfg: &Settings) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening {}", cfg.database_url))?;
    store.migrate().await.context("creating tables")?;
    Ok(store)
}

/// Create a default `.env` file if one is not already present at `path`.
///
/// The generated file holds a fresh random secret key.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let base_dir = match env_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let db_path = base_dir.join("gazobot.db");
    let secret: [u8; 32] = rand::random();
    let mut content = String::new();
    content.push_str("BIND_HTTP=127.0.0.1:8787\n");
    content.push_str(&format!("DATABASE_URL=sqlite://{}\n", display_path(&db_path)));
    content.push_str(&format!("BOT_NSEC={}\n", hex::encode(secret)));
    content.push_str("RELAYS=\n");
    content.push_str("PUBLIC_URL=\n");
    content.push_str("FETCH_TIMEOUT_SECS=30\n");
    content.push_str("VERIFY_SIG=0\n");
    content.push_str("TOR_SOCKS=\n");
    fs::write(env_path, content)?;
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run(cli, shutdown).await
}
