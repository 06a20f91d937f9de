//! Error kinds raised while handling a mention.

use thiserror::Error;

/// Failures surfaced by command handling, relay fetches and reply signing.
///
/// Everything raised after a mention has been read from the request body is
/// turned into a signed error reply; only [`BotError::SelfReply`] and
/// signing failures escape as transport errors.
#[derive(Debug, Error)]
pub enum BotError {
    /// Malformed or too short command, or an undecodable identifier.
    #[error("bad command: {0}")]
    Parse(String),

    /// The verb token is not one of `list`, `add` or `delete`.
    #[error("unknown command: {0}")]
    UnknownVerb(String),

    /// A bech32 identifier with a prefix other than `note` or `nevent`.
    #[error("unsupported identifier type: {0}")]
    UnsupportedIdentifierType(String),

    /// No relay produced the requested event before the deadline, or the
    /// collection holds no records.
    #[error("not found: {0}")]
    NotFound(String),

    /// The mention was authored by the bot itself.
    #[error("self reply not acceptable")]
    SelfReply,

    /// The record store rejected a query.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Key material or signature could not be produced.
    #[error("signing error: {0}")]
    Signing(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<secp256k1::Error> for BotError {
    fn from(e: secp256k1::Error) -> Self {
        BotError::Signing(e.to_string())
    }
}

impl From<hex::FromHexError> for BotError {
    fn from(e: hex::FromHexError) -> Self {
        BotError::Signing(e.to_string())
    }
}

/// Result alias used throughout the bot.
pub type Result<T> = std::result::Result<T, BotError>;
