//! Command handling: from a mention to a signed reply.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::{
    command::{self, Command, NAME_SUFFIX},
    error::{BotError, Result},
    event::{Event, Tag},
    images, nip19,
    relay::RelayFetcher,
    reply::ReplyBuilder,
    storage::{NewImage, RecordStore},
};

/// Reply content for a successful `add` or `delete`.
pub const OK_REPLY: &str = "OK";
/// Reply content for an unrecognized verb ("I don't understand").
pub const UNKNOWN_REPLY: &str = "わかりません";

/// Runs commands against the record store and relays.
#[derive(Clone)]
pub struct Bot {
    store: Arc<dyn RecordStore>,
    fetcher: RelayFetcher,
    replies: ReplyBuilder,
    public_url: Url,
}

impl Bot {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: RelayFetcher,
        replies: ReplyBuilder,
        public_url: Url,
    ) -> Self {
        Self {
            store,
            fetcher,
            replies,
            public_url,
        }
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Run the command in `mention` and sign the reply.
    ///
    /// Command failures are answered with a reply carrying the error message.
    /// Only a mention from the bot itself, or a reply that cannot be signed,
    /// yields an error.
    pub async fn handle_command(&self, mention: &Event) -> Result<Event> {
        self.replies.guard(mention)?;
        let message = match self.run(mention).await {
            Ok(message) => message,
            Err(e) => {
                warn!(mention = %mention.id, "command failed: {e}");
                error_message(&e)
            }
        };
        self.replies.reply(mention, &message, vec![])
    }

    /// Reply with a random image of the collection named by the content.
    pub async fn handle_select(&self, mention: &Event) -> Result<Event> {
        self.replies.guard(mention)?;
        let name = command::collection_name(&mention.content);
        let record = self
            .store
            .pick_random(&name)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("collection {name}")))?;
        let topic = format!("{}{NAME_SUFFIX}", record.name);
        let message = format!("#{topic}\n{}", record.image);
        self.replies
            .reply(mention, &message, vec![Tag::new(["t", topic.as_str()])])
    }

    async fn run(&self, mention: &Event) -> Result<String> {
        let cmd = command::parse(mention)?;
        info!(mention = %mention.id, ?cmd, "command");
        match cmd {
            Command::List { name } => self.collection_url(&name),
            Command::Add { name, args } => {
                // sequential on purpose: a failure leaves earlier notes stored
                for arg in &args {
                    self.add_note(&name, arg).await?;
                }
                Ok(OK_REPLY.to_string())
            }
            Command::Delete { name, args } => {
                // only the first note is deleted
                if let Some(arg) = args.first() {
                    self.delete_note(&name, arg).await?;
                }
                Ok(OK_REPLY.to_string())
            }
        }
    }

    /// Fetch the referenced note and store its images unless already stored.
    async fn add_note(&self, name: &str, raw: &str) -> Result<usize> {
        let ident = nip19::decode(raw)?;
        debug!(kind = ?ident.kind, id = %ident.event_id, "resolving note");
        let note = self
            .fetcher
            .fetch(&ident.event_id, &ident.relay_hints)
            .await?;
        let note_ref = nip19::encode_note(&note.id)?;
        let urls = images::extract_urls(&note.content);
        if urls.is_empty() {
            info!(%name, note = %note_ref, "note has no images");
            return Ok(0);
        }
        if self.store.exists_for_note(name, &note_ref).await? {
            debug!(%name, note = %note_ref, "note already stored");
            return Ok(0);
        }
        let created_at = i64::try_from(note.created_at).unwrap_or(i64::MAX);
        for url in &urls {
            self.store
                .insert(&NewImage {
                    name: name.to_string(),
                    note: note_ref.clone(),
                    image: url.clone(),
                    created_at,
                })
                .await?;
        }
        info!(%name, note = %note_ref, images = urls.len(), "note stored");
        Ok(urls.len())
    }

    async fn delete_note(&self, name: &str, raw: &str) -> Result<u64> {
        let ident = nip19::decode(raw)?;
        let note_ref = nip19::encode_note(&ident.event_id)?;
        let removed = self.store.delete(name, &note_ref).await?;
        info!(%name, note = %note_ref, removed, "note deleted");
        Ok(removed)
    }

    /// Page listing the collection, e.g. `https://bot.example/cat`.
    fn collection_url(&self, name: &str) -> Result<String> {
        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| BotError::Parse(format!("cannot build page url for {name}")))?
            .pop_if_empty()
            .push(name);
        Ok(url.to_string())
    }
}

/// Text sent back to the requester when a command fails.
fn error_message(e: &BotError) -> String {
    match e {
        BotError::UnknownVerb(_) => UNKNOWN_REPLY.to_string(),
        BotError::Store(_) => "store error".to_string(),
        other => other.to_string(),
    }
}
