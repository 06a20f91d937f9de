//! Construction of signed replies threaded to a mention.

use crate::{
    error::{BotError, Result},
    event::{Event, Keys, Tag, KIND_CHANNEL_MESSAGE},
};

/// Signs every outgoing message with the bot's key.
#[derive(Clone)]
pub struct ReplyBuilder {
    keys: Keys,
}

impl ReplyBuilder {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    /// Hex public key replies are signed with.
    pub fn public_key(&self) -> &str {
        self.keys.public_key()
    }

    /// Reject mentions authored by the bot itself.
    pub fn guard(&self, mention: &Event) -> Result<()> {
        if mention.pubkey.eq_ignore_ascii_case(self.keys.public_key()) {
            return Err(BotError::SelfReply);
        }
        Ok(())
    }

    /// Build a reply to `mention` carrying `message` and the `extra` tags.
    ///
    /// The reply references the mention with `e` and `p` tags; channel
    /// messages additionally get all of the mention's `e` tags so the channel
    /// root stays attached. `created_at` is one second after the mention.
    pub fn reply(&self, mention: &Event, message: &str, extra: Vec<Tag>) -> Result<Event> {
        self.guard(mention)?;
        let created_at = mention
            .created_at
            .checked_add(1)
            .ok_or_else(|| BotError::Parse("created_at out of range".into()))?;
        let mut tags = vec![
            Tag::new(["e", mention.id.as_str()]),
            Tag::new(["p", mention.pubkey.as_str()]),
        ];
        if mention.kind == KIND_CHANNEL_MESSAGE {
            tags.extend(mention.tags_named("e").cloned());
        }
        tags.extend(extra);
        self.keys.sign(Event {
            id: String::new(),
            pubkey: String::new(),
            kind: mention.kind,
            created_at,
            tags,
            content: message.to_string(),
            sig: String::new(),
        })
    }
}
