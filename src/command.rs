//! Parsing of mention content into bot commands.
//!
//! Commands look like `<name>画像 <verb> [identifier...]`, optionally preceded
//! by the `nostr:npub…` or `@name` token clients insert for the mention itself.

use crate::{
    error::{BotError, Result},
    event::Event,
    nip19,
};

/// Suffix users append to a collection name ("image").
pub const NAME_SUFFIX: &str = "画像";

/// A parsed command addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reply with the web page of the collection.
    List { name: String },
    /// Fetch the referenced notes and store their image URLs.
    Add { name: String, args: Vec<String> },
    /// Remove the records stored from the referenced note.
    Delete { name: String, args: Vec<String> },
}

/// Strip the `画像` suffix and surrounding whitespace from a collection token.
pub fn collection_name(token: &str) -> String {
    let token = token.trim();
    token.strip_suffix(NAME_SUFFIX).unwrap_or(token).trim().to_string()
}

/// Tokenize the mention's content into a [`Command`].
///
/// `add` without explicit identifiers takes them from the mention's own `e`
/// tags, so replying "add" to a note is enough.
pub fn parse(mention: &Event) -> Result<Command> {
    let mut tokens: Vec<&str> = mention.content.split_whitespace().collect();
    if tokens.first().is_some_and(|t| t.starts_with(nip19::URI_PREFIX)) {
        tokens.remove(0);
    }
    if tokens.first().is_some_and(|t| t.starts_with('@')) {
        tokens.remove(0);
    }
    let [name, verb, rest @ ..] = tokens.as_slice() else {
        return Err(BotError::Parse("expected `<name> <command>`".into()));
    };
    let name = collection_name(name);
    if name.is_empty() {
        return Err(BotError::Parse("empty collection name".into()));
    }
    // `.` and `..` cannot be used as a path segment of the collection page
    if name.chars().all(|c| c == '.') {
        return Err(BotError::Parse(format!("invalid collection name {name}")));
    }
    let args: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
    match *verb {
        "list" => Ok(Command::List { name }),
        "add" => {
            let args = if args.is_empty() {
                referenced_notes(mention)?
            } else {
                args
            };
            if args.is_empty() {
                return Err(BotError::Parse("add needs at least one note".into()));
            }
            Ok(Command::Add { name, args })
        }
        "delete" => {
            if args.is_empty() {
                return Err(BotError::Parse("delete needs a note".into()));
            }
            Ok(Command::Delete { name, args })
        }
        other => Err(BotError::UnknownVerb(other.to_string())),
    }
}

/// Encode every `e` tag of the mention as an identifier string.
fn referenced_notes(mention: &Event) -> Result<Vec<String>> {
    mention
        .tags_named("e")
        .filter_map(|tag| {
            let id = tag.value()?;
            let relay = tag.0.get(2).filter(|r| !r.is_empty());
            Some(match relay {
                Some(relay) => nip19::encode_nevent(id, std::slice::from_ref(relay)),
                None => nip19::encode_note(id),
            })
        })
        .collect()
}
