//! Nostr event model, hashing and Schnorr signing.

use secp256k1::{schnorr::Signature, All, Keypair, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BotError, Result};

/// Kind number of a public channel message (NIP-28).
pub const KIND_CHANNEL_MESSAGE: u32 = 42;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// Tags appear as small arrays where the first element denotes the type and the
/// following elements hold data. The bot only interprets a few of them:
///
/// - `e` – links to another event ID, optionally followed by a relay hint
/// - `p` – references another author's public key
/// - `t` – free-form topic or hashtag
///
/// Each tag is kept verbatim so unknown tags survive propagation onto replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Build a tag from its fields, e.g. `Tag::new(["t", "cat画像"])`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tag(fields.into_iter().map(Into::into).collect())
    }

    /// The tag type, i.e. its first element.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The first data element following the tag type.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }
}

/// Signed Nostr event, used both for incoming mentions and outgoing replies.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "b0b0...",
///   "kind": 1,
///   "created_at": 1700000000,
///   "tags": [["e", "aa11"], ["p", "b0b0..."]],
///   "content": "cat画像 add note1...",
///   "sig": "deadbeef"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1` or `42`.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Ordered tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    #[serde(default)]
    pub sig: String,
}

impl Event {
    /// Tags of the given type, in order.
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |t| t.name() == Some(name))
    }
}

/// Compute the NIP-01 event hash from its fields.
pub fn event_hash(ev: &Event) -> Result<[u8; 32]> {
    let arr = serde_json::json!([0, ev.pubkey, ev.created_at, ev.kind, ev.tags, ev.content]);
    let data = serde_json::to_vec(&arr)?;
    let hash = Sha256::digest(&data);
    Ok(hash.into())
}

/// Verify an event's ID and Schnorr signature.
pub fn verify_event(ev: &Event) -> Result<()> {
    let hash = event_hash(ev)?;
    if hex::encode(hash) != ev.id {
        return Err(BotError::Signing("id mismatch".into()));
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(hash);
    secp.verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}

/// The bot's signing identity.
#[derive(Clone)]
pub struct Keys {
    secp: Secp256k1<All>,
    keypair: Keypair,
    public_key: String,
}

impl Keys {
    /// Build keys from a raw 32-byte secret key.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, secret)?;
        let public_key = hex::encode(keypair.x_only_public_key().0.serialize());
        Ok(Self {
            secp,
            keypair,
            public_key,
        })
    }

    /// Hex encoded x-only public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Set `pubkey`, `id` and `sig` on `ev` from its remaining fields.
    pub fn sign(&self, mut ev: Event) -> Result<Event> {
        ev.pubkey = self.public_key.clone();
        let hash = event_hash(&ev)?;
        ev.id = hex::encode(hash);
        let msg = Message::from_digest(hash);
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        ev.sig = hex::encode(sig.serialize());
        Ok(ev)
    }
}
