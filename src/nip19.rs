//! NIP-19 bech32 identifiers: `note`, `nevent`, `nsec` and `npub`.

use bech32::{Bech32, Hrp};

use crate::error::{BotError, Result};

const HRP_NOTE: Hrp = Hrp::parse_unchecked("note");
const HRP_NEVENT: Hrp = Hrp::parse_unchecked("nevent");
const HRP_NPUB: Hrp = Hrp::parse_unchecked("npub");

/// URI scheme marker that may precede an identifier (NIP-21).
pub const URI_PREFIX: &str = "nostr:";

/// TLV entry types used by `nevent`.
const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;

/// Identifier flavours the bot can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Note,
    Nevent,
}

/// A decoded event reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub kind: IdentifierKind,
    /// Hex encoded 32-byte event id.
    pub event_id: String,
    /// Relays the author suggested for fetching the event.
    pub relay_hints: Vec<String>,
}

/// Decode a `note1…` or `nevent1…` string, optionally prefixed with `nostr:`.
///
/// Any other bech32 prefix fails with [`BotError::UnsupportedIdentifierType`];
/// strings that are not valid bech32 fail with [`BotError::Parse`].
pub fn decode(raw: &str) -> Result<Identifier> {
    let s = raw.trim();
    let s = s.strip_prefix(URI_PREFIX).unwrap_or(s);
    let (hrp, data) =
        bech32::decode(s).map_err(|e| BotError::Parse(format!("invalid identifier {s}: {e}")))?;
    match hrp.to_lowercase().as_str() {
        "note" => Ok(Identifier {
            kind: IdentifierKind::Note,
            event_id: hex::encode(fixed_32(&data, "note")?),
            relay_hints: vec![],
        }),
        "nevent" => decode_nevent(&data),
        other => Err(BotError::UnsupportedIdentifierType(other.to_string())),
    }
}

fn decode_nevent(data: &[u8]) -> Result<Identifier> {
    let mut event_id = None;
    let mut relay_hints = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let [t, len, tail @ ..] = rest else {
            return Err(BotError::Parse("truncated nevent".into()));
        };
        let len = *len as usize;
        if tail.len() < len {
            return Err(BotError::Parse("truncated nevent".into()));
        }
        let (value, next) = tail.split_at(len);
        match *t {
            TLV_SPECIAL => event_id = Some(hex::encode(fixed_32(value, "nevent")?)),
            TLV_RELAY => {
                let relay = String::from_utf8(value.to_vec())
                    .map_err(|_| BotError::Parse("relay hint is not utf-8".into()))?;
                if !relay_hints.contains(&relay) {
                    relay_hints.push(relay);
                }
            }
            // author and kind entries are not needed to fetch by id
            _ => {}
        }
        rest = next;
    }
    let event_id = event_id.ok_or_else(|| BotError::Parse("nevent without event id".into()))?;
    Ok(Identifier {
        kind: IdentifierKind::Nevent,
        event_id,
        relay_hints,
    })
}

fn fixed_32(data: &[u8], what: &str) -> Result<[u8; 32]> {
    data.try_into()
        .map_err(|_| BotError::Parse(format!("{what} payload must be 32 bytes")))
}

fn hex_32(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value).map_err(|_| BotError::Parse(format!("invalid hex id {value}")))?;
    fixed_32(&bytes, "event id")
}

/// Encode a hex event id as `note1…`.
pub fn encode_note(event_id: &str) -> Result<String> {
    let id = hex_32(event_id)?;
    bech32::encode::<Bech32>(HRP_NOTE, &id).map_err(|e| BotError::Parse(e.to_string()))
}

/// Encode a hex event id plus relay hints as `nevent1…`.
pub fn encode_nevent(event_id: &str, relays: &[String]) -> Result<String> {
    let id = hex_32(event_id)?;
    let mut data = vec![TLV_SPECIAL, 32];
    data.extend_from_slice(&id);
    for relay in relays {
        let bytes = relay.as_bytes();
        let len = u8::try_from(bytes.len())
            .map_err(|_| BotError::Parse(format!("relay hint too long: {relay}")))?;
        data.push(TLV_RELAY);
        data.push(len);
        data.extend_from_slice(bytes);
    }
    bech32::encode::<Bech32>(HRP_NEVENT, &data).map_err(|e| BotError::Parse(e.to_string()))
}

/// Encode a hex public key as `npub1…`.
pub fn encode_npub(pubkey: &str) -> Result<String> {
    let pk = hex::decode(pubkey)?;
    let pk = fixed_32(&pk, "public key")?;
    bech32::encode::<Bech32>(HRP_NPUB, &pk).map_err(|e| BotError::Signing(e.to_string()))
}

/// Decode a secret key given either as `nsec1…` or as 64 hex characters.
pub fn decode_secret_key(value: &str) -> Result<[u8; 32]> {
    let value = value.trim();
    if value.starts_with("nsec1") {
        let (hrp, data) =
            bech32::decode(value).map_err(|e| BotError::Signing(format!("invalid nsec: {e}")))?;
        if hrp.to_lowercase() != "nsec" {
            return Err(BotError::Signing("invalid nsec".into()));
        }
        return data
            .try_into()
            .map_err(|_| BotError::Signing("nsec payload must be 32 bytes".into()));
    }
    let bytes = hex::decode(value)?;
    bytes
        .try_into()
        .map_err(|_| BotError::Signing("secret key must be 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

    #[test]
    fn note_round_trip() {
        let note = encode_note(ID).unwrap();
        assert!(note.starts_with("note1"));
        let decoded = decode(&note).unwrap();
        assert_eq!(decoded.kind, IdentifierKind::Note);
        assert_eq!(decoded.event_id, ID);
        assert!(decoded.relay_hints.is_empty());
        assert_eq!(encode_note(&decoded.event_id).unwrap(), note);
    }

    #[test]
    fn strips_uri_prefix() {
        let note = encode_note(ID).unwrap();
        let decoded = decode(&format!("nostr:{note}")).unwrap();
        assert_eq!(decoded.event_id, ID);
    }

    #[test]
    fn nevent_carries_relays() {
        let relays = vec!["wss://a.example".to_string(), "wss://b.example".to_string()];
        let nevent = encode_nevent(ID, &relays).unwrap();
        assert!(nevent.starts_with("nevent1"));
        let decoded = decode(&nevent).unwrap();
        assert_eq!(decoded.kind, IdentifierKind::Nevent);
        assert_eq!(decoded.event_id, ID);
        assert_eq!(decoded.relay_hints, relays);
    }

    #[test]
    fn nevent_ignores_author_and_kind_entries() {
        let mut data = vec![TLV_SPECIAL, 32];
        data.extend_from_slice(&hex::decode(ID).unwrap());
        data.extend_from_slice(&[2, 32]);
        data.extend_from_slice(&[7u8; 32]);
        data.extend_from_slice(&[3, 4, 0, 0, 0, 1]);
        let nevent = bech32::encode::<Bech32>(HRP_NEVENT, &data).unwrap();
        let decoded = decode(&nevent).unwrap();
        assert_eq!(decoded.event_id, ID);
        assert!(decoded.relay_hints.is_empty());
    }

    #[test]
    fn nevent_without_id_is_parse_error() {
        let data = vec![TLV_RELAY, 3, b'w', b's', b's'];
        let nevent = bech32::encode::<Bech32>(HRP_NEVENT, &data).unwrap();
        assert!(matches!(decode(&nevent), Err(BotError::Parse(_))));
    }

    #[test]
    fn truncated_nevent_is_parse_error() {
        let data = vec![TLV_SPECIAL, 32, 1, 2, 3];
        let nevent = bech32::encode::<Bech32>(HRP_NEVENT, &data).unwrap();
        assert!(matches!(decode(&nevent), Err(BotError::Parse(_))));
    }

    #[test]
    fn other_prefixes_are_unsupported() {
        let npub = encode_npub(ID).unwrap();
        match decode(&npub) {
            Err(BotError::UnsupportedIdentifierType(t)) => assert_eq!(t, "npub"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(decode("hello"), Err(BotError::Parse(_))));
        let mut note = encode_note(ID).unwrap();
        let last = note.pop().unwrap();
        note.push(if last == 'q' { 'p' } else { 'q' });
        assert!(matches!(decode(&note), Err(BotError::Parse(_))));
    }

    #[test]
    fn npub_matches_reference_vector() {
        assert_eq!(
            encode_npub(ID).unwrap(),
            "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg"
        );
    }

    #[test]
    fn secret_key_from_nsec_or_hex() {
        let expected = "67dea2ed018072d675f5415ecfaed7d2597555e202d85b3d65ea4e58d2d92ffa";
        let from_nsec = decode_secret_key(
            "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5",
        )
        .unwrap();
        assert_eq!(hex::encode(from_nsec), expected);
        assert_eq!(hex::encode(decode_secret_key(expected).unwrap()), expected);
        assert!(decode_secret_key("abcd").is_err());
    }
}
