//! # Blocks and Chain Integrity
//!
//! A block is one immutable entry in the ledger: either a settled match
//! ([`GameBlock`]) or an encrypted message ([`MessageBlock`]).
//!
//! ## Hashing
//!
//! ```text
//! hash = hex(SHA-256(canonical_json(block without "hash")))
//! ```
//!
//! Canonical JSON is the compact `serde_json` encoding of a `Value` whose
//! objects keep their keys sorted, so any node recomputes the same digest
//! from the same fields.
//!
//! ## Linking
//!
//! ```text
//! [0] prev_hash = ""          hash = H0
//! [1] prev_hash = H0          hash = H1
//! [2] prev_hash = H1          hash = H2
//! ```
//!
//! ## Foreign Blocks
//!
//! Peers may carry blocks this ledger has no type for, or known blocks with
//! extra fields. Those parse as [`Block::Other`] and are stored verbatim, so
//! every chain that verifies as raw JSON also verifies once typed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A settled match, with or without a wager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameBlock {
    /// Position in the chain.
    pub index: u64,
    /// Match identifier (the request id for settled contracts).
    pub game_id: String,
    /// Every participant.
    pub players: Vec<String>,
    /// The declared winner.
    pub winner: String,
    /// Stake per player, 0 for unwagered matches.
    pub bet: i64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Hash of the preceding block, empty for genesis.
    pub prev_hash: String,
    /// Hash of every other field.
    pub hash: String,
}

/// Type tag carried by message blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTag {
    /// The only tag.
    Message,
}

/// An encrypted peer message.
///
/// The payload is encrypted once under a random symmetric key; that key is
/// wrapped twice, for the recipient and for the moderator, so either can
/// read the message without the other's private key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageBlock {
    /// Position in the chain. Peers may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub tag: MessageTag,
    /// Sending user id.
    pub sender: String,
    /// Receiving user id.
    pub recipient: String,
    /// Base64 `nonce || AES-256-GCM(payload)`.
    pub cipher: String,
    /// Base64 symmetric key wrapped for the recipient.
    pub key_user: String,
    /// Base64 symmetric key wrapped for the moderator.
    pub key_admin: String,
    /// Hash of the preceding block, empty for genesis.
    pub prev_hash: String,
    /// Hash of every other field.
    pub hash: String,
}

/// Any block in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Block {
    /// Encrypted message. Tried first: only it carries `type`.
    Message(MessageBlock),
    /// Match result.
    Game(GameBlock),
    /// Any other object, kept field for field.
    Other(Map<String, Value>),
}

impl Block {
    /// Position in the chain, if the block records one.
    #[must_use]
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::Message(b) => b.index,
            Self::Game(b) => Some(b.index),
            Self::Other(fields) => fields.get("index").and_then(Value::as_u64),
        }
    }

    /// Stored hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        match self {
            Self::Message(b) => &b.hash,
            Self::Game(b) => &b.hash,
            Self::Other(fields) => str_field(fields, "hash"),
        }
    }

    /// Stored link to the predecessor.
    #[must_use]
    pub fn prev_hash(&self) -> &str {
        match self {
            Self::Message(b) => &b.prev_hash,
            Self::Game(b) => &b.prev_hash,
            Self::Other(fields) => str_field(fields, "prev_hash"),
        }
    }

    /// Returns the game block, if this is one.
    #[must_use]
    pub const fn as_game(&self) -> Option<&GameBlock> {
        match self {
            Self::Game(b) => Some(b),
            Self::Message(_) | Self::Other(_) => None,
        }
    }

    /// Returns the message block, if this is one.
    #[must_use]
    pub const fn as_message(&self) -> Option<&MessageBlock> {
        match self {
            Self::Message(b) => Some(b),
            Self::Game(_) | Self::Other(_) => None,
        }
    }

    /// Recomputes the hash from every field except `hash`.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        serde_json::to_value(self)
            .map(|value| hash_of(&value))
            .unwrap_or_default()
    }

    /// Fills in `hash` from the other fields.
    pub fn seal(&mut self) {
        let hash = self.compute_hash();
        match self {
            Self::Message(b) => b.hash = hash,
            Self::Game(b) => b.hash = hash,
            Self::Other(fields) => {
                fields.insert("hash".to_owned(), Value::String(hash));
            }
        }
    }

    /// True if `user_id` played in this match, or sent/received this message.
    ///
    /// Foreign blocks are matched on the same field names.
    #[must_use]
    pub fn involves(&self, user_id: &str) -> bool {
        match self {
            Self::Game(b) => b.players.iter().any(|p| p == user_id),
            Self::Message(b) => b.sender == user_id || b.recipient == user_id,
            Self::Other(fields) => {
                let player = fields
                    .get("players")
                    .and_then(Value::as_array)
                    .is_some_and(|players| players.iter().any(|p| p.as_str() == Some(user_id)));
                let party = ["sender", "recipient"]
                    .iter()
                    .any(|key| fields.get(*key).and_then(Value::as_str) == Some(user_id));
                player || party
            }
        }
    }
}

fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a str {
    fields.get(key).and_then(Value::as_str).unwrap_or_default()
}

impl From<GameBlock> for Block {
    fn from(block: GameBlock) -> Self {
        Self::Game(block)
    }
}

impl From<MessageBlock> for Block {
    fn from(block: MessageBlock) -> Self {
        Self::Message(block)
    }
}

/// SHA-256 over the canonical encoding of `value` minus its `hash` field.
///
/// Non-object values are hashed as-is.
#[must_use]
pub fn hash_of(value: &Value) -> String {
    let bytes = match value {
        Value::Object(map) => {
            let mut fields = map.clone();
            fields.remove("hash");
            serde_json::to_vec(&Value::Object(fields))
        }
        other => serde_json::to_vec(other),
    };

    // Encoding a Value cannot fail; an empty digest input still yields a
    // hash that matches nothing stored.
    let mut hasher = Sha256::new();
    hasher.update(bytes.unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// Checks every link and every hash of a typed chain.
///
/// Empty chains are valid.
#[must_use]
pub fn verify_chain(chain: &[Block]) -> bool {
    let mut running_prev = String::new();

    for block in chain {
        if block.prev_hash() != running_prev || block.hash() != block.compute_hash() {
            return false;
        }
        running_prev = block.hash().to_owned();
    }

    true
}

/// Checks an untrusted chain exactly as received.
///
/// Total over any input: non-arrays, non-objects, and blocks missing
/// `prev_hash`/`hash` are all simply invalid. Every field present in a block
/// takes part in its hash, including fields this crate does not know.
#[must_use]
pub fn verify_chain_value(chain: &Value) -> bool {
    let Some(blocks) = chain.as_array() else {
        return false;
    };

    let mut running_prev = String::new();

    for block in blocks {
        let Some(fields) = block.as_object() else {
            return false;
        };
        let (Some(prev), Some(stored)) = (
            fields.get("prev_hash").and_then(Value::as_str),
            fields.get("hash").and_then(Value::as_str),
        ) else {
            return false;
        };

        if prev != running_prev || stored != hash_of(block) {
            return false;
        }
        running_prev = stored.to_owned();
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn game(index: u64, prev_hash: &str) -> Block {
        let mut block = Block::Game(GameBlock {
            index,
            game_id: format!("g{index}"),
            players: vec!["a".into(), "b".into()],
            winner: "a".into(),
            bet: 0,
            timestamp: 1_700_000_000,
            prev_hash: prev_hash.into(),
            hash: String::new(),
        });
        block.seal();
        block
    }

    fn message(index: u64, prev_hash: &str) -> Block {
        let mut block = Block::Message(MessageBlock {
            index: Some(index),
            tag: MessageTag::Message,
            sender: "alice".into(),
            recipient: "bob".into(),
            cipher: "Y2lwaGVy".into(),
            key_user: "dXNlcg==".into(),
            key_admin: "YWRtaW4=".into(),
            prev_hash: prev_hash.into(),
            hash: String::new(),
        });
        block.seal();
        block
    }

    /// A different value of the same JSON kind.
    fn tweak(value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(format!("{s}x")),
            Value::Number(n) => json!(n.as_u64().map_or(0, |n| n + 1)),
            Value::Array(items) => {
                let mut items = items.clone();
                items.push(json!("z"));
                Value::Array(items)
            }
            _ => json!("changed"),
        }
    }

    fn chain(len: u64) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for i in 0..len {
            let prev = blocks.last().map(|b| b.hash().to_owned()).unwrap_or_default();
            blocks.push(game(i, &prev));
        }
        blocks
    }

    #[test]
    fn test_hash_ignores_hash_field() {
        let a = json!({"x": 1, "hash": "aaa"});
        let b = json!({"x": 1, "hash": "bbb"});
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(hash_of(&a).len(), 64);
    }

    #[test]
    fn test_hash_is_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_empty_chain_is_valid() {
        assert!(verify_chain(&[]));
        assert!(verify_chain_value(&json!([])));
    }

    #[test]
    fn test_sealed_chain_is_valid() {
        let blocks = chain(4);
        assert!(verify_chain(&blocks));
        assert!(verify_chain_value(&serde_json::to_value(&blocks).unwrap()));
    }

    #[test]
    fn test_tampered_field_breaks_chain() {
        let mut blocks = chain(3);
        if let Block::Game(b) = &mut blocks[1] {
            b.winner = "b".into();
        }
        assert!(!verify_chain(&blocks));
    }

    #[test]
    fn test_every_field_of_every_block_is_covered() {
        let genesis = game(0, "");
        let second = message(1, genesis.hash());
        let third = game(2, second.hash());
        let sealed = serde_json::to_value(vec![genesis, second, third]).unwrap();
        assert!(verify_chain_value(&sealed));

        let mut checked = 0;
        for position in 0..3 {
            let keys: Vec<String> = sealed[position].as_object().unwrap().keys().cloned().collect();
            for key in keys {
                let mut tampered = sealed.clone();
                tampered[position][&key] = tweak(&sealed[position][&key]);

                assert!(!verify_chain_value(&tampered), "raw: block {position} field {key}");
                let typed: Vec<Block> = serde_json::from_value(tampered).unwrap();
                assert!(!verify_chain(&typed), "typed: block {position} field {key}");
                checked += 1;
            }
        }
        // 8 game fields twice, 9 message fields
        assert_eq!(checked, 25);
    }

    #[test]
    fn test_raw_and_typed_verification_agree_on_foreign_blocks() {
        let mut unindexed = json!({
            "type": "message", "sender": "alice", "recipient": "bob",
            "cipher": "c", "key_user": "u", "key_admin": "a", "prev_hash": "",
        });
        unindexed["hash"] = Value::String(hash_of(&unindexed));

        let mut annotated = serde_json::to_value(game(1, unindexed["hash"].as_str().unwrap())).unwrap();
        annotated["season"] = json!(3);
        annotated["hash"] = Value::String(hash_of(&annotated));

        let mut unknown = json!({"kind": "note", "prev_hash": annotated["hash"].clone()});
        unknown["hash"] = Value::String(hash_of(&unknown));

        let raw = json!([unindexed, annotated, unknown]);
        assert!(verify_chain_value(&raw));

        let typed: Vec<Block> = serde_json::from_value(raw.clone()).unwrap();
        assert!(typed[0].as_message().is_some_and(|m| m.index.is_none()));
        assert!(matches!(typed[1], Block::Other(_)));
        assert!(matches!(typed[2], Block::Other(_)));
        assert!(verify_chain(&typed));
        // Stored form is the received form
        assert_eq!(serde_json::to_value(&typed).unwrap(), raw);
    }

    #[test]
    fn test_foreign_block_accessors() {
        let block: Block = serde_json::from_value(json!({
            "index": 4, "players": ["carol"], "prev_hash": "p", "hash": "h"
        }))
        .unwrap();
        assert_eq!(block.index(), Some(4));
        assert_eq!(block.prev_hash(), "p");
        assert_eq!(block.hash(), "h");
        assert!(block.involves("carol"));
        assert!(!block.involves(""));
        assert!(block.as_game().is_none());
    }

    #[test]
    fn test_broken_link_breaks_chain() {
        let mut blocks = chain(3);
        if let Block::Game(b) = &mut blocks[2] {
            b.prev_hash = "deadbeef".into();
        }
        blocks[2].seal();
        assert!(!verify_chain(&blocks));
    }

    #[test]
    fn test_malformed_values_are_invalid() {
        assert!(!verify_chain_value(&json!({"not": "a chain"})));
        assert!(!verify_chain_value(&json!([1, 2, 3])));
        assert!(!verify_chain_value(&json!([{"index": 0, "prev_hash": ""}])));
        assert!(!verify_chain_value(&json!([{"index": 0, "prev_hash": 5, "hash": "x"}])));
    }

    #[test]
    fn test_unknown_fields_take_part_in_hash() {
        let mut value = json!({"index": 0, "extra": "field", "prev_hash": ""});
        let hash = hash_of(&value);
        value["hash"] = Value::String(hash);
        assert!(verify_chain_value(&Value::Array(vec![value.clone()])));

        value["extra"] = Value::String("changed".into());
        assert!(!verify_chain_value(&Value::Array(vec![value])));
    }

    #[test]
    fn test_untagged_block_round_trip() {
        let message = Block::Message(MessageBlock {
            index: Some(0),
            tag: MessageTag::Message,
            sender: "alice".into(),
            recipient: "bob".into(),
            cipher: "c".into(),
            key_user: "u".into(),
            key_admin: "a".into(),
            prev_hash: String::new(),
            hash: String::new(),
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "message");
        let back: Block = serde_json::from_value(value).unwrap();
        assert!(back.as_message().is_some());

        let game_value = serde_json::to_value(game(0, "")).unwrap();
        let back: Block = serde_json::from_value(game_value).unwrap();
        assert!(back.as_game().is_some());
    }
}
