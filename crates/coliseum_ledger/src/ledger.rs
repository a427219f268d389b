//! # The Ledger
//!
//! Append-only match log, wager balances, escrow contracts and encrypted
//! messages, all file-backed.
//!
//! ## Wager Settlement
//!
//! ```text
//! players = [a, b, c], bet = 5, winner = a
//!
//!   every player:  -5          a: -5  b: -5  c: -5
//!   winner:        +5 * 3      a: +15
//!   net:                       a: +10 b: -5  c: -5
//! ```
//!
//! ## Merging
//!
//! A remote chain replaces the local one only if it verifies AND is strictly
//! longer. Anything else is ignored without error.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use coliseum_shared::{DataDir, JsonFile};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::{verify_chain, verify_chain_value, Block, GameBlock, MessageBlock, MessageTag};
use crate::crypto::{self, KeyPair, KEY_LEN};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::IdentityDirectory;

/// Wager balances keyed by user id.
pub type Balances = BTreeMap<String, i64>;

/// Pending escrow contracts keyed by request id.
pub type Contracts = BTreeMap<String, Contract>;

/// A wager awaiting a declared winner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Participants.
    pub players: Vec<String>,
    /// Stake per player.
    pub bet: i64,
}

/// File-backed ledger.
///
/// Every mutating call is one read-modify-write cycle per table it touches.
pub struct Ledger {
    chain: JsonFile<Vec<Block>>,
    balances: JsonFile<Balances>,
    contracts: JsonFile<Contracts>,
    directory: Box<dyn IdentityDirectory + Send>,
}

impl Ledger {
    /// Opens the ledger tables inside `data`.
    #[must_use]
    pub fn open(data: &DataDir, directory: impl IdentityDirectory + Send + 'static) -> Self {
        Self {
            chain: JsonFile::new(data.chain()),
            balances: JsonFile::new(data.balances()),
            contracts: JsonFile::new(data.contracts()),
            directory: Box::new(directory),
        }
    }

    /// The whole chain.
    #[must_use]
    pub fn chain(&self) -> Vec<Block> {
        self.chain.load()
    }

    /// Every balance.
    #[must_use]
    pub fn balances(&self) -> Balances {
        self.balances.load()
    }

    /// Balance of `user_id`, 0 when never settled.
    #[must_use]
    pub fn balance_of(&self, user_id: &str) -> i64 {
        self.balances.load().get(user_id).copied().unwrap_or(0)
    }

    /// Every pending contract.
    #[must_use]
    pub fn contracts(&self) -> Contracts {
        self.contracts.load()
    }

    /// Records a match result and settles its wager.
    ///
    /// `game_id` defaults to a random hex id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownAccount`] if any player is not in the
    /// identity directory, or a storage error.
    pub fn add_game(
        &self,
        players: &[&str],
        winner: &str,
        bet: i64,
        game_id: Option<&str>,
    ) -> LedgerResult<GameBlock> {
        if let Some(unknown) = players.iter().find(|p| !self.directory.contains(p)) {
            return Err(LedgerError::UnknownAccount((*unknown).to_owned()));
        }

        let game_id = game_id.map_or_else(|| uuid::Uuid::new_v4().simple().to_string(), str::to_owned);

        let mut chain = self.chain.load();
        let mut game = GameBlock {
            index: chain.len() as u64,
            game_id,
            players: players.iter().map(|p| (*p).to_owned()).collect(),
            winner: winner.to_owned(),
            bet,
            timestamp: unix_now(),
            prev_hash: tail_hash(&chain),
            hash: String::new(),
        };
        game.hash = Block::Game(game.clone()).compute_hash();
        chain.push(Block::Game(game.clone()));
        self.chain.save(&chain)?;

        if bet != 0 {
            self.settle(players, winner, bet)?;
        }

        tracing::info!(index = game.index, winner, bet, "game recorded");
        Ok(game)
    }

    fn settle(&self, players: &[&str], winner: &str, bet: i64) -> LedgerResult<()> {
        let pot = bet.saturating_mul(i64::try_from(players.len()).unwrap_or(i64::MAX));

        self.balances.update(|balances| {
            for player in players {
                let entry = balances.entry((*player).to_owned()).or_insert(0);
                *entry = entry.saturating_sub(bet);
            }
            let entry = balances.entry(winner.to_owned()).or_insert(0);
            *entry = entry.saturating_add(pot);
        })?;
        Ok(())
    }

    /// Blocks matching every given filter.
    ///
    /// `game_id` only matches game blocks. `user_id` matches games the user
    /// played and messages the user sent or received. No filters returns the
    /// whole chain.
    #[must_use]
    pub fn search(&self, game_id: Option<&str>, user_id: Option<&str>) -> Vec<Block> {
        self.chain
            .load()
            .into_iter()
            .filter(|block| {
                game_id.map_or(true, |id| block.as_game().is_some_and(|g| g.game_id == id))
            })
            .filter(|block| user_id.map_or(true, |user| block.involves(user)))
            .collect()
    }

    /// Stores a pending escrow. Overwrites an existing request id.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn add_contract(&self, request_id: &str, players: &[&str], bet: i64) -> LedgerResult<()> {
        self.contracts.update(|contracts| {
            contracts.insert(
                request_id.to_owned(),
                Contract {
                    players: players.iter().map(|p| (*p).to_owned()).collect(),
                    bet,
                },
            );
        })?;
        tracing::debug!(request_id, bet, "contract opened");
        Ok(())
    }

    /// Settles a pending escrow as a game block with `game_id = request_id`.
    ///
    /// Returns `None` if no such contract exists. The contract is removed
    /// only once its block has been recorded, so a failed settlement leaves
    /// the escrow pending.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_game`].
    pub fn fulfill_contract(&self, request_id: &str, winner: &str) -> LedgerResult<Option<GameBlock>> {
        let mut contracts = self.contracts.load();
        let Some(contract) = contracts.get(request_id).cloned() else {
            return Ok(None);
        };

        let players: Vec<&str> = contract.players.iter().map(String::as_str).collect();
        let block = self.add_game(&players, winner, contract.bet, Some(request_id))?;

        contracts.remove(request_id);
        self.contracts.save(&contracts)?;
        Ok(Some(block))
    }

    /// Replaces the local chain with `remote` iff it verifies and is
    /// strictly longer. Returns whether the chain was replaced.
    ///
    /// # Errors
    ///
    /// Only storage failures; rejected chains are not errors.
    pub fn merge_chain(&self, remote: &[Block]) -> LedgerResult<bool> {
        let local_len = self.chain.load().len();

        if remote.len() <= local_len || !verify_chain(remote) {
            tracing::debug!(remote = remote.len(), local = local_len, "remote chain ignored");
            return Ok(false);
        }

        self.chain.save(&remote.to_vec())?;
        tracing::info!(from = local_len, to = remote.len(), "adopted longer remote chain");
        Ok(true)
    }

    /// [`Self::merge_chain`] for a chain exactly as received from a peer.
    ///
    /// Adopts `remote` iff it verifies as raw JSON and is strictly longer.
    /// Blocks this ledger has no type for are stored as [`Block::Other`],
    /// field for field.
    ///
    /// # Errors
    ///
    /// Only storage failures.
    pub fn merge_chain_value(&self, remote: &Value) -> LedgerResult<bool> {
        if !verify_chain_value(remote) {
            return Ok(false);
        }
        // Every element of a verified chain is an object, and any object
        // parses as at least `Block::Other`.
        match serde_json::from_value::<Vec<Block>>(remote.clone()) {
            Ok(blocks) => self.merge_chain(&blocks),
            Err(e) => {
                tracing::warn!(error = %e, "verified remote chain failed to parse");
                Ok(false)
            }
        }
    }

    /// Encrypts `plaintext` for `recipient` and the moderator and appends it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownRecipient`] if the recipient is not in
    /// the identity directory, [`LedgerError::InvalidKey`] if either public
    /// key is malformed, or a storage error.
    pub fn send_message(
        &self,
        sender: &str,
        recipient: &str,
        plaintext: &str,
        admin_public_key: &str,
    ) -> LedgerResult<MessageBlock> {
        let account = self
            .directory
            .account(recipient)
            .ok_or_else(|| LedgerError::UnknownRecipient(recipient.to_owned()))?;

        let recipient_key = crypto::parse_public_key(&account.public_key)?;
        let admin_key = crypto::parse_public_key(admin_public_key)?;

        let key = crypto::random_key();
        let cipher = crypto::encrypt(&key, plaintext.as_bytes())?;
        let key_user = crypto::wrap_key(&recipient_key, &key)?;
        let key_admin = crypto::wrap_key(&admin_key, &key)?;

        let mut chain = self.chain.load();
        let mut message = MessageBlock {
            index: Some(chain.len() as u64),
            tag: MessageTag::Message,
            sender: sender.to_owned(),
            recipient: recipient.to_owned(),
            cipher: BASE64.encode(cipher),
            key_user: BASE64.encode(key_user),
            key_admin: BASE64.encode(key_admin),
            prev_hash: tail_hash(&chain),
            hash: String::new(),
        };
        message.hash = Block::Message(message.clone()).compute_hash();
        chain.push(Block::Message(message.clone()));
        self.chain.save(&chain)?;

        tracing::debug!(sender, recipient, index = ?message.index, "message recorded");
        Ok(message)
    }

    /// Decrypts a message with the recipient's key.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotAMessageBlock`] for game blocks and
    /// [`LedgerError::Decryption`] if `recipient` cannot open the envelope.
    pub fn decrypt_message(block: &Block, recipient: &KeyPair) -> LedgerResult<String> {
        let message = block.as_message().ok_or(LedgerError::NotAMessageBlock)?;
        open_envelope(&message.key_user, &message.cipher, recipient)
    }

    /// Decrypts a message with the moderator's key.
    ///
    /// # Errors
    ///
    /// Same as [`Self::decrypt_message`].
    pub fn admin_decrypt(block: &Block, admin: &KeyPair) -> LedgerResult<String> {
        let message = block.as_message().ok_or(LedgerError::NotAMessageBlock)?;
        open_envelope(&message.key_admin, &message.cipher, admin)
    }
}

fn open_envelope(wrapped_b64: &str, cipher_b64: &str, reader: &KeyPair) -> LedgerResult<String> {
    let wrapped = BASE64
        .decode(wrapped_b64)
        .map_err(|e| LedgerError::Decryption(e.to_string()))?;
    let cipher = BASE64
        .decode(cipher_b64)
        .map_err(|e| LedgerError::Decryption(e.to_string()))?;

    let key: [u8; KEY_LEN] = crypto::unwrap_key(reader, &wrapped)?;
    let plaintext = crypto::decrypt(&key, &cipher)?;

    String::from_utf8(plaintext).map_err(|e| LedgerError::Decryption(e.to_string()))
}

fn tail_hash(chain: &[Block]) -> String {
    chain.last().map(|b| b.hash().to_owned()).unwrap_or_default()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Account, MemoryIdentityDirectory};

    fn ledger_with(users: &[&str]) -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let mut directory = MemoryIdentityDirectory::new();
        for user in users {
            directory.insert(*user, Account::new("user", KeyPair::generate().public_key_hex()));
        }
        let ledger = Ledger::open(&DataDir::new(dir.path()), directory);
        (dir, ledger)
    }

    #[test]
    fn test_genesis_links_to_empty_hash() {
        let (_dir, ledger) = ledger_with(&["a", "b"]);
        let block = ledger.add_game(&["a", "b"], "a", 0, Some("g1")).unwrap();

        assert_eq!(block.index, 0);
        assert_eq!(block.prev_hash, "");
        assert_eq!(block.game_id, "g1");
        assert!(ledger.balances().is_empty());
    }

    #[test]
    fn test_blocks_link() {
        let (_dir, ledger) = ledger_with(&["a", "b"]);
        let first = ledger.add_game(&["a", "b"], "a", 0, None).unwrap();
        let second = ledger.add_game(&["a", "b"], "b", 0, None).unwrap();

        assert_eq!(second.index, 1);
        assert_eq!(second.prev_hash, first.hash);
        assert_ne!(first.game_id, second.game_id);
        assert!(verify_chain(&ledger.chain()));
    }

    #[test]
    fn test_wager_settlement() {
        let (_dir, ledger) = ledger_with(&["a", "b", "c"]);
        ledger.add_game(&["a", "b", "c"], "a", 5, None).unwrap();

        assert_eq!(ledger.balance_of("a"), 10);
        assert_eq!(ledger.balance_of("b"), -5);
        assert_eq!(ledger.balance_of("c"), -5);
    }

    #[test]
    fn test_unknown_player_rejected() {
        let (_dir, ledger) = ledger_with(&["a"]);
        let err = ledger.add_game(&["a", "ghost"], "a", 1, None).unwrap_err();

        assert!(matches!(err, LedgerError::UnknownAccount(ref id) if id == "ghost"));
        assert!(ledger.chain().is_empty());
        assert!(ledger.balances().is_empty());
    }

    #[test]
    fn test_search_filters() {
        let (_dir, ledger) = ledger_with(&["a", "b", "c"]);
        ledger.add_game(&["a", "b"], "a", 0, Some("g1")).unwrap();
        ledger.add_game(&["b", "c"], "c", 0, Some("g2")).unwrap();

        assert_eq!(ledger.search(None, None).len(), 2);
        assert_eq!(ledger.search(Some("g1"), None).len(), 1);
        assert_eq!(ledger.search(None, Some("b")).len(), 2);
        assert_eq!(ledger.search(None, Some("a")).len(), 1);
        assert!(ledger.search(Some("g1"), Some("c")).is_empty());
        assert!(ledger.search(Some("nope"), None).is_empty());
    }

    #[test]
    fn test_missing_contract_is_none() {
        let (_dir, ledger) = ledger_with(&["a"]);
        assert!(ledger.fulfill_contract("nope", "a").unwrap().is_none());
    }

    #[test]
    fn test_failed_settlement_keeps_contract() {
        let (_dir, ledger) = ledger_with(&["a"]);
        ledger.add_contract("r1", &["a", "ghost"], 3).unwrap();

        assert!(ledger.fulfill_contract("r1", "a").is_err());
        assert!(ledger.contracts().contains_key("r1"));
    }

    #[test]
    fn test_merge_requires_longer_valid_chain() {
        let (_d1, local) = ledger_with(&["a", "b"]);
        let (_d2, remote) = ledger_with(&["a", "b"]);

        local.add_game(&["a", "b"], "a", 0, None).unwrap();
        remote.add_game(&["a", "b"], "b", 0, None).unwrap();

        // Same length: ignored
        assert!(!local.merge_chain(&remote.chain()).unwrap());

        remote.add_game(&["a", "b"], "b", 0, None).unwrap();
        let mut tampered = remote.chain();
        if let Block::Game(g) = &mut tampered[0] {
            g.bet = 1_000;
        }
        assert!(!local.merge_chain(&tampered).unwrap());

        assert!(local.merge_chain(&remote.chain()).unwrap());
        assert_eq!(local.chain(), remote.chain());

        // Idempotent
        assert!(!local.merge_chain(&remote.chain()).unwrap());
    }

    #[test]
    fn test_merge_chain_value_rejects_garbage() {
        let (_dir, ledger) = ledger_with(&["a"]);
        assert!(!ledger.merge_chain_value(&serde_json::json!("chain")).unwrap());
        assert!(!ledger.merge_chain_value(&serde_json::json!([{"hash": 1}])).unwrap());
    }

    #[test]
    fn test_merge_chain_value_adopts_any_longer_verified_chain() {
        let (_dir, ledger) = ledger_with(&["a", "b"]);
        ledger.add_game(&["a", "b"], "a", 0, None).unwrap();

        // Message without an index, then a block with a field of its own
        let mut first = serde_json::json!({
            "type": "message", "sender": "a", "recipient": "b",
            "cipher": "c", "key_user": "u", "key_admin": "k", "prev_hash": "",
        });
        first["hash"] = serde_json::Value::String(crate::block::hash_of(&first));
        let mut second = serde_json::json!({
            "index": 1, "game_id": "g", "players": ["a", "b"], "winner": "b",
            "bet": 0, "timestamp": 1, "referee": "z", "prev_hash": first["hash"].clone(),
        });
        second["hash"] = serde_json::Value::String(crate::block::hash_of(&second));
        let remote = serde_json::json!([first, second]);

        assert!(verify_chain_value(&remote));
        assert!(ledger.merge_chain_value(&remote).unwrap());
        assert_eq!(serde_json::to_value(ledger.chain()).unwrap(), remote);
        assert!(verify_chain(&ledger.chain()));
        assert_eq!(ledger.search(None, Some("b")).len(), 2);
    }

    #[test]
    fn test_decrypt_rejects_game_block() {
        let (_dir, ledger) = ledger_with(&["a", "b"]);
        let game = ledger.add_game(&["a", "b"], "a", 0, None).unwrap();
        let err = Ledger::decrypt_message(&Block::Game(game), &KeyPair::generate()).unwrap_err();
        assert!(matches!(err, LedgerError::NotAMessageBlock));
    }
}
