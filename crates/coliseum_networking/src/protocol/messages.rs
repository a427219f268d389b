//! # Messages
//!
//! A decoded datagram is either one of the mesh's own control messages or a
//! free-form application payload:
//!
//! | `type`                              | Meaning                                  |
//! |-------------------------------------|------------------------------------------|
//! | `discover` / `host`                 | broadcast probe and its reply            |
//! | `announce`                          | "I exist", with the sender's views       |
//! | `register` / `client_join`          | a game host / client checks in           |
//! | `find` / `games`                    | ask a router for game hosts, and reply   |
//! | `list_clients` / `clients`          | ask a router for clients, and reply      |
//! | `games_update` / `clients_update`   | router-to-router gossip                  |
//! | `ping` / `pong`                     | latency probe                            |
//! | `ack`                               | reliable delivery receipt                |
//! | `chain_request` / `chain_update`    | ledger gossip                            |
//! | anything else, or no `type`         | application payload                      |
//!
//! Transport fields (`reliable`, `seq`, `sig`) ride alongside the message in
//! the same JSON object and are split off into a [`Frame`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::signing::SIG_KEY;
use crate::registry::PeerAddress;

/// Key flagging a message that wants an ack.
pub const RELIABLE_KEY: &str = "reliable";

/// Key carrying the reliable-delivery sequence number.
pub const SEQ_KEY: &str = "seq";

/// Key carrying the message kind.
pub const TYPE_KEY: &str = "type";

/// Mesh protocol messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Broadcast probe for hosts.
    Discover,
    /// Reply to [`Self::Discover`].
    Host,
    /// Presence announcement carrying the sender's views.
    Announce {
        /// Game hosts known to the sender.
        #[serde(default)]
        games: Vec<PeerAddress>,
        /// Live clients known to the sender.
        #[serde(default)]
        clients: Vec<PeerAddress>,
    },
    /// A game host registers with a router.
    Register,
    /// A client registers with a router.
    ClientJoin,
    /// Asks a router for game hosts.
    Find,
    /// Game hosts known to the sender.
    Games {
        /// Host addresses.
        #[serde(default)]
        games: Vec<PeerAddress>,
    },
    /// Asks a router for live clients.
    ListClients,
    /// Live clients known to the sender.
    Clients {
        /// Client addresses.
        #[serde(default)]
        clients: Vec<PeerAddress>,
    },
    /// Router-to-router game list.
    GamesUpdate {
        /// Host addresses.
        #[serde(default)]
        games: Vec<PeerAddress>,
    },
    /// Router-to-router client list.
    ClientsUpdate {
        /// Client addresses.
        #[serde(default)]
        clients: Vec<PeerAddress>,
    },
    /// Latency probe.
    Ping {
        /// Echoed back in the pong.
        #[serde(default)]
        nonce: u64,
    },
    /// Reply to [`Self::Ping`].
    Pong {
        /// The probe's nonce.
        #[serde(default)]
        nonce: u64,
    },
    /// Receipt for a reliable message.
    Ack {
        /// Sequence number being acknowledged.
        seq: u64,
    },
    /// Asks for the sender's ledger chain.
    ChainRequest,
    /// A full ledger chain, exactly as stored by the sender.
    ChainUpdate {
        /// Array of block objects.
        chain: Value,
    },
}

impl ControlMessage {
    /// Every `type` tag owned by the mesh. Objects with one of these tags
    /// that fail to parse are dropped rather than delivered as payloads.
    pub const TAGS: &'static [&'static str] = &[
        "discover",
        "host",
        "announce",
        "register",
        "client_join",
        "find",
        "games",
        "list_clients",
        "clients",
        "games_update",
        "clients_update",
        "ping",
        "pong",
        "ack",
        "chain_request",
        "chain_update",
    ];
}

/// Anything a node can send or receive.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A mesh protocol message.
    Control(ControlMessage),
    /// An application object, delivered to the caller.
    Payload(Map<String, Value>),
}

impl From<ControlMessage> for Message {
    fn from(message: ControlMessage) -> Self {
        Self::Control(message)
    }
}

impl From<Map<String, Value>> for Message {
    fn from(payload: Map<String, Value>) -> Self {
        Self::Payload(payload)
    }
}

impl Message {
    /// The JSON object for this message, without transport fields.
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        match self {
            Self::Payload(map) => map.clone(),
            Self::Control(control) => match serde_json::to_value(control) {
                Ok(Value::Object(map)) => map,
                // Internally tagged enums always serialize to objects
                _ => Map::new(),
            },
        }
    }
}

/// A message plus its transport fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// The message.
    pub message: Message,
    /// Sender wants an ack.
    pub reliable: bool,
    /// Reliable-delivery sequence number.
    pub seq: Option<u64>,
}

impl Frame {
    /// Unreliable frame.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self {
            message,
            reliable: false,
            seq: None,
        }
    }

    /// Reliable frame with sequence number `seq`.
    #[must_use]
    pub const fn reliable(message: Message, seq: u64) -> Self {
        Self {
            message,
            reliable: true,
            seq: Some(seq),
        }
    }

    /// Flattens into the JSON object sent on the wire (unsigned).
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        let mut map = self.message.to_object();
        if self.reliable {
            map.insert(RELIABLE_KEY.to_owned(), Value::Bool(true));
            if let Some(seq) = self.seq {
                map.insert(SEQ_KEY.to_owned(), Value::from(seq));
            }
        }
        map
    }

    /// Splits a received object into message and transport fields.
    ///
    /// `sig` is always removed. `reliable` is a transport field only when it
    /// is a bool; any other value stays in the payload. `seq` belongs to the
    /// transport only when `reliable` is true; otherwise it stays in the payload (delta streams
    /// carry their own `seq`). Returns `None` for non-objects and for
    /// control tags whose fields do not parse.
    #[must_use]
    pub fn from_object(mut map: Map<String, Value>) -> Option<Self> {
        map.remove(SIG_KEY);

        let reliable = match map.get(RELIABLE_KEY).and_then(Value::as_bool) {
            Some(flag) => {
                map.remove(RELIABLE_KEY);
                flag
            }
            None => false,
        };
        let seq = if reliable {
            map.remove(SEQ_KEY).and_then(|v| v.as_u64())
        } else {
            None
        };

        let tag = map.get(TYPE_KEY).and_then(Value::as_str);
        let message = match tag {
            Some(tag) if ControlMessage::TAGS.contains(&tag) => {
                Message::Control(serde_json::from_value(Value::Object(map)).ok()?)
            }
            _ => Message::Payload(map),
        };

        Some(Self {
            message,
            reliable,
            seq,
        })
    }

    /// [`Self::from_object`] for any JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Self::from_object(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_control_wire_shape() {
        let map = Message::from(ControlMessage::ClientJoin).to_object();
        assert_eq!(Value::Object(map), json!({"type": "client_join"}));

        let map = Message::from(ControlMessage::Ack { seq: 3 }).to_object();
        assert_eq!(Value::Object(map), json!({"type": "ack", "seq": 3}));

        let games = vec![PeerAddress::new("10.0.0.1", 50007)];
        let map = Message::from(ControlMessage::Games { games }).to_object();
        assert_eq!(Value::Object(map), json!({"type": "games", "games": [["10.0.0.1", 50007]]}));
    }

    #[test]
    fn test_every_tag_parses() {
        for tag in ControlMessage::TAGS {
            let mut map = object(json!({"type": tag}));
            if *tag == "ack" {
                map.insert("seq".into(), json!(1));
            }
            if *tag == "chain_update" {
                map.insert("chain".into(), json!([]));
            }
            let frame = Frame::from_object(map).unwrap();
            assert!(matches!(frame.message, Message::Control(_)), "{tag}");
        }
    }

    #[test]
    fn test_reliable_fields_are_split_off() {
        let frame = Frame::from_object(object(json!({
            "type": "ping", "nonce": 4, "reliable": true, "seq": 9, "sig": "ab"
        })))
        .unwrap();

        assert!(frame.reliable);
        assert_eq!(frame.seq, Some(9));
        assert_eq!(frame.message, Message::Control(ControlMessage::Ping { nonce: 4 }));
    }

    #[test]
    fn test_unreliable_payload_keeps_seq() {
        let frame = Frame::from_object(object(json!({"y": 3, "seq": 2, "sig": "ff"}))).unwrap();
        assert!(!frame.reliable);
        assert_eq!(frame.seq, None);
        assert_eq!(frame.message, Message::Payload(object(json!({"y": 3, "seq": 2}))));
    }

    #[test]
    fn test_non_bool_reliable_stays_in_payload() {
        let frame = Frame::from_object(object(json!({"reliable": "yes", "seq": 5, "item": 1}))).unwrap();
        assert!(!frame.reliable);
        assert_eq!(frame.seq, None);
        assert_eq!(
            frame.message,
            Message::Payload(object(json!({"reliable": "yes", "seq": 5, "item": 1})))
        );
    }

    #[test]
    fn test_unknown_type_is_payload() {
        let frame = Frame::from_object(object(json!({"type": "chat", "text": "gg"}))).unwrap();
        assert!(matches!(frame.message, Message::Payload(ref m) if m["text"] == "gg"));
    }

    #[test]
    fn test_malformed_control_is_dropped() {
        assert!(Frame::from_object(object(json!({"type": "ack"}))).is_none());
        assert!(Frame::from_object(object(json!({"type": "games", "games": "x"}))).is_none());
        assert!(Frame::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = Frame::reliable(ControlMessage::Register.into(), 12);
        let back = Frame::from_object(frame.to_object()).unwrap();
        assert_eq!(back, frame);
    }
}
