use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Backend user identifier.
pub type UserId = i64;
/// Backend chat message identifier.
pub type MessageId = i64;
/// Backend room identifier (rooms may be addressed by slug).
pub type RoomId = String;

/// Wire family of a chat-message event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChatKind {
    /// Direct message (`"dm"`).
    Dm,
    /// Room message (`"message"`).
    Room,
    /// Room system notice (`"system"`), for example joins and leaves.
    System,
}

impl ChatKind {
    /// Value of the `type` field carrying this kind.
    pub fn wire_type(self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Room => "message",
            Self::System => "system",
        }
    }

    /// Parse a wire `type` value into a chat kind.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "dm" => Some(Self::Dm),
            "message" => Some(Self::Room),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Chat message payload shared by history rows and live `dm`/`message` frames.
///
/// Fields the client does not interpret are kept in `extra` so that a frame
/// re-encodes to the same object it was decoded from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Message ID. System notices may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Author of a direct message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    /// Author of a room message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Raw content, possibly carrying a reply prefix.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Set when the message was edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_false"
    )]
    pub is_deleted: bool,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_false"
    )]
    pub is_pinned: bool,
    /// Reaction map as sent by the backend: an object or a JSON-encoded string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_username: Option<String>,
    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Author of the message regardless of conversation kind.
    pub fn author_id(&self) -> Option<UserId> {
        self.sender_id.or(self.user_id)
    }

    /// Whether the message carries an edit timestamp and is still visible.
    pub fn is_edited(&self) -> bool {
        self.updated_at.is_some() && !self.is_deleted
    }

    /// Reactions as `emoji -> user IDs`; unreadable shapes yield an empty map.
    pub fn reactions(&self) -> BTreeMap<String, Vec<UserId>> {
        let parsed = match &self.reactions {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
            Some(other) => Some(other.clone()),
            None => None,
        };
        match parsed {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => BTreeMap::new(),
        }
    }
}

/// Remote typing indicator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingEvent {
    /// Declared sender. Some backends omit it on direct channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_typing: bool,
}

/// Presence update for conversation participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Presence {
    /// Full online set, replacing any previous one.
    Snapshot { online_user_ids: Vec<UserId> },
    /// Single user going online or offline.
    Single { user_id: UserId, online: bool },
}

/// Read receipt for a batch of messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenReceipt {
    pub message_ids: Vec<MessageId>,
    /// Server timestamp; the client records its own time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<String>,
}

/// Typed inbound event decoded from one wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// New or edited chat message.
    Chat { kind: ChatKind, message: ChatMessage },
    Typing(TypingEvent),
    Presence(Presence),
    Seen(SeenReceipt),
    /// Frame with an unrecognized `type`, kept for consumers that want it.
    Unknown {
        kind: String,
        payload: Map<String, Value>,
    },
}

impl Event {
    /// Wire `type` of the event.
    pub fn kind(&self) -> &str {
        match self {
            Self::Chat { kind, .. } => kind.wire_type(),
            Self::Typing(_) => "typing",
            Self::Presence(_) => "presence",
            Self::Seen(_) => "seen",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

/// Event sent by the local client over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// `{type: "typing", is_typing}`.
    Typing { is_typing: bool },
    /// `{type: "seen", message_ids}`.
    Seen { message_ids: Vec<MessageId> },
    /// Untagged `{content}` frame used to post a new chat message.
    ChatSend { content: String },
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_false(value: &bool) -> bool {
    !*value
}
