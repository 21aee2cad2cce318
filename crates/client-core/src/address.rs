use std::fmt;

use thiserror::Error;
use url::Url;

use crate::types::{RoomId, UserId};

/// Session token passed explicitly to every channel and REST call.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value for request construction.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Conversation a channel is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationTarget {
    /// Direct conversation with one peer.
    Direct { peer_id: UserId },
    /// Group room.
    Room { room_id: RoomId },
}

impl ConversationTarget {
    fn path(&self) -> String {
        match self {
            Self::Direct { peer_id } => format!("ws/dms/{peer_id}"),
            Self::Room { room_id } => format!("ws/rooms/{}", urlencoding::encode(room_id)),
        }
    }
}

impl fmt::Display for ConversationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { peer_id } => write!(f, "dm:{peer_id}"),
            Self::Room { room_id } => write!(f, "room:{room_id}"),
        }
    }
}

/// Errors produced when resolving a channel address into a socket URL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid websocket base '{base}': {reason}")]
    InvalidBase { base: String, reason: String },
    #[error("unsupported websocket scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("credential is empty")]
    MissingCredential,
}

/// Connection target of one channel.
///
/// Equality of every field is the channel identity: a different address
/// means the live connection has to be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    ws_base: String,
    target: ConversationTarget,
    credential: Credential,
}

impl ChannelAddress {
    /// Build an address. The base is not validated until [`Self::url`].
    pub fn new(
        ws_base: impl Into<String>,
        target: ConversationTarget,
        credential: Credential,
    ) -> Self {
        Self {
            ws_base: ws_base.into(),
            target,
            credential,
        }
    }

    pub fn target(&self) -> &ConversationTarget {
        &self.target
    }

    pub fn ws_base(&self) -> &str {
        &self.ws_base
    }

    /// Resolve the socket URL, carrying the credential as `token` query.
    pub fn url(&self) -> Result<Url, AddressError> {
        if self.credential.is_empty() {
            return Err(AddressError::MissingCredential);
        }

        let base = self.ws_base.trim().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{}", self.target.path())).map_err(|err| {
            AddressError::InvalidBase {
                base: self.ws_base.clone(),
                reason: err.to_string(),
            }
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(AddressError::UnsupportedScheme(url.scheme().to_owned()));
        }
        url.query_pairs_mut()
            .append_pair("token", self.credential.expose());
        Ok(url)
    }

    /// URL with the token replaced, safe for logs.
    pub fn redacted(&self) -> String {
        format!(
            "{}/{}",
            self.ws_base.trim_end_matches('/'),
            self.target.path()
        )
    }
}

/// Derive the websocket base from a configured URL.
///
/// `ws://`/`wss://` are kept, `http(s)://` is mapped to `ws(s)://`, and any
/// other value falls back to `fallback`.
pub fn ws_base_from(raw: &str, fallback: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("wss://") || raw.starts_with("ws://") {
        return raw.to_owned();
    }
    if let Some(rest) = raw.strip_prefix("https://") {
        return format!("wss://{rest}");
    }
    if let Some(rest) = raw.strip_prefix("http://") {
        return format!("ws://{rest}");
    }
    fallback.to_owned()
}
