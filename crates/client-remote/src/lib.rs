//! Network side of the client: the per-conversation WebSocket channel and the
//! REST collaborator.

/// Async channel runtime owning one transport at a time.
pub mod channel;
/// REST client for auth, conversations, rooms, users and friends.
pub mod rest;
/// Connection abstraction and the per-connection socket task.
pub mod transport;
/// WebSocket connector.
pub mod websocket;

pub use channel::{Channel, ChannelError};
pub use rest::{
    AuthToken, BlockedUser, ConversationPreferences, ProfileUpdate, RestClient, User,
};
pub use transport::{
    Connection, Connector, Frame, FrameSink, FrameStream, SignalKind, Transport, TransportSignal,
};
pub use websocket::WebSocketConnector;
