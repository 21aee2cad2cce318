//! Core client contract shared by the channel runtime and screens.
//!
//! This crate defines the wire event model and codec, the channel lifecycle
//! state machine, conversation timeline and event routing, and the common
//! error types. It performs no I/O.

/// Channel addressing and credentials.
pub mod address;
/// Transport-agnostic channel state.
pub mod channel;
/// JSON frame encode/decode.
pub mod codec;
/// Reply-quote helpers for message content.
pub mod content;
/// Stable client error types and HTTP classification helpers.
pub mod error;
/// REST payload normalization into timeline items.
pub mod normalization;
/// Per-screen event dispatch and conversation state.
pub mod router;
/// Channel lifecycle state machine.
pub mod state_machine;
/// Conversation timeline buffer.
pub mod timeline;
/// Outbound typing indicator logic.
pub mod typing;
/// Wire protocol types (inbound events, outbound events, payloads).
pub mod types;

pub use address::{AddressError, ChannelAddress, ConversationTarget, Credential, ws_base_from};
pub use channel::{ChannelCore, ChannelEffect, ChannelState, ChannelUpdate, Generation};
pub use content::{ParsedContent, ReplyMeta, build_content, edit_content, parse_content};
pub use error::{ClientError, ClientErrorCategory, classify_http_status};
pub use normalization::{mutation_patch, normalize_history};
pub use router::{Conversation, ConversationHandlers, DeliveryStatus, EventRouter};
pub use state_machine::{ChannelLifecycle, ChannelStateMachine};
pub use timeline::{DELETED_PLACEHOLDER, Timeline, TimelineItem, TimelineMergeError, TimelineOp};
pub use typing::TypingEmitter;
pub use types::{
    ChatKind, ChatMessage, Event, MessageId, OutboundEvent, Presence, RoomId, SeenReceipt,
    TypingEvent, UserId,
};
