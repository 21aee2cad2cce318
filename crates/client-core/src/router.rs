//! Event routing from a channel into conversation state.

use std::collections::{BTreeSet, HashSet};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::{
    address::ConversationTarget,
    channel::{ChannelState, ChannelUpdate, Generation},
    error::ClientError,
    timeline::{Timeline, TimelineItem, TimelineMergeError, TimelineOp},
    types::{ChatKind, ChatMessage, Event, MessageId, Presence, SeenReceipt, TypingEvent, UserId},
};

/// Per-screen reaction to each event kind.
pub trait ConversationHandlers {
    fn on_chat_message(&mut self, kind: ChatKind, message: &ChatMessage);
    fn on_typing(&mut self, typing: &TypingEvent);
    fn on_presence(&mut self, presence: &Presence);
    fn on_seen(&mut self, receipt: &SeenReceipt);

    fn on_unknown(&mut self, _kind: &str, _payload: &Map<String, Value>) {}

    /// Buffered channel events were discarded.
    fn on_reset(&mut self) {}

    fn on_connection_changed(&mut self, _connected: bool) {}
}

/// Dispatches channel events exclusively by type.
///
/// The cursor is a position in one connection's buffer: the generation being
/// followed and the index of the next event expected from it. Events from a
/// newer generation reset the handlers even when the `Reset` update itself
/// was never seen.
#[derive(Debug)]
pub struct EventRouter<H> {
    handlers: H,
    generation: Option<Generation>,
    next_index: usize,
    resets: u64,
}

impl<H: ConversationHandlers> EventRouter<H> {
    pub fn new(handlers: H) -> Self {
        Self {
            handlers,
            generation: None,
            next_index: 0,
            resets: 0,
        }
    }

    /// Number of times the handlers were reset. Screens compare it around
    /// [`Self::apply_update`] and [`Self::sync`] to know when to refetch.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn handlers(&self) -> &H {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut H {
        &mut self.handlers
    }

    pub fn into_handlers(self) -> H {
        self.handlers
    }

    /// Dispatch one event.
    pub fn dispatch(&mut self, event: &Event) {
        trace!(kind = event.kind(), "routing event");
        match event {
            Event::Chat { kind, message } => self.handlers.on_chat_message(*kind, message),
            Event::Typing(typing) => self.handlers.on_typing(typing),
            Event::Presence(presence) => self.handlers.on_presence(presence),
            Event::Seen(receipt) => self.handlers.on_seen(receipt),
            Event::Unknown { kind, payload } => self.handlers.on_unknown(kind, payload),
        }
    }

    /// Dispatch the events of `state` not routed yet.
    ///
    /// Returns the number of dispatched events.
    pub fn sync(&mut self, state: &ChannelState) -> usize {
        if state.generation == 0 {
            return 0;
        }
        self.follow(state.generation);
        if state.received.len() < self.next_index {
            // Same connection, emptied buffer: the channel was closed.
            debug!(generation = state.generation, "channel buffer discarded");
            self.next_index = 0;
            self.reset_handlers();
        }
        let fresh = &state.received[self.next_index..];
        for event in fresh {
            self.dispatch(event);
        }
        self.next_index = state.received.len();
        fresh.len()
    }

    /// Route the whole buffer of `state` again, for handlers that just
    /// replaced their timeline with fetched history.
    pub fn replay(&mut self, state: &ChannelState) -> usize {
        if self.generation == Some(state.generation) {
            self.next_index = 0;
        }
        self.sync(state)
    }

    /// Apply one update from a channel subscription.
    ///
    /// Events already routed through [`Self::sync`] are skipped.
    pub fn apply_update(&mut self, update: &ChannelUpdate) {
        match update {
            ChannelUpdate::Event {
                generation,
                index,
                event,
            } => {
                self.follow(*generation);
                if *index < self.next_index {
                    trace!(generation, index, "skipping routed event");
                    return;
                }
                if *index > self.next_index {
                    warn!(
                        generation,
                        expected = self.next_index,
                        index,
                        "channel events missed, sync to recover"
                    );
                }
                self.dispatch(event);
                self.next_index = index + 1;
            }
            ChannelUpdate::Connected(connected) => {
                self.handlers.on_connection_changed(*connected)
            }
            ChannelUpdate::Reset => {
                self.generation = None;
                self.next_index = 0;
                self.reset_handlers();
            }
        }
    }

    /// Follow `generation`, resetting handlers when it replaces another one.
    fn follow(&mut self, generation: Generation) {
        if self.generation == Some(generation) {
            return;
        }
        if let Some(previous) = self.generation
            && self.next_index > 0
        {
            debug!(previous, generation, "channel connection replaced");
            self.reset_handlers();
        }
        self.generation = Some(generation);
        self.next_index = 0;
    }

    fn reset_handlers(&mut self) {
        self.resets += 1;
        self.handlers.on_reset();
    }
}

/// Outgoing message state shown next to own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Seen,
}

/// Shared conversation state for direct and room screens.
#[derive(Debug, Clone)]
pub struct Conversation {
    own_user_id: UserId,
    target: ConversationTarget,
    timeline: Timeline,
    typing: HashSet<Option<UserId>>,
    online: BTreeSet<UserId>,
    connected: bool,
    notices: Vec<ClientError>,
}

impl Conversation {
    pub fn new(own_user_id: UserId, target: ConversationTarget, max_items: usize) -> Self {
        Self {
            own_user_id,
            target,
            timeline: Timeline::new(max_items),
            typing: HashSet::new(),
            online: BTreeSet::new(),
            connected: false,
            notices: Vec::new(),
        }
    }

    pub fn target(&self) -> &ConversationTarget {
        &self.target
    }

    pub fn own_user_id(&self) -> UserId {
        self.own_user_id
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Replace the timeline with fetched history.
    pub fn load_history(&mut self, items: Vec<TimelineItem>) {
        debug!(target = %self.target, count = items.len(), "history loaded");
        self.apply_local(TimelineOp::Replace(items));
    }

    /// Apply a locally initiated timeline change, for example after a REST
    /// mutation succeeded.
    pub fn apply_local(&mut self, op: TimelineOp) {
        if let Err(err) = self.timeline.apply(&op) {
            warn!(error = %err, "local timeline change rejected");
            self.push_notice(merge_notice(err));
        }
    }

    /// Whether any remote participant is currently typing.
    pub fn is_remote_typing(&self) -> bool {
        !self.typing.is_empty()
    }

    /// Declared senders currently typing; `None` stands for an anonymous sender.
    pub fn typing_senders(&self) -> impl Iterator<Item = &Option<UserId>> {
        self.typing.iter()
    }

    pub fn online_users(&self) -> &BTreeSet<UserId> {
        &self.online
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.online.contains(&user_id)
    }

    /// Messages from the direct peer that have no read receipt yet.
    pub fn unseen_from_peer(&self) -> Vec<MessageId> {
        let ConversationTarget::Direct { peer_id } = self.target else {
            return Vec::new();
        };
        self.timeline
            .items()
            .iter()
            .filter(|item| {
                item.message.sender_id == Some(peer_id) && item.message.seen_at.is_none()
            })
            .filter_map(|item| item.message.id)
            .collect()
    }

    /// Status of a message authored by the local user.
    pub fn delivery_status(&self, message: &ChatMessage) -> Option<DeliveryStatus> {
        if message.author_id() != Some(self.own_user_id) {
            return None;
        }
        if message.seen_at.is_some() {
            Some(DeliveryStatus::Seen)
        } else if message.delivered_at.is_some() {
            Some(DeliveryStatus::Delivered)
        } else if self.connected {
            Some(DeliveryStatus::Sent)
        } else {
            None
        }
    }

    /// Queue a non-blocking notice for the screen.
    pub fn push_notice(&mut self, error: ClientError) {
        self.notices.push(error);
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<ClientError> {
        std::mem::take(&mut self.notices)
    }

    fn accepts_typing_from(&self, sender_id: Option<UserId>) -> bool {
        match (&self.target, sender_id) {
            (_, None) => true,
            (ConversationTarget::Direct { peer_id }, Some(sender)) => sender == *peer_id,
            (ConversationTarget::Room { .. }, Some(sender)) => sender != self.own_user_id,
        }
    }
}

impl ConversationHandlers for Conversation {
    fn on_chat_message(&mut self, kind: ChatKind, message: &ChatMessage) {
        if let Err(err) = self
            .timeline
            .apply(&TimelineOp::Upsert(TimelineItem::new(kind, message.clone())))
        {
            warn!(error = %err, "chat message rejected by timeline");
        }
    }

    fn on_typing(&mut self, typing: &TypingEvent) {
        if !self.accepts_typing_from(typing.sender_id) {
            trace!(sender_id = ?typing.sender_id, "ignoring typing from other sender");
            return;
        }
        if typing.is_typing {
            self.typing.insert(typing.sender_id);
        } else {
            self.typing.remove(&typing.sender_id);
        }
    }

    fn on_presence(&mut self, presence: &Presence) {
        match presence {
            Presence::Snapshot { online_user_ids } => {
                self.online = online_user_ids.iter().copied().collect();
            }
            Presence::Single { user_id, online } => {
                if let ConversationTarget::Direct { peer_id } = self.target
                    && *user_id != peer_id
                {
                    return;
                }
                if *online {
                    self.online.insert(*user_id);
                } else {
                    self.online.remove(user_id);
                }
            }
        }
    }

    fn on_seen(&mut self, receipt: &SeenReceipt) {
        let seen_at = receipt
            .seen_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        if let Err(err) = self.timeline.apply(&TimelineOp::MarkSeen {
            message_ids: receipt.message_ids.clone(),
            seen_at,
        }) {
            warn!(error = %err, "seen receipt rejected by timeline");
        }
    }

    fn on_reset(&mut self) {
        debug!(target = %self.target, "conversation reset");
        self.typing.clear();
        self.online.clear();
        self.connected = false;
        if let Err(err) = self.timeline.apply(&TimelineOp::Clear) {
            warn!(error = %err, "timeline clear rejected");
        }
    }

    fn on_connection_changed(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.typing.clear();
        }
    }
}

fn merge_notice(err: TimelineMergeError) -> ClientError {
    ClientError::new(
        crate::error::ClientErrorCategory::Internal,
        "timeline_merge_error",
        err.to_string(),
    )
}
