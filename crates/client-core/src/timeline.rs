use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{ChatKind, ChatMessage, MessageId};

/// Content shown in place of a message deleted for everyone.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

/// Errors that can occur while applying timeline operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelineMergeError {
    /// An operation referenced a message ID that is not present in the buffer.
    #[error("timeline message with id {0} was not found")]
    MissingMessage(MessageId),
    /// A merge patch produced a payload that is no longer a chat message.
    #[error("merge patch for message {id} is invalid: {reason}")]
    InvalidPatch { id: MessageId, reason: String },
}

/// One rendered chat row.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    pub kind: ChatKind,
    pub message: ChatMessage,
}

impl TimelineItem {
    pub fn new(kind: ChatKind, message: ChatMessage) -> Self {
        Self { kind, message }
    }
}

/// Incremental timeline operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineOp {
    /// Insert a new message or replace the one with the same ID in place.
    Upsert(TimelineItem),
    /// Replace the whole timeline, for example with fetched history.
    Replace(Vec<TimelineItem>),
    /// Record a read receipt; already-seen messages keep their timestamp.
    MarkSeen {
        message_ids: Vec<MessageId>,
        seen_at: String,
    },
    /// Message deleted for everyone.
    MarkDeleted { id: MessageId },
    /// Message deleted for the local user only.
    Remove { id: MessageId },
    /// Overlay a REST mutation response onto an existing message.
    Merge {
        id: MessageId,
        patch: Map<String, Value>,
    },
    /// Clear all timeline items.
    Clear,
}

/// In-memory conversation timeline with bounded item retention.
#[derive(Debug, Clone)]
pub struct Timeline {
    items: Vec<TimelineItem>,
    max_items: usize,
}

impl Timeline {
    /// Create a timeline with an item cap (`max_items >= 1`).
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            max_items: max_items.max(1),
        }
    }

    /// Current timeline items in display order.
    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn get(&self, id: MessageId) -> Option<&TimelineItem> {
        self.items.iter().find(|item| item.message.id == Some(id))
    }

    /// Apply timeline operations in order.
    pub fn apply_ops(&mut self, ops: &[TimelineOp]) -> Result<(), TimelineMergeError> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, op: &TimelineOp) -> Result<(), TimelineMergeError> {
        match op {
            TimelineOp::Upsert(item) => self.upsert(item.clone()),
            TimelineOp::Replace(items) => self.items = items.clone(),
            TimelineOp::MarkSeen {
                message_ids,
                seen_at,
            } => {
                for item in self
                    .items
                    .iter_mut()
                    .filter(|it| it.message.id.is_some_and(|id| message_ids.contains(&id)))
                {
                    item.message
                        .seen_at
                        .get_or_insert_with(|| seen_at.clone());
                }
            }
            TimelineOp::MarkDeleted { id } => {
                let item = self.find_mut(*id)?;
                item.message.content = DELETED_PLACEHOLDER.to_owned();
                item.message.is_deleted = true;
            }
            TimelineOp::Remove { id } => {
                let idx = self
                    .items
                    .iter()
                    .position(|it| it.message.id == Some(*id))
                    .ok_or(TimelineMergeError::MissingMessage(*id))?;
                self.items.remove(idx);
            }
            TimelineOp::Merge { id, patch } => {
                let item = self.find_mut(*id)?;
                item.message = merged(*id, &item.message, patch)?;
            }
            TimelineOp::Clear => self.items.clear(),
        }
        self.trim_to_max();
        Ok(())
    }

    /// Case-insensitive content search; an empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&TimelineItem> {
        let query = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| query.is_empty() || item.message.content.to_lowercase().contains(&query))
            .collect()
    }

    fn upsert(&mut self, mut item: TimelineItem) {
        let position = item
            .message
            .id
            .and_then(|id| self.items.iter().position(|it| it.message.id == Some(id)));
        match position {
            Some(idx) => {
                let existing = &mut self.items[idx];
                if item.message.seen_at.is_none() {
                    item.message.seen_at = existing.message.seen_at.take();
                }
                *existing = item;
            }
            None => self.items.push(item),
        }
    }

    fn find_mut(&mut self, id: MessageId) -> Result<&mut TimelineItem, TimelineMergeError> {
        self.items
            .iter_mut()
            .find(|it| it.message.id == Some(id))
            .ok_or(TimelineMergeError::MissingMessage(id))
    }

    fn trim_to_max(&mut self) {
        if self.items.len() <= self.max_items {
            return;
        }

        let excess = self.items.len() - self.max_items;
        self.items.drain(0..excess);
    }
}

fn merged(
    id: MessageId,
    message: &ChatMessage,
    patch: &Map<String, Value>,
) -> Result<ChatMessage, TimelineMergeError> {
    let invalid = |err: serde_json::Error| TimelineMergeError::InvalidPatch {
        id,
        reason: err.to_string(),
    };
    let mut object = match serde_json::to_value(message).map_err(invalid)? {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    for (key, value) in patch {
        if key != "type" {
            object.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(object)).map_err(invalid)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn item(id: MessageId, content: &str) -> TimelineItem {
        TimelineItem::new(
            ChatKind::Dm,
            ChatMessage {
                id: Some(id),
                sender_id: Some(2),
                content: content.to_owned(),
                ..ChatMessage::default()
            },
        )
    }

    #[test]
    fn upserts_by_id_in_place() {
        let mut timeline = Timeline::new(50);
        let mut deleted = item(1, "hi");
        deleted.message.is_deleted = true;
        timeline
            .apply_ops(&[
                TimelineOp::Upsert(item(1, "hi")),
                TimelineOp::Upsert(item(2, "there")),
                TimelineOp::Upsert(deleted),
            ])
            .expect("ops should be valid");

        assert_eq!(timeline.items().len(), 2);
        assert_eq!(timeline.items()[0].message.id, Some(1));
        assert!(timeline.items()[0].message.is_deleted);
    }

    #[test]
    fn messages_without_id_are_appended() {
        let mut timeline = Timeline::new(10);
        let notice = TimelineItem::new(
            ChatKind::System,
            ChatMessage {
                content: "ann joined".to_owned(),
                ..ChatMessage::default()
            },
        );
        timeline
            .apply_ops(&[TimelineOp::Upsert(notice.clone()), TimelineOp::Upsert(notice)])
            .expect("append should work");
        assert_eq!(timeline.items().len(), 2);
    }

    #[test]
    fn mark_seen_is_monotonic() {
        let mut timeline = Timeline::new(10);
        timeline
            .apply_ops(&[
                TimelineOp::Upsert(item(1, "a")),
                TimelineOp::MarkSeen {
                    message_ids: vec![1, 99],
                    seen_at: "t1".to_owned(),
                },
                TimelineOp::MarkSeen {
                    message_ids: vec![1],
                    seen_at: "t2".to_owned(),
                },
                TimelineOp::Upsert(item(1, "a (edited)")),
            ])
            .expect("ops should be valid");

        let message = &timeline.items()[0].message;
        assert_eq!(message.seen_at.as_deref(), Some("t1"));
        assert_eq!(message.content, "a (edited)");
    }

    #[test]
    fn mark_deleted_replaces_content() {
        let mut timeline = Timeline::new(10);
        timeline
            .apply_ops(&[
                TimelineOp::Upsert(item(1, "secret")),
                TimelineOp::MarkDeleted { id: 1 },
            ])
            .expect("ops should be valid");
        assert_eq!(timeline.items()[0].message.content, DELETED_PLACEHOLDER);
        assert!(timeline.items()[0].message.is_deleted);
    }

    #[test]
    fn fails_when_message_for_remove_is_missing() {
        let mut timeline = Timeline::new(10);
        let err = timeline
            .apply(&TimelineOp::Remove { id: 404 })
            .expect_err("should reject removal of unknown messages");
        assert_eq!(err, TimelineMergeError::MissingMessage(404));
    }

    #[test]
    fn merges_mutation_response() {
        let mut timeline = Timeline::new(10);
        timeline
            .apply(&TimelineOp::Upsert(item(1, "old")))
            .expect("upsert");
        let patch = json!({
            "type": "dm",
            "content": "new",
            "is_pinned": true,
            "updated_at": "2025-02-02T00:00:00Z"
        });
        timeline
            .apply(&TimelineOp::Merge {
                id: 1,
                patch: patch.as_object().cloned().expect("object"),
            })
            .expect("merge should work");

        let message = &timeline.items()[0].message;
        assert_eq!(message.content, "new");
        assert!(message.is_pinned);
        assert!(message.is_edited());
        assert_eq!(message.sender_id, Some(2));
        assert!(!message.extra.contains_key("type"));
    }

    #[test]
    fn rejects_merge_that_breaks_message_shape() {
        let mut timeline = Timeline::new(10);
        timeline
            .apply(&TimelineOp::Upsert(item(1, "old")))
            .expect("upsert");
        let patch = json!({"id": "not-a-number"});
        let err = timeline
            .apply(&TimelineOp::Merge {
                id: 1,
                patch: patch.as_object().cloned().expect("object"),
            })
            .expect_err("merge must fail");
        assert!(matches!(err, TimelineMergeError::InvalidPatch { id: 1, .. }));
        assert_eq!(timeline.items()[0].message.content, "old");
    }

    #[test]
    fn trims_oldest_when_over_max_items() {
        let mut timeline = Timeline::new(2);
        timeline
            .apply_ops(&[
                TimelineOp::Upsert(item(1, "one")),
                TimelineOp::Upsert(item(2, "two")),
                TimelineOp::Upsert(item(3, "three")),
            ])
            .expect("append should work");

        assert_eq!(timeline.items().len(), 2);
        assert_eq!(timeline.items()[0].message.id, Some(2));
        assert_eq!(timeline.items()[1].message.id, Some(3));
    }

    #[test]
    fn searches_case_insensitively() {
        let mut timeline = Timeline::new(10);
        timeline
            .apply_ops(&[
                TimelineOp::Upsert(item(1, "Hello World")),
                TimelineOp::Upsert(item(2, "bye")),
            ])
            .expect("ops");
        assert_eq!(timeline.search("WORLD").len(), 1);
        assert_eq!(timeline.search("  ").len(), 2);
    }
}
