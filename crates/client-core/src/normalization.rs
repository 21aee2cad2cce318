use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    timeline::TimelineItem,
    types::{ChatKind, ChatMessage},
};

const UNKNOWN_NICKNAME: &str = "Unknown";
const UNKNOWN_USERNAME: &str = "unknown";

/// Convert REST history rows into timeline items.
///
/// Rows carry an optional `type`; untyped rows take `default_kind`. Room rows
/// get author display names flattened from a nested `user` object. Rows that
/// are not chat messages are skipped.
pub fn normalize_history(rows: Vec<Value>, default_kind: ChatKind) -> Vec<TimelineItem> {
    rows.into_iter()
        .filter_map(|row| normalize_row(row, default_kind))
        .collect()
}

fn normalize_row(row: Value, default_kind: ChatKind) -> Option<TimelineItem> {
    let Value::Object(mut object) = row else {
        warn!("skipping non-object history row");
        return None;
    };
    let kind = match object.remove("type") {
        Some(Value::String(kind)) => ChatKind::from_wire(&kind).unwrap_or(default_kind),
        _ => default_kind,
    };
    if default_kind != ChatKind::Dm {
        flatten_room_author(&mut object);
    }

    match serde_json::from_value::<ChatMessage>(Value::Object(object)) {
        Ok(message) => Some(TimelineItem::new(kind, message)),
        Err(err) => {
            warn!(error = %err, "skipping malformed history row");
            None
        }
    }
}

fn flatten_room_author(object: &mut Map<String, Value>) {
    let user = object.get("user").and_then(Value::as_object);
    let nickname = first_string(&[
        user.and_then(|user| user.get("nickname")),
        object.get("user_nickname"),
        object.get("user_name"),
    ])
    .unwrap_or(UNKNOWN_NICKNAME)
    .to_owned();
    let username = first_string(&[
        user.and_then(|user| user.get("username")),
        object.get("user_username"),
    ])
    .unwrap_or(UNKNOWN_USERNAME)
    .to_owned();

    object.insert("user_nickname".to_owned(), Value::String(nickname));
    object.insert("user_username".to_owned(), Value::String(username));
}

fn first_string<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .filter_map(|value| value.as_str())
        .find(|value| !value.is_empty())
}

/// Strip transport-only fields from a REST mutation response before merging.
pub fn mutation_patch(response: Value) -> Map<String, Value> {
    match response {
        Value::Object(mut object) => {
            object.remove("type");
            object
        }
        _ => Map::new(),
    }
}
