//! JSON frame codec.
//!
//! Every frame is a flat JSON object. Inbound frames must carry a string
//! `type`; anything else is dropped rather than reported, so bad network data
//! can never reach the consumer as an error.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{trace, warn};

use crate::types::{ChatKind, Event, OutboundEvent};

const TYPE_FIELD: &str = "type";

/// Encode an event into a text frame.
pub fn encode(event: &Event) -> String {
    let (kind, mut object) = match event {
        Event::Chat { kind, message } => (kind.wire_type().to_owned(), to_object(message)),
        Event::Typing(typing) => ("typing".to_owned(), to_object(typing)),
        Event::Presence(presence) => ("presence".to_owned(), to_object(presence)),
        Event::Seen(receipt) => ("seen".to_owned(), to_object(receipt)),
        Event::Unknown { kind, payload } => (kind.clone(), payload.clone()),
    };
    object.insert(TYPE_FIELD.to_owned(), Value::String(kind));
    Value::Object(object).to_string()
}

/// Encode a locally produced event into a text frame.
pub fn encode_outbound(event: &OutboundEvent) -> String {
    let value = match event {
        OutboundEvent::Typing { is_typing } => {
            json!({ "type": "typing", "is_typing": is_typing })
        }
        OutboundEvent::Seen { message_ids } => {
            json!({ "type": "seen", "message_ids": message_ids })
        }
        OutboundEvent::ChatSend { content } => json!({ "content": content }),
    };
    value.to_string()
}

/// Decode a text frame. Returns `None` for anything that is not a typed event.
pub fn decode(frame: &str) -> Option<Event> {
    match serde_json::from_str::<Value>(frame) {
        Ok(value) => event_from_value(value),
        Err(err) => {
            trace!(error = %err, len = frame.len(), "dropping non-json frame");
            None
        }
    }
}

/// Decode a binary frame holding UTF-8 JSON.
pub fn decode_bytes(frame: &[u8]) -> Option<Event> {
    match serde_json::from_slice::<Value>(frame) {
        Ok(value) => event_from_value(value),
        Err(err) => {
            trace!(error = %err, len = frame.len(), "dropping non-json binary frame");
            None
        }
    }
}

/// Convert an already-parsed JSON value into an event.
pub fn event_from_value(value: Value) -> Option<Event> {
    let Value::Object(mut object) = value else {
        trace!("dropping non-object frame");
        return None;
    };
    let kind = match object.remove(TYPE_FIELD) {
        Some(Value::String(kind)) => kind,
        _ => {
            trace!("dropping frame without a string type");
            return None;
        }
    };

    if let Some(chat_kind) = ChatKind::from_wire(&kind) {
        return parse_payload(&kind, object).map(|message| Event::Chat {
            kind: chat_kind,
            message,
        });
    }

    match kind.as_str() {
        "typing" => parse_payload(&kind, object).map(Event::Typing),
        "presence" => parse_payload(&kind, object).map(Event::Presence),
        "seen" => parse_payload(&kind, object).map(Event::Seen),
        _ => Some(Event::Unknown {
            kind,
            payload: object,
        }),
    }
}

fn parse_payload<T>(kind: &str, object: Map<String, Value>) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(Value::Object(object))
        .inspect_err(|err| trace!(kind, error = %err, "dropping malformed frame"))
        .ok()
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            warn!(shape = ?other, "event payload did not serialize to an object");
            Map::new()
        }
        Err(err) => {
            warn!(error = %err, "event payload failed to serialize");
            Map::new()
        }
    }
}
