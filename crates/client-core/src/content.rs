//! Reply-quote encoding inside message content.
//!
//! A reply is stored inline as `[[reply:<percent-encoded JSON>]]\n<body>`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::MessageId;

const REPLY_OPEN: &str = "[[reply:";
const REPLY_CLOSE: &str = "]]";

/// Quoted message a reply refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyMeta {
    pub id: MessageId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub content: String,
}

/// Message content split into its reply prefix and visible body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContent<'a> {
    pub body: &'a str,
    pub reply: Option<ReplyMeta>,
    /// Raw prefix, kept so edits can preserve the quote.
    pub prefix: &'a str,
}

/// Split raw content. A malformed prefix leaves the whole text as body.
pub fn parse_content(raw: &str) -> ParsedContent<'_> {
    let plain = ParsedContent {
        body: raw,
        reply: None,
        prefix: "",
    };
    let Some((encoded, prefix_len)) = split_prefix(raw) else {
        return plain;
    };
    let decoded = match urlencoding::decode(encoded) {
        Ok(decoded) => decoded,
        Err(err) => {
            trace!(error = %err, "reply prefix is not valid percent-encoding");
            return plain;
        }
    };
    match serde_json::from_str::<ReplyMeta>(&decoded) {
        Ok(reply) => ParsedContent {
            body: &raw[prefix_len..],
            reply: Some(reply),
            prefix: &raw[..prefix_len],
        },
        Err(err) => {
            trace!(error = %err, "reply prefix is not a reply payload");
            plain
        }
    }
}

/// Compose content for sending, quoting `reply` when present.
pub fn build_content(body: &str, reply: Option<&ReplyMeta>) -> String {
    let Some(reply) = reply else {
        return body.to_owned();
    };
    let encoded = serde_json::to_string(reply).unwrap_or_default();
    format!(
        "{REPLY_OPEN}{}{REPLY_CLOSE}\n{body}",
        urlencoding::encode(&encoded)
    )
}

/// Replacement content for an edit, keeping any reply quote of `original`.
pub fn edit_content(original: &str, new_body: &str) -> String {
    let parsed = parse_content(original);
    format!("{}{}", parsed.prefix, new_body.trim())
}

/// Returns the encoded payload and the byte length of the whole prefix.
fn split_prefix(raw: &str) -> Option<(&str, usize)> {
    let rest = raw.strip_prefix(REPLY_OPEN)?;
    // The payload is at least one character and never spans lines.
    let first = rest.chars().next()?;
    if first == '\n' {
        return None;
    }
    let search_from = first.len_utf8();
    let close = search_from + rest[search_from..].find(REPLY_CLOSE)?;
    let encoded = &rest[..close];
    if encoded.contains('\n') {
        return None;
    }

    let mut prefix_len = REPLY_OPEN.len() + close + REPLY_CLOSE.len();
    if raw[prefix_len..].starts_with('\n') {
        prefix_len += 1;
    }
    Some((encoded, prefix_len))
}
