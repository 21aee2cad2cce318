//! Text rendering of a conversation for the terminal.

use client_core::{
    ChatKind, Conversation, ConversationTarget, DeliveryStatus, TimelineItem, parse_content,
};

/// One rendered timeline row.
pub fn render_item(conversation: &Conversation, item: &TimelineItem) -> String {
    let message = &item.message;
    let parsed = parse_content(&message.content);

    if item.kind == ChatKind::System {
        return format!("  * {}", parsed.body);
    }

    let mut line = String::new();
    if let Some(reply) = &parsed.reply {
        let quoted = parse_content(&reply.content).body.lines().next().unwrap_or("");
        let who = if reply.nickname.is_empty() {
            &reply.username
        } else {
            &reply.nickname
        };
        line.push_str(&format!("    > {who}: {quoted}\n"));
    }

    let id = message
        .id
        .map(|id| format!("#{id}"))
        .unwrap_or_else(|| "#?".to_owned());
    line.push_str(&format!("{id} {}: {}", author_label(conversation, item), parsed.body));

    if message.is_pinned {
        line.push_str(" [pinned]");
    }
    if message.is_edited() && !message.is_deleted {
        line.push_str(" (edited)");
    }
    let reactions = message.reactions();
    if !reactions.is_empty() {
        let summary: Vec<String> = reactions
            .iter()
            .map(|(emoji, users)| format!("{emoji}{}", users.len()))
            .collect();
        line.push_str(&format!(" [{}]", summary.join(" ")));
    }
    if let Some(status) = conversation.delivery_status(message) {
        line.push_str(match status {
            DeliveryStatus::Sent => " ✓",
            DeliveryStatus::Delivered => " ✓✓",
            DeliveryStatus::Seen => " ✓✓ seen",
        });
    }
    line
}

fn author_label(conversation: &Conversation, item: &TimelineItem) -> String {
    let message = &item.message;
    let author = message.author_id();
    if author == Some(conversation.own_user_id()) {
        return "you".to_owned();
    }
    match (conversation.target(), &message.user_nickname) {
        (ConversationTarget::Room { .. }, Some(nickname)) => match &message.user_username {
            Some(username) => format!("{nickname} (@{username})"),
            None => nickname.clone(),
        },
        _ => author
            .map(|id| format!("user {id}"))
            .unwrap_or_else(|| "unknown".to_owned()),
    }
}

/// Connection, typing and presence summary.
pub fn status_line(conversation: &Conversation) -> String {
    let mut parts = vec![format!("{}", conversation.target())];
    parts.push(if conversation.connected() {
        "connected".to_owned()
    } else {
        "offline".to_owned()
    });

    match conversation.target() {
        ConversationTarget::Direct { peer_id } => {
            if conversation.is_online(*peer_id) {
                parts.push("peer online".to_owned());
            }
            if conversation.is_remote_typing() {
                parts.push("typing...".to_owned());
            }
        }
        ConversationTarget::Room { .. } => {
            parts.push(format!("{} online", conversation.online_users().len()));
            let mut typing: Vec<String> = conversation
                .typing_senders()
                .map(|sender| match sender {
                    Some(id) => format!("user {id}"),
                    None => "someone".to_owned(),
                })
                .collect();
            typing.sort();
            if !typing.is_empty() {
                parts.push(format!("{} typing...", typing.join(", ")));
            }
        }
    }
    parts.join(" | ")
}
