//! Composer input parsing.

use client_core::{MessageId, UserId};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  <text>                   send a message
  /reply <id> <text>       reply quoting message <id>
  /edit <id> <text>        edit your message
  /delete <id>             delete for everyone
  /delete-me <id>          delete for yourself (direct chats)
  /react <id> <emoji>      toggle a reaction
  /pin <id>                toggle pin
  /forward <id> <target>   forward to a user id (dm) or room id (room)
  /search <query>          search the loaded timeline
  /clear                   clear this direct conversation
  /block                   block the direct peer
  /unblock                 unblock the direct peer
  /mute, /unmute           mute this direct conversation
  /archive, /unarchive     archive this direct conversation
  /add <username>          add a member to this room
  /kick <user id>          remove a member from this room
  /leave                   leave this room and quit
  /end                     end this room for everyone (creator)
  /delete-room             delete this room (creator)
  /who                     show connection and presence
  /reconnect               open a fresh connection
  /logout                  forget the session and quit
  /quit                    quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Reply { id: MessageId, body: String },
    Edit { id: MessageId, body: String },
    Delete { id: MessageId, for_me_only: bool },
    React { id: MessageId, emoji: String },
    Pin { id: MessageId },
    Forward { id: MessageId, to: String },
    Search(String),
    Clear,
    Block,
    Unblock,
    Mute(bool),
    Archive(bool),
    AddMember(String),
    Kick(UserId),
    Leave,
    EndRoom,
    DeleteRoom,
    Who,
    Reconnect,
    Logout,
    Quit,
    Help,
}

impl Command {
    /// Forward target as a user id, for direct conversations.
    pub fn forward_user(to: &str) -> Option<UserId> {
        to.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '/{0}', try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one composer line. Blank input yields `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_owned())));
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((rest, ""));

    let command = match name {
        "reply" => {
            let (id, body) = id_and_text(args, "/reply <id> <text>")?;
            Command::Reply { id, body }
        }
        "edit" => {
            let (id, body) = id_and_text(args, "/edit <id> <text>")?;
            Command::Edit { id, body }
        }
        "delete" => Command::Delete {
            id: id_only(args, "/delete <id>")?,
            for_me_only: false,
        },
        "delete-me" => Command::Delete {
            id: id_only(args, "/delete-me <id>")?,
            for_me_only: true,
        },
        "react" => {
            let (id, emoji) = id_and_text(args, "/react <id> <emoji>")?;
            Command::React { id, emoji }
        }
        "pin" => Command::Pin {
            id: id_only(args, "/pin <id>")?,
        },
        "forward" => {
            let (id, to) = id_and_text(args, "/forward <id> <target>")?;
            Command::Forward { id, to }
        }
        "search" if !args.is_empty() => Command::Search(args.to_owned()),
        "search" => return Err(CommandError::Usage("/search <query>")),
        "clear" => Command::Clear,
        "block" => Command::Block,
        "unblock" => Command::Unblock,
        "mute" => Command::Mute(true),
        "unmute" => Command::Mute(false),
        "archive" => Command::Archive(true),
        "unarchive" => Command::Archive(false),
        "add" if !args.is_empty() && !args.contains(char::is_whitespace) => {
            Command::AddMember(args.to_owned())
        }
        "add" => return Err(CommandError::Usage("/add <username>")),
        "kick" => Command::Kick(
            args.parse()
                .map_err(|_| CommandError::Usage("/kick <user id>"))?,
        ),
        "leave" => Command::Leave,
        "end" => Command::EndRoom,
        "delete-room" => Command::DeleteRoom,
        "who" => Command::Who,
        "reconnect" => Command::Reconnect,
        "logout" => Command::Logout,
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

fn id_only(args: &str, usage: &'static str) -> Result<MessageId, CommandError> {
    args.parse().map_err(|_| CommandError::Usage(usage))
}

fn id_and_text(args: &str, usage: &'static str) -> Result<(MessageId, String), CommandError> {
    let (id, text) = args
        .split_once(char::is_whitespace)
        .ok_or(CommandError::Usage(usage))?;
    let id = id.parse().map_err(|_| CommandError::Usage(usage))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok((id, text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_said() {
        assert_eq!(
            parse("  hello there ").expect("parse"),
            Some(Command::Say("hello there".to_owned()))
        );
        assert_eq!(parse("   ").expect("parse"), None);
    }

    #[test]
    fn parses_message_commands() {
        assert_eq!(
            parse("/reply 4 sounds good").expect("parse"),
            Some(Command::Reply {
                id: 4,
                body: "sounds good".to_owned()
            })
        );
        assert_eq!(
            parse("/delete-me 9").expect("parse"),
            Some(Command::Delete {
                id: 9,
                for_me_only: true
            })
        );
        assert_eq!(
            parse("/react 2 🎉").expect("parse"),
            Some(Command::React {
                id: 2,
                emoji: "🎉".to_owned()
            })
        );
        assert_eq!(parse("/quit").expect("parse"), Some(Command::Quit));
    }

    #[test]
    fn reports_usage_and_unknown_commands() {
        assert_eq!(
            parse("/edit x new"),
            Err(CommandError::Usage("/edit <id> <text>"))
        );
        assert_eq!(parse("/edit 3"), Err(CommandError::Usage("/edit <id> <text>")));
        assert_eq!(parse("/search"), Err(CommandError::Usage("/search <query>")));
        assert_eq!(
            parse("/dance"),
            Err(CommandError::Unknown("dance".to_owned()))
        );
    }

    #[test]
    fn parses_room_and_preference_commands() {
        assert_eq!(
            parse("/add  Nova ").expect("parse"),
            Some(Command::AddMember("Nova".to_owned()))
        );
        assert_eq!(parse("/add"), Err(CommandError::Usage("/add <username>")));
        assert_eq!(
            parse("/add two words"),
            Err(CommandError::Usage("/add <username>"))
        );
        assert_eq!(parse("/kick 8").expect("parse"), Some(Command::Kick(8)));
        assert_eq!(parse("/kick nova"), Err(CommandError::Usage("/kick <user id>")));
        assert_eq!(parse("/leave").expect("parse"), Some(Command::Leave));
        assert_eq!(parse("/end").expect("parse"), Some(Command::EndRoom));
        assert_eq!(parse("/delete-room").expect("parse"), Some(Command::DeleteRoom));
        assert_eq!(parse("/mute").expect("parse"), Some(Command::Mute(true)));
        assert_eq!(parse("/unmute").expect("parse"), Some(Command::Mute(false)));
        assert_eq!(parse("/archive").expect("parse"), Some(Command::Archive(true)));
        assert_eq!(parse("/unblock").expect("parse"), Some(Command::Unblock));
    }

    #[test]
    fn forward_user_requires_numeric_target() {
        assert_eq!(Command::forward_user("12"), Some(12));
        assert_eq!(Command::forward_user("lobby"), None);
    }
}
