//! Non-secret login metadata remembered between runs.
//!
//! The session token itself never touches this file; it lives in the session
//! store for the lifetime of the process.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use client_core::{ConversationTarget, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthProfile {
    /// REST base the profile belongs to.
    pub api_url: String,
    pub user_id: UserId,
    pub username: String,
    /// Conversation opened last, offered when no target is configured.
    #[serde(default)]
    pub last_conversation: Option<LastConversation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LastConversation {
    Dm { peer_id: UserId },
    Room { room_id: String },
}

impl From<&ConversationTarget> for LastConversation {
    fn from(target: &ConversationTarget) -> Self {
        match target {
            ConversationTarget::Direct { peer_id } => Self::Dm { peer_id: *peer_id },
            ConversationTarget::Room { room_id } => Self::Room {
                room_id: room_id.clone(),
            },
        }
    }
}

impl From<LastConversation> for ConversationTarget {
    fn from(last: LastConversation) -> Self {
        match last {
            LastConversation::Dm { peer_id } => Self::Direct { peer_id },
            LastConversation::Room { room_id } => Self::Room { room_id },
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed reading profile {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed parsing profile {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed encoding profile: {0}")]
    Encode(serde_json::Error),
    #[error("failed writing profile {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Load the profile when one was saved.
pub fn load_profile(path: &Path) -> Result<Option<AuthProfile>, ProfileError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ProfileError::Read {
                path: path.to_owned(),
                source,
            });
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ProfileError::Parse {
            path: path.to_owned(),
            source,
        })
}

/// Write the profile through a temp file so a crash never leaves it truncated.
pub fn save_profile(path: &Path, profile: &AuthProfile) -> Result<(), ProfileError> {
    let write_err = |path: &Path| {
        let path = path.to_owned();
        move |source: io::Error| ProfileError::Write { path, source }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err(parent))?;
    }

    let encoded = serde_json::to_vec_pretty(profile).map_err(ProfileError::Encode)?;
    let temp_path = temp_path_for(path);
    fs::write(&temp_path, encoded).map_err(write_err(&temp_path))?;
    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        ProfileError::Write {
            path: path.to_owned(),
            source,
        }
    })
}

/// Forget the profile. A missing file is not an error.
pub fn clear_profile(path: &Path) -> Result<(), ProfileError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ProfileError::Write {
            path: path.to_owned(),
            source,
        }),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("profile.json");
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    parent.join(format!(".{file_name}.{nanos}.tmp"))
}
