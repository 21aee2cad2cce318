//! Environment-backed runtime configuration for the `novachat` terminal client.

use std::{env, fmt, path::PathBuf, time::Duration};

use client_core::{ConversationTarget, UserId, ws_base_from};
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_WS_BASE: &str = "ws://127.0.0.1:8000";
const DEFAULT_DATA_DIR: &str = "./.novachat";
const PROFILE_FILENAME: &str = "profile.json";
const DEFAULT_TIMELINE_MAX_ITEMS: usize = 1_000;

/// How the client obtains its session credential.
#[derive(Clone, PartialEq, Eq)]
pub enum LoginMethod {
    /// Pre-issued session token.
    Token(String),
    /// Email/password login against the auth endpoint.
    Password { email: String, password: String },
}

impl fmt::Debug for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

/// Runtime configuration used by the terminal client.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// REST base URL.
    pub api_url: String,
    /// WebSocket base, derived from `NOVACHAT_WS_URL` or the API URL.
    pub ws_base: String,
    pub login: Option<LoginMethod>,
    /// Conversation to open on startup.
    pub target: Option<ConversationTarget>,
    /// Directory for non-secret client metadata.
    pub data_dir: PathBuf,
    pub timeline_max_items: usize,
    /// Stop the outbound typing indicator after this much composer silence.
    pub typing_idle_timeout: Option<Duration>,
}

impl CliConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_url = optional_trimmed_env("NOVACHAT_API_URL", &mut lookup)
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "NOVACHAT_API_URL",
                value: api_url,
                reason: "must start with http:// or https://".to_owned(),
            });
        }

        let ws_base = match optional_trimmed_env("NOVACHAT_WS_URL", &mut lookup) {
            Some(raw) => ws_base_from(&raw, DEFAULT_WS_BASE),
            None => ws_base_from(&api_url, DEFAULT_WS_BASE),
        };

        let login = match (
            optional_trimmed_env("NOVACHAT_TOKEN", &mut lookup),
            optional_trimmed_env("NOVACHAT_EMAIL", &mut lookup),
            lookup("NOVACHAT_PASSWORD").filter(|value| !value.is_empty()),
        ) {
            (Some(token), _, _) => Some(LoginMethod::Token(token)),
            (None, Some(email), Some(password)) => Some(LoginMethod::Password { email, password }),
            (None, Some(_), None) => {
                return Err(ConfigError::Missing {
                    key: "NOVACHAT_PASSWORD",
                    reason: "required together with NOVACHAT_EMAIL",
                });
            }
            (None, None, _) => None,
        };

        let peer = parse_optional_i64("NOVACHAT_DM", &mut lookup)?;
        let room = optional_trimmed_env("NOVACHAT_ROOM", &mut lookup);
        let target = match (peer, room) {
            (Some(_), Some(room)) => {
                return Err(ConfigError::InvalidValue {
                    key: "NOVACHAT_ROOM",
                    value: room,
                    reason: "NOVACHAT_DM and NOVACHAT_ROOM are mutually exclusive".to_owned(),
                });
            }
            (Some(peer_id), None) => Some(ConversationTarget::Direct { peer_id }),
            (None, Some(room_id)) => Some(ConversationTarget::Room { room_id }),
            (None, None) => None,
        };

        let data_dir = optional_trimmed_env("NOVACHAT_DATA_DIR", &mut lookup)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let timeline_max_items = parse_optional_usize(
            "NOVACHAT_TIMELINE_MAX_ITEMS",
            DEFAULT_TIMELINE_MAX_ITEMS,
            &mut lookup,
        )?;
        if timeline_max_items == 0 {
            return Err(ConfigError::InvalidValue {
                key: "NOVACHAT_TIMELINE_MAX_ITEMS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        // Zero disables the idle timeout.
        let typing_idle_timeout = parse_optional_u64("NOVACHAT_TYPING_IDLE_MS", &mut lookup)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Ok(Self {
            api_url,
            ws_base,
            login,
            target,
            data_dir,
            timeline_max_items,
            typing_idle_timeout,
        })
    }

    /// Location of the remembered login profile.
    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join(PROFILE_FILENAME)
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// A variable required by another one is unset.
    #[error("missing {key}: {reason}")]
    Missing {
        key: &'static str,
        reason: &'static str,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_i64<F>(key: &'static str, lookup: &mut F) -> Result<Option<UserId>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<UserId>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_u64<F>(key: &'static str, lookup: &mut F) -> Result<Option<u64>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(None);
    };
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, path::Path};

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        CliConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config_from_pairs(&[]).expect("config should parse");
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.ws_base, "ws://127.0.0.1:8000");
        assert_eq!(cfg.login, None);
        assert_eq!(cfg.target, None);
        assert_eq!(cfg.timeline_max_items, DEFAULT_TIMELINE_MAX_ITEMS);
        assert_eq!(cfg.typing_idle_timeout, None);
        assert_eq!(cfg.profile_path(), Path::new("./.novachat/profile.json"));
    }

    #[test]
    fn websocket_base_follows_api_scheme_unless_overridden() {
        let cfg = config_from_pairs(&[("NOVACHAT_API_URL", "https://chat.example.org/api")])
            .expect("config should parse");
        assert_eq!(cfg.ws_base, "wss://chat.example.org/api");

        let cfg = config_from_pairs(&[
            ("NOVACHAT_API_URL", "https://chat.example.org/api"),
            ("NOVACHAT_WS_URL", "wss://rt.example.org"),
        ])
        .expect("config should parse");
        assert_eq!(cfg.ws_base, "wss://rt.example.org");
    }

    #[test]
    fn token_wins_over_password_login() {
        let cfg = config_from_pairs(&[
            ("NOVACHAT_TOKEN", " jwt "),
            ("NOVACHAT_EMAIL", "nova@example.org"),
            ("NOVACHAT_PASSWORD", "pw"),
        ])
        .expect("config should parse");
        assert_eq!(cfg.login, Some(LoginMethod::Token("jwt".to_owned())));

        let cfg = config_from_pairs(&[
            ("NOVACHAT_EMAIL", "nova@example.org"),
            ("NOVACHAT_PASSWORD", " pw with spaces "),
        ])
        .expect("config should parse");
        assert_eq!(
            cfg.login,
            Some(LoginMethod::Password {
                email: "nova@example.org".to_owned(),
                password: " pw with spaces ".to_owned()
            })
        );
        assert!(!format!("{:?}", cfg.login).contains("spaces"));
    }

    #[test]
    fn email_without_password_is_rejected() {
        let err = config_from_pairs(&[("NOVACHAT_EMAIL", "nova@example.org")])
            .expect_err("password should be required");
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "NOVACHAT_PASSWORD",
                ..
            }
        ));
    }

    #[test]
    fn parses_conversation_target() {
        let cfg = config_from_pairs(&[("NOVACHAT_DM", "42")]).expect("config should parse");
        assert_eq!(cfg.target, Some(ConversationTarget::Direct { peer_id: 42 }));

        let cfg = config_from_pairs(&[("NOVACHAT_ROOM", "lobby")]).expect("config should parse");
        assert_eq!(
            cfg.target,
            Some(ConversationTarget::Room {
                room_id: "lobby".to_owned()
            })
        );

        let err = config_from_pairs(&[("NOVACHAT_DM", "1"), ("NOVACHAT_ROOM", "lobby")])
            .expect_err("both targets should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "NOVACHAT_ROOM",
                ..
            }
        ));
    }

    #[test]
    fn rejects_invalid_numeric_values() {
        let err = config_from_pairs(&[("NOVACHAT_DM", "alice")])
            .expect_err("non-numeric peer should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "NOVACHAT_DM",
                ..
            }
        ));

        let err = config_from_pairs(&[("NOVACHAT_TIMELINE_MAX_ITEMS", "0")])
            .expect_err("zero cap should fail");
        assert_eq!(
            err.to_string(),
            "invalid NOVACHAT_TIMELINE_MAX_ITEMS='0': must be at least 1"
        );
    }

    #[test]
    fn typing_idle_timeout_zero_disables() {
        let cfg = config_from_pairs(&[("NOVACHAT_TYPING_IDLE_MS", "3000")])
            .expect("config should parse");
        assert_eq!(cfg.typing_idle_timeout, Some(Duration::from_secs(3)));

        let cfg =
            config_from_pairs(&[("NOVACHAT_TYPING_IDLE_MS", "0")]).expect("config should parse");
        assert_eq!(cfg.typing_idle_timeout, None);
    }

    #[test]
    fn rejects_non_http_api_url() {
        let err = config_from_pairs(&[("NOVACHAT_API_URL", "ftp://x")])
            .expect_err("ftp should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "NOVACHAT_API_URL",
                ..
            }
        ));
    }
}
