//! Credential storage for the client.
//!
//! The session token is never read from ambient state: screens obtain it from
//! a [`SessionStore`] and pass it explicitly to channels and REST calls.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use client_core::Credential;
use thiserror::Error;
use tracing::{debug, info};

const SESSION_KEY_PREFIX: &str = "session";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretStoreError {
    #[error("no stored credential")]
    NotFound,
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("credential store failed: {0}")]
    Backend(String),
}

/// Location of one stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretKey {
    pub service: String,
    pub account: String,
}

impl SecretKey {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

/// Backend holding credentials. Implementations must be shareable across tasks.
pub trait SecretStore: Send + Sync {
    fn put(&self, key: &SecretKey, secret: &str) -> Result<(), SecretStoreError>;

    /// `NotFound` when nothing is stored under `key`.
    fn fetch(&self, key: &SecretKey) -> Result<String, SecretStoreError>;

    /// `NotFound` when nothing was stored under `key`.
    fn remove(&self, key: &SecretKey) -> Result<(), SecretStoreError>;
}

/// Process-lifetime store; clones share the same entries.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    entries: Arc<RwLock<HashMap<SecretKey, String>>>,
}

impl SecretStore for InMemorySecretStore {
    fn put(&self, key: &SecretKey, secret: &str) -> Result<(), SecretStoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), secret.to_owned());
        Ok(())
    }

    fn fetch(&self, key: &SecretKey) -> Result<String, SecretStoreError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(SecretStoreError::NotFound)
    }

    fn remove(&self, key: &SecretKey) -> Result<(), SecretStoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(drop)
            .ok_or(SecretStoreError::NotFound)
    }
}

/// Secret store bound to one service name.
#[derive(Clone)]
pub struct ScopedSecretStore<S: SecretStore> {
    inner: S,
    service: String,
}

impl<S: SecretStore> ScopedSecretStore<S> {
    pub fn new(inner: S, service: impl Into<String>) -> Self {
        Self {
            inner,
            service: service.into(),
        }
    }

    fn key(&self, account: &str) -> SecretKey {
        SecretKey::new(self.service.as_str(), account)
    }

    pub fn set(&self, account: &str, secret: &str) -> Result<(), SecretStoreError> {
        self.inner.put(&self.key(account), secret)
    }

    pub fn get(&self, account: &str) -> Result<String, SecretStoreError> {
        self.inner.fetch(&self.key(account))
    }

    pub fn delete(&self, account: &str) -> Result<(), SecretStoreError> {
        self.inner.remove(&self.key(account))
    }
}

/// Authentication state as seen by screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Logged out, or never logged in.
    Absent,
    /// Logged in with this credential.
    Present(Credential),
}

impl SessionState {
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Absent => None,
            Self::Present(credential) => Some(credential),
        }
    }
}

/// Session token lifecycle for one backend: absent → present → absent.
#[derive(Clone)]
pub struct SessionStore<S: SecretStore> {
    secrets: ScopedSecretStore<S>,
    account: String,
}

impl<S: SecretStore> SessionStore<S> {
    pub fn new(inner: S, service: impl Into<String>, api_base: &str) -> Self {
        Self {
            secrets: ScopedSecretStore::new(inner, service),
            account: session_account_for_api(api_base),
        }
    }

    pub fn state(&self) -> Result<SessionState, SecretStoreError> {
        match self.secrets.get(&self.account) {
            Ok(token) if !token.trim().is_empty() => {
                Ok(SessionState::Present(Credential::new(token)))
            }
            Ok(_) | Err(SecretStoreError::NotFound) => Ok(SessionState::Absent),
            Err(err) => Err(err),
        }
    }

    /// Store the credential returned by login or signup.
    pub fn login(&self, credential: &Credential) -> Result<(), SecretStoreError> {
        self.secrets.set(&self.account, credential.expose())?;
        info!(account = %self.account, "session stored");
        Ok(())
    }

    /// Forget the credential. Logging out twice is not an error.
    pub fn logout(&self) -> Result<(), SecretStoreError> {
        match self.secrets.delete(&self.account) {
            Ok(()) => {
                info!(account = %self.account, "session cleared");
                Ok(())
            }
            Err(SecretStoreError::NotFound) => {
                debug!(account = %self.account, "logout without stored session");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn session_account_for_api(api_base: &str) -> String {
    format!(
        "{SESSION_KEY_PREFIX}:{}",
        api_base.trim().trim_end_matches('/')
    )
}
