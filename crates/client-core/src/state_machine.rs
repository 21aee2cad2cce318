use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Lifecycle of one channel instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChannelLifecycle {
    /// No address was ever supplied.
    Idle,
    /// Address set; the transport is connecting or connected.
    Open,
    /// Address cleared or channel torn down.
    Closed,
}

#[derive(Debug, Clone)]
pub struct ChannelStateMachine {
    state: ChannelLifecycle,
}

impl Default for ChannelStateMachine {
    fn default() -> Self {
        Self {
            state: ChannelLifecycle::Idle,
        }
    }
}

impl ChannelStateMachine {
    pub fn state(&self) -> ChannelLifecycle {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelLifecycle::Open
    }

    pub fn open(&mut self) -> Result<ChannelLifecycle, ClientError> {
        self.transition_from_any_of(
            &[ChannelLifecycle::Idle, ChannelLifecycle::Closed],
            ChannelLifecycle::Open,
            "open",
        )
    }

    pub fn close(&mut self) -> Result<ChannelLifecycle, ClientError> {
        self.transition_from_any_of(&[ChannelLifecycle::Open], ChannelLifecycle::Closed, "close")
    }

    /// Move to `Closed` from any state.
    pub fn teardown(&mut self) -> ChannelLifecycle {
        self.state = ChannelLifecycle::Closed;
        self.state
    }

    fn transition_from_any_of(
        &mut self,
        expected: &[ChannelLifecycle],
        next: ChannelLifecycle,
        action: &str,
    ) -> Result<ChannelLifecycle, ClientError> {
        if !expected.contains(&self.state) {
            return Err(ClientError::invalid_state(self.state, action));
        }
        self.state = next;
        Ok(next)
    }
}
