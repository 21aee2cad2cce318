use std::time::{Duration, Instant};

use crate::types::OutboundEvent;

/// Turns composer input changes into outbound typing events.
///
/// An event is produced only when the input flips between empty and
/// non-empty. With an idle timeout, a quiet composer also stops the
/// indicator once the timeout elapses.
#[derive(Debug, Clone, Default)]
pub struct TypingEmitter {
    active: bool,
    idle_timeout: Option<Duration>,
    last_input_at: Option<Instant>,
}

impl TypingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout: Some(idle_timeout),
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record the current composer text.
    pub fn on_input(&mut self, text: &str, now: Instant) -> Option<OutboundEvent> {
        let typing = !text.trim().is_empty();
        if typing {
            self.last_input_at = Some(now);
        }
        self.transition(typing)
    }

    /// The composed message was sent and the input cleared.
    pub fn on_sent(&mut self) -> Option<OutboundEvent> {
        self.transition(false)
    }

    /// Stop the indicator after the idle timeout, if one is configured.
    pub fn poll_idle(&mut self, now: Instant) -> Option<OutboundEvent> {
        let (Some(timeout), Some(last)) = (self.idle_timeout, self.last_input_at) else {
            return None;
        };
        if now.saturating_duration_since(last) < timeout {
            return None;
        }
        self.transition(false)
    }

    fn transition(&mut self, typing: bool) -> Option<OutboundEvent> {
        if typing == self.active {
            return None;
        }
        self.active = typing;
        if !typing {
            self.last_input_at = None;
        }
        Some(OutboundEvent::Typing { is_typing: typing })
    }
}
