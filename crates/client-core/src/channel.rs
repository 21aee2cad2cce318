use tracing::{debug, trace, warn};

use crate::{
    address::ChannelAddress,
    codec,
    state_machine::{ChannelLifecycle, ChannelStateMachine},
    types::{Event, OutboundEvent},
};

/// Monotonic counter identifying one underlying connection of a channel.
pub type Generation = u64;

/// Work the runtime must perform after a state transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEffect {
    /// Release the transport of `generation`.
    CloseTransport { generation: Generation },
    /// Buffered events were discarded; subscribers must drop derived state.
    Reset,
    /// Start a transport for `address`, tagging its signals with `generation`.
    OpenTransport {
        generation: Generation,
        address: ChannelAddress,
    },
}

/// Change published to channel subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    Reset,
    Connected(bool),
    /// Event buffered at `received[index]` of connection `generation`.
    Event {
        generation: Generation,
        index: usize,
        event: Event,
    },
}

/// Observable channel state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    /// Connection the buffer belongs to; 0 before the first one opens.
    pub generation: Generation,
    pub connected: bool,
    /// Decoded events in wire arrival order for the current connection.
    pub received: Vec<Event>,
}

/// Transport-agnostic channel state machine.
///
/// The runtime owns one `ChannelCore`, feeds it address changes and
/// transport signals, and executes the returned [`ChannelEffect`]s.
#[derive(Debug, Default)]
pub struct ChannelCore {
    lifecycle: ChannelStateMachine,
    address: Option<ChannelAddress>,
    generation: Generation,
    /// A connect attempt is in flight and has not yet opened or failed.
    connecting: bool,
    state: ChannelState,
}

impl ChannelCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> ChannelLifecycle {
        self.lifecycle.state()
    }

    pub fn address(&self) -> Option<&ChannelAddress> {
        self.address.as_ref()
    }

    /// Generation of the current (or last) connection.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn connected(&self) -> bool {
        self.state.connected
    }

    pub fn received(&self) -> &[Event] {
        &self.state.received
    }

    /// Point the channel at `address`.
    ///
    /// The same address is a no-op. A different one closes the current
    /// transport and discards its events before the new transport opens.
    pub fn set_address(&mut self, address: Option<ChannelAddress>) -> Vec<ChannelEffect> {
        if self.address == address {
            return Vec::new();
        }

        let mut effects = self.close_current();
        if let Some(address) = address {
            effects.extend(self.open(address));
        }
        effects
    }

    /// Replace the current connection with a fresh one to the same address.
    pub fn reopen(&mut self) -> Vec<ChannelEffect> {
        let Some(address) = self.address.clone() else {
            return Vec::new();
        };
        let mut effects = self.close_current();
        effects.extend(self.open(address));
        effects
    }

    /// Close for good; later signals from any generation are ignored.
    pub fn teardown(&mut self) -> Vec<ChannelEffect> {
        let effects = self.close_current();
        self.lifecycle.teardown();
        effects
    }

    /// Transport of `generation` finished its handshake.
    pub fn on_opened(&mut self, generation: Generation) -> Option<ChannelUpdate> {
        if !self.is_current(generation) || self.state.connected {
            return None;
        }
        self.connecting = false;
        self.state.connected = true;
        debug!(generation, "channel connected");
        Some(ChannelUpdate::Connected(true))
    }

    /// Transport of `generation` failed to connect or went away.
    ///
    /// A failed first attempt is reported too, so subscribers learn the
    /// channel is offline without waiting for a connection that never came.
    pub fn on_closed(&mut self, generation: Generation) -> Option<ChannelUpdate> {
        if !self.is_current(generation) || !(self.state.connected || self.connecting) {
            return None;
        }
        if self.state.connected {
            debug!(generation, "channel disconnected");
        } else {
            debug!(generation, "channel connect failed");
        }
        self.connecting = false;
        self.state.connected = false;
        Some(ChannelUpdate::Connected(false))
    }

    /// Decode and buffer one inbound frame. Malformed frames leave no trace.
    pub fn on_frame(&mut self, generation: Generation, frame: &[u8]) -> Option<ChannelUpdate> {
        if !self.is_current(generation) {
            trace!(generation, current = self.generation, "dropping stale frame");
            return None;
        }
        let event = codec::decode_bytes(frame)?;
        let index = self.state.received.len();
        self.state.received.push(event.clone());
        Some(ChannelUpdate::Event {
            generation,
            index,
            event,
        })
    }

    /// Encoded frame for `event`, or `None` when there is nowhere to send it.
    pub fn outbound_frame(&self, event: &OutboundEvent) -> Option<String> {
        if !self.lifecycle.is_open() || !self.state.connected {
            trace!(?event, "dropping send while disconnected");
            return None;
        }
        Some(codec::encode_outbound(event))
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.lifecycle.is_open() && generation == self.generation
    }

    fn close_current(&mut self) -> Vec<ChannelEffect> {
        if !self.lifecycle.is_open() {
            self.address = None;
            return Vec::new();
        }
        if let Err(err) = self.lifecycle.close() {
            warn!(error = %err, "channel close rejected");
        }
        self.address = None;
        self.connecting = false;
        self.state = ChannelState {
            generation: self.generation,
            ..ChannelState::default()
        };
        vec![
            ChannelEffect::CloseTransport {
                generation: self.generation,
            },
            ChannelEffect::Reset,
        ]
    }

    fn open(&mut self, address: ChannelAddress) -> Option<ChannelEffect> {
        if let Err(err) = self.lifecycle.open() {
            warn!(error = %err, "channel open rejected");
            return None;
        }
        self.generation = self.generation.wrapping_add(1);
        self.connecting = true;
        self.state = ChannelState {
            generation: self.generation,
            ..ChannelState::default()
        };
        self.address = Some(address.clone());
        debug!(
            generation = self.generation,
            target = %address.target(),
            "channel opening"
        );
        Some(ChannelEffect::OpenTransport {
            generation: self.generation,
            address,
        })
    }
}
