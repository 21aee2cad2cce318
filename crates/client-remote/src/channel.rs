use std::sync::{Arc, PoisonError, RwLock};

use client_core::{
    ChannelAddress, ChannelCore, ChannelEffect, ChannelState, ChannelUpdate, Event, OutboundEvent,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

use crate::transport::{Connector, SignalKind, Transport, TransportSignal};

const COMMAND_CAPACITY: usize = 64;
const UPDATE_CAPACITY: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel runtime has stopped")]
    Closed,
}

#[derive(Debug)]
enum ChannelCommand {
    SetAddress(Option<ChannelAddress>),
    Send(OutboundEvent),
    Reconnect,
    Shutdown,
}

/// Handle to a live conversation channel.
///
/// Clones share one runtime task. The connection is released when
/// [`Channel::shutdown`] is called or the last handle is dropped.
#[derive(Clone, Debug)]
pub struct Channel {
    commands: mpsc::Sender<ChannelCommand>,
    updates: broadcast::Sender<ChannelUpdate>,
    core: Arc<RwLock<ChannelCore>>,
}

impl Channel {
    /// Start the channel runtime, optionally connecting right away.
    pub fn spawn(connector: Arc<dyn Connector>, address: Option<ChannelAddress>) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let core = Arc::new(RwLock::new(ChannelCore::new()));

        let runtime = ChannelRuntime::new(connector, core.clone(), updates.clone(), command_rx);
        tokio::spawn(runtime.run(address));

        Self {
            commands,
            updates,
            core,
        }
    }

    /// Point the channel at a different conversation, or detach it with `None`.
    pub async fn set_address(&self, address: Option<ChannelAddress>) -> Result<(), ChannelError> {
        self.command(ChannelCommand::SetAddress(address)).await
    }

    /// Send an event. Dropped silently while disconnected.
    pub async fn send(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        self.command(ChannelCommand::Send(event)).await
    }

    /// Replace the connection with a fresh one to the same address.
    pub async fn reconnect(&self) -> Result<(), ChannelError> {
        self.command(ChannelCommand::Reconnect).await
    }

    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        self.command(ChannelCommand::Shutdown).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelUpdate> {
        self.updates.subscribe()
    }

    pub fn connected(&self) -> bool {
        self.read_core(|core| core.connected())
    }

    /// Events received on the current connection, in arrival order.
    pub fn received(&self) -> Vec<Event> {
        self.read_core(|core| core.received().to_vec())
    }

    pub fn state(&self) -> ChannelState {
        self.read_core(|core| core.state().clone())
    }

    pub fn address(&self) -> Option<ChannelAddress> {
        self.read_core(|core| core.address().cloned())
    }

    async fn command(&self, command: ChannelCommand) -> Result<(), ChannelError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    fn read_core<T>(&self, f: impl FnOnce(&ChannelCore) -> T) -> T {
        let core = self.core.read().unwrap_or_else(PoisonError::into_inner);
        f(&core)
    }
}

struct ChannelRuntime {
    connector: Arc<dyn Connector>,
    core: Arc<RwLock<ChannelCore>>,
    updates: broadcast::Sender<ChannelUpdate>,
    command_rx: mpsc::Receiver<ChannelCommand>,
    signal_tx: mpsc::UnboundedSender<TransportSignal>,
    signal_rx: mpsc::UnboundedReceiver<TransportSignal>,
    transport: Option<Transport>,
}

impl ChannelRuntime {
    fn new(
        connector: Arc<dyn Connector>,
        core: Arc<RwLock<ChannelCore>>,
        updates: broadcast::Sender<ChannelUpdate>,
        command_rx: mpsc::Receiver<ChannelCommand>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            core,
            updates,
            command_rx,
            signal_tx,
            signal_rx,
            transport: None,
        }
    }

    async fn run(mut self, address: Option<ChannelAddress>) {
        if address.is_some() {
            self.handle_command(ChannelCommand::SetAddress(address));
        }

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(ChannelCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(signal) = self.signal_rx.recv() => self.handle_signal(signal),
            }
        }

        let effects = self.with_core(ChannelCore::teardown);
        self.apply_effects(effects);
        debug!("channel runtime stopped");
    }

    fn handle_command(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::SetAddress(address) => {
                let effects = self.with_core(|core| core.set_address(address));
                self.apply_effects(effects);
            }
            ChannelCommand::Reconnect => {
                let effects = self.with_core(ChannelCore::reopen);
                self.apply_effects(effects);
            }
            ChannelCommand::Send(event) => {
                let frame = self.with_core(|core| core.outbound_frame(&event));
                match (frame, self.transport.as_ref()) {
                    (Some(frame), Some(transport)) => {
                        transport.send(frame);
                    }
                    _ => trace!(?event, "send dropped while disconnected"),
                }
            }
            ChannelCommand::Shutdown => {}
        }
    }

    fn handle_signal(&mut self, signal: TransportSignal) {
        let TransportSignal { generation, kind } = signal;
        let update = match kind {
            SignalKind::Opened => self.with_core(|core| core.on_opened(generation)),
            SignalKind::Closed => self.with_core(|core| core.on_closed(generation)),
            SignalKind::Frame(bytes) => self.with_core(|core| core.on_frame(generation, &bytes)),
        };
        if let Some(update) = update {
            self.emit(update);
        }
    }

    fn apply_effects(&mut self, effects: Vec<ChannelEffect>) {
        for effect in effects {
            match effect {
                ChannelEffect::CloseTransport { generation } => {
                    if let Some(transport) = self.transport.take() {
                        if transport.generation() != generation {
                            trace!(
                                expected = generation,
                                actual = transport.generation(),
                                "closing transport of another generation"
                            );
                        }
                        transport.close();
                    }
                }
                ChannelEffect::Reset => self.emit(ChannelUpdate::Reset),
                ChannelEffect::OpenTransport {
                    generation,
                    address,
                } => {
                    self.transport = Some(Transport::open(
                        self.connector.clone(),
                        address,
                        generation,
                        self.signal_tx.clone(),
                    ));
                }
            }
        }
    }

    fn with_core<T>(&self, f: impl FnOnce(&mut ChannelCore) -> T) -> T {
        let mut core = self.core.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut core)
    }

    fn emit(&self, update: ChannelUpdate) {
        // No subscribers is fine; state stays readable through the handle.
        let _ = self.updates.send(update);
    }
}
