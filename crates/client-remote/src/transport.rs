use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use client_core::{ChannelAddress, ClientError, Generation};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Inbound frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, ClientError>> + Send>>;

/// An established bidirectional connection.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections for channel addresses.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, address: &ChannelAddress) -> Result<Connection, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    Opened,
    Frame(Vec<u8>),
    Closed,
}

/// Lifecycle signal of one transport, tagged with its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSignal {
    pub generation: Generation,
    pub kind: SignalKind,
}

/// One live connection attempt.
///
/// Signals flow to the owning channel until [`Transport::close`] is called or
/// the transport is dropped; after that the connection is released and no
/// further signals are produced.
#[derive(Debug)]
pub struct Transport {
    generation: Generation,
    stop: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl Transport {
    /// Start connecting in the background. Must be called inside a tokio runtime.
    pub fn open(
        connector: Arc<dyn Connector>,
        address: ChannelAddress,
        generation: Generation,
        signals: mpsc::UnboundedSender<TransportSignal>,
    ) -> Self {
        let stop = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let task = TransportTask {
            generation,
            signals,
            outbound_rx,
            stop: stop.child_token(),
            connected: connected.clone(),
        };
        tokio::spawn(task.run(connector, address));

        Self {
            generation,
            stop,
            outbound,
            connected,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue a text frame. Returns `false` when nothing was queued.
    pub fn send(&self, frame: String) -> bool {
        if !self.is_connected() {
            trace!(generation = self.generation, "transport not connected, frame dropped");
            return false;
        }
        self.outbound.send(frame).is_ok()
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&self) {
        if self.stop.is_cancelled() {
            return;
        }
        debug!(generation = self.generation, "closing transport");
        self.connected.store(false, Ordering::Release);
        self.stop.cancel();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

struct TransportTask {
    generation: Generation,
    signals: mpsc::UnboundedSender<TransportSignal>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    stop: CancellationToken,
    connected: Arc<AtomicBool>,
}

impl TransportTask {
    async fn run(mut self, connector: Arc<dyn Connector>, address: ChannelAddress) {
        let connection = tokio::select! {
            _ = self.stop.cancelled() => return,
            result = connector.connect(&address) => result,
        };

        let Connection {
            mut sink,
            mut stream,
        } = match connection {
            Ok(connection) => connection,
            Err(err) => {
                warn!(
                    generation = self.generation,
                    target = %address.target(),
                    error = %err,
                    "transport connect failed"
                );
                self.signal(SignalKind::Closed);
                return;
            }
        };

        if self.stop.is_cancelled() {
            let _ = sink.close().await;
            return;
        }

        self.connected.store(true, Ordering::Release);
        self.signal(SignalKind::Opened);

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                outbound = self.outbound_rx.recv() => {
                    let Some(text) = outbound else { break };
                    if let Err(err) = sink.send(text).await {
                        warn!(generation = self.generation, error = %err, "transport send failed");
                        break;
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(frame)) => self.signal(SignalKind::Frame(frame.into_bytes())),
                    Some(Err(err)) => {
                        warn!(
                            generation = self.generation,
                            error = %err,
                            "transport receive failed"
                        );
                        break;
                    }
                    None => {
                        debug!(generation = self.generation, "transport closed by peer");
                        break;
                    }
                },
            }
        }

        self.connected.store(false, Ordering::Release);
        if let Err(err) = sink.close().await {
            trace!(generation = self.generation, error = %err, "transport close failed");
        }
        self.signal(SignalKind::Closed);
    }

    fn signal(&self, kind: SignalKind) {
        // Closing is silent: the owner already dropped this generation.
        if self.stop.is_cancelled() {
            return;
        }
        let _ = self.signals.send(TransportSignal {
            generation: self.generation,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use client_core::{ClientErrorCategory, ConversationTarget, Credential};
    use futures::channel::mpsc as memory;
    use tokio::time::timeout;

    use super::*;

    type Inbound = Result<Frame, ClientError>;
    type PeerEnds = (
        memory::UnboundedReceiver<String>,
        memory::UnboundedSender<Inbound>,
    );

    struct PairConnector {
        peer: std::sync::Mutex<Option<PeerEnds>>,
        to_client: std::sync::Mutex<Option<memory::UnboundedReceiver<Inbound>>>,
        from_client: std::sync::Mutex<Option<memory::UnboundedSender<String>>>,
    }

    impl PairConnector {
        fn new() -> Arc<Self> {
            let (from_client_tx, from_client_rx) = memory::unbounded();
            let (to_client_tx, to_client_rx) = memory::unbounded();
            Arc::new(Self {
                peer: std::sync::Mutex::new(Some((from_client_rx, to_client_tx))),
                to_client: std::sync::Mutex::new(Some(to_client_rx)),
                from_client: std::sync::Mutex::new(Some(from_client_tx)),
            })
        }

        fn take_peer(&self) -> PeerEnds {
            self.peer
                .lock()
                .expect("lock")
                .take()
                .expect("peer should be available once")
        }
    }

    #[async_trait]
    impl Connector for PairConnector {
        async fn connect(&self, _address: &ChannelAddress) -> Result<Connection, ClientError> {
            let stream = self.to_client.lock().expect("lock").take();
            let sink = self.from_client.lock().expect("lock").take();
            match (stream, sink) {
                (Some(stream), Some(sink)) => Ok(Connection {
                    sink: Box::pin(sink.sink_map_err(|err| {
                        let message = err.to_string();
                        ClientError::new(ClientErrorCategory::Network, "memory_send", message)
                    })),
                    stream: Box::pin(stream),
                }),
                _ => Err(ClientError::new(
                    ClientErrorCategory::Network,
                    "memory_connect",
                    "connection already used",
                )),
            }
        }
    }

    fn address() -> ChannelAddress {
        ChannelAddress::new(
            "ws://localhost",
            ConversationTarget::Direct { peer_id: 2 },
            Credential::new("token"),
        )
    }

    async fn next_signal(rx: &mut mpsc::UnboundedReceiver<TransportSignal>) -> TransportSignal {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("signal timeout")
            .expect("signal channel open")
    }

    #[tokio::test]
    async fn relays_frames_in_both_directions() {
        let connector = PairConnector::new();
        let (signals_tx, mut signals) = mpsc::unbounded_channel();
        let transport = Transport::open(connector.clone(), address(), 4, signals_tx);
        let (mut from_client, to_client) = connector.take_peer();

        assert_eq!(
            next_signal(&mut signals).await,
            TransportSignal {
                generation: 4,
                kind: SignalKind::Opened
            }
        );
        assert!(transport.is_connected());

        to_client
            .unbounded_send(Ok(Frame::Text("hello".to_owned())))
            .expect("peer send");
        assert_eq!(
            next_signal(&mut signals).await.kind,
            SignalKind::Frame(b"hello".to_vec())
        );

        assert!(transport.send("outbound".to_owned()));
        let received = timeout(Duration::from_secs(2), from_client.next())
            .await
            .expect("peer receive timeout");
        assert_eq!(received.as_deref(), Some("outbound"));
    }

    #[tokio::test]
    async fn peer_disconnect_signals_closed() {
        let connector = PairConnector::new();
        let (signals_tx, mut signals) = mpsc::unbounded_channel();
        let transport = Transport::open(connector.clone(), address(), 1, signals_tx);
        let (_from_client, to_client) = connector.take_peer();

        assert_eq!(next_signal(&mut signals).await.kind, SignalKind::Opened);
        drop(to_client);
        assert_eq!(next_signal(&mut signals).await.kind, SignalKind::Closed);
        assert!(!transport.is_connected());
        assert!(!transport.send("late".to_owned()));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_silent() {
        let connector = PairConnector::new();
        let (signals_tx, mut signals) = mpsc::unbounded_channel();
        let transport = Transport::open(connector.clone(), address(), 1, signals_tx);
        let (mut from_client, to_client) = connector.take_peer();
        assert_eq!(next_signal(&mut signals).await.kind, SignalKind::Opened);

        transport.close();
        transport.close();
        assert!(!transport.is_connected());

        // The connection is released: the peer sees its inbound stream end.
        let end = timeout(Duration::from_secs(2), from_client.next())
            .await
            .expect("peer should observe close");
        assert_eq!(end, None);

        let _ = to_client.unbounded_send(Ok(Frame::Text("ignored".to_owned())));
        drop(transport);
        assert!(
            timeout(Duration::from_millis(100), signals.recv())
                .await
                .map_or(true, |signal| signal.is_none()),
            "no signal may follow close"
        );
    }

    #[tokio::test]
    async fn failed_connect_signals_closed_without_open() {
        let connector = PairConnector::new();
        // Consume the single connection so the next attempt fails.
        let (signals_tx, mut signals) = mpsc::unbounded_channel();
        let first = Transport::open(connector.clone(), address(), 1, signals_tx.clone());
        assert_eq!(next_signal(&mut signals).await.kind, SignalKind::Opened);

        let second = Transport::open(connector, address(), 2, signals_tx);
        assert_eq!(
            next_signal(&mut signals).await,
            TransportSignal {
                generation: 2,
                kind: SignalKind::Closed
            }
        );
        assert!(!second.is_connected());
        drop(first);
    }
}
