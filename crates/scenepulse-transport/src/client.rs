//! [`TransportClient`] – the connect / pump / reconnect loop.
//!
//! The client owns the connection, the [`ConnectionMachine`] and the
//! subscriber lists. Everything else talks to it through a cloneable
//! [`TransportHandle`]: observe the [`ConnectionState`], queue outbound
//! messages, or request a disconnect.
//!
//! ```text
//! connect ──ok──▶ pump frames ──lost──┐
//!    │                                │
//!    └──err──────────────▶ on_failure ┴──▶ sleep(delay) ──▶ connect
//!                             │
//!                             └─ give up ──▶ Closed (run returns)
//! ```

use std::sync::Arc;
use std::time::Duration;

use scenepulse_types::{Envelope, EventKind, PulseError};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use crate::codec;
use crate::connector::{Connection, Connector, WsConnector};
use crate::reconnect::{ConnectionMachine, ConnectionState, RetryDecision};
use crate::subscribers::SubscriberRegistry;

/// Endpoint and retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8765".to_string(),
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
        }
    }
}

/// Result of [`TransportHandle::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open connection for writing.
    Sent,
    /// The connection was not open; the message was dropped.
    NotConnected,
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable control surface for a running [`TransportClient`].
#[derive(Clone)]
pub struct TransportHandle {
    state_rx: watch::Receiver<ConnectionState>,
    outbound_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl TransportHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A receiver that is notified on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Send `{type: kind, payload}` if the connection is open.
    ///
    /// Messages are never buffered across reconnects: when the connection is
    /// not open the message is dropped with a warning.
    pub fn send(&self, kind: EventKind, payload: &Value) -> SendOutcome {
        if self.state() != ConnectionState::Open {
            warn!(%kind, "{}", PulseError::NotConnected(kind));
            return SendOutcome::NotConnected;
        }
        match self.outbound_tx.send(codec::encode_frame(kind, payload)) {
            Ok(()) => SendOutcome::Sent,
            Err(_) => {
                warn!(%kind, "{}", PulseError::NotConnected(kind));
                SendOutcome::NotConnected
            }
        }
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("state", &self.state())
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

enum SessionEnd {
    Shutdown,
    Lost(String),
}

pub struct TransportClient {
    config: TransportConfig,
    connector: Box<dyn Connector>,
    subscribers: SubscriberRegistry,
    machine: ConnectionMachine,
    state_tx: watch::Sender<ConnectionState>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown_rx: watch::Receiver<bool>,
    handle: TransportHandle,
}

impl TransportClient {
    pub fn new(config: TransportConfig, connector: Box<dyn Connector>) -> Self {
        let machine =
            ConnectionMachine::new(config.max_reconnect_attempts, config.reconnect_delay);
        let (state_tx, state_rx) = watch::channel(machine.state());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = TransportHandle {
            state_rx,
            outbound_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        Self {
            config,
            connector,
            subscribers: SubscriberRegistry::new(),
            machine,
            state_tx,
            outbound_rx,
            shutdown_rx,
            handle,
        }
    }

    /// A client that connects over WebSocket.
    pub fn websocket(config: TransportConfig) -> Self {
        Self::new(config, Box::new(WsConnector))
    }

    /// Register `callback` for envelopes of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&Envelope) + Send + 'static,
    {
        self.subscribers.on(kind, callback);
    }

    pub fn handle(&self) -> TransportHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Run until retries are exhausted or [`TransportHandle::disconnect`] is
    /// called. Always ends in [`ConnectionState::Closed`].
    pub async fn run(mut self) -> ConnectionState {
        info!(url = %self.config.url, "transport starting");

        loop {
            if *self.shutdown_rx.borrow() {
                self.close_for_good();
                break;
            }
            if !self.machine.begin_connect() {
                break;
            }
            self.publish_state();

            let attempt = tokio::select! {
                result = self.connector.connect(&self.config.url) => Some(result),
                _ = shutdown_requested(&mut self.shutdown_rx) => None,
            };
            let Some(result) = attempt else {
                self.close_for_good();
                break;
            };

            match result {
                Ok(mut conn) => {
                    self.machine.on_open();
                    self.publish_state();
                    info!(url = %self.config.url, "connected");

                    match self.pump(conn.as_mut()).await {
                        SessionEnd::Shutdown => {
                            conn.close().await;
                            self.close_for_good();
                            break;
                        }
                        SessionEnd::Lost(reason) => {
                            warn!(url = %self.config.url, %reason, "connection lost");
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.config.url, error = %e, "connection attempt failed");
                }
            }

            self.drop_queued_outbound();

            match self.machine.on_failure() {
                RetryDecision::Retry { attempt, delay } => {
                    self.publish_state();
                    info!(
                        attempt,
                        max = self.config.max_reconnect_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    let stopped = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = shutdown_requested(&mut self.shutdown_rx) => true,
                    };
                    if stopped {
                        self.close_for_good();
                        break;
                    }
                    self.machine.on_retry_due();
                }
                RetryDecision::AlreadyPending => {
                    debug!("reconnect already scheduled");
                }
                RetryDecision::GiveUp => {
                    self.publish_state();
                    error!(
                        url = %self.config.url,
                        attempts = self.machine.attempts(),
                        "reconnect attempts exhausted; transport offline"
                    );
                    break;
                }
            }
        }

        info!("transport stopped");
        self.machine.state()
    }

    /// Read frames and write queued messages until the connection ends.
    async fn pump(&mut self, conn: &mut dyn Connection) -> SessionEnd {
        loop {
            tokio::select! {
                frame = conn.recv() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(PulseError::Decode(e))) => warn!(error = %e, "dropping undecodable frame"),
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("closed by peer".to_string()),
                },
                Some(frame) = self.outbound_rx.recv() => {
                    if let Err(e) = conn.send(frame).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                _ = shutdown_requested(&mut self.shutdown_rx) => return SessionEnd::Shutdown,
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match codec::decode_frame(text) {
            Ok(envelope) => {
                let delivered = self.subscribers.dispatch(&envelope);
                trace!(kind = %envelope.kind(), delivered, "envelope dispatched");
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    fn drop_queued_outbound(&mut self) {
        while let Ok(frame) = self.outbound_rx.try_recv() {
            warn!(frame = %frame, "connection lost before send; message dropped");
        }
    }

    fn close_for_good(&mut self) {
        self.machine.disconnect();
        self.publish_state();
        info!("transport disconnected");
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.machine.state());
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scenepulse_types::Event;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    enum Outcome {
        Fail,
        Open { frames: Vec<String>, hold_open: bool },
        /// Opens, yields these results, then closes.
        Raw(Vec<Result<String, PulseError>>),
    }

    #[derive(Default)]
    struct ScriptedConnector {
        outcomes: Mutex<VecDeque<Outcome>>,
        connects: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedConnector {
        fn with(outcomes: Vec<Outcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>, PulseError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().unwrap().pop_front();
            match next {
                Some(Outcome::Open { frames, hold_open }) => Ok(Box::new(ScriptedConnection {
                    frames: frames.into_iter().map(Ok).collect(),
                    hold_open,
                    sent: Arc::clone(&self.sent),
                })),
                Some(Outcome::Raw(frames)) => Ok(Box::new(ScriptedConnection {
                    frames: frames.into(),
                    hold_open: false,
                    sent: Arc::clone(&self.sent),
                })),
                Some(Outcome::Fail) | None => {
                    Err(PulseError::Connection("connection refused".to_string()))
                }
            }
        }
    }

    struct ScriptedConnection {
        frames: VecDeque<Result<String, PulseError>>,
        hold_open: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn recv(&mut self) -> Option<Result<String, PulseError>> {
            if let Some(frame) = self.frames.pop_front() {
                return Some(frame);
            }
            if self.hold_open {
                std::future::pending::<()>().await;
            }
            None
        }

        async fn send(&mut self, frame: String) -> Result<(), PulseError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn config(max_reconnect_attempts: u32) -> TransportConfig {
        TransportConfig {
            url: "ws://test".to_string(),
            reconnect_delay: Duration::from_millis(5),
            max_reconnect_attempts,
        }
    }

    async fn wait_for_open(handle: &TransportHandle) {
        let mut rx = handle.subscribe_state();
        tokio::time::timeout(TIMEOUT, rx.wait_for(|s| *s == ConnectionState::Open))
            .await
            .expect("timed out waiting for Open")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let connector = ScriptedConnector::default();
        let connects = Arc::clone(&connector.connects);
        let client = TransportClient::new(config(3), Box::new(connector));
        let handle = client.handle();

        let final_state = tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();

        assert_eq!(final_state, ConnectionState::Closed);
        assert_eq!(handle.state(), ConnectionState::Closed);
        // One initial attempt plus three retries, then nothing more.
        assert_eq!(connects.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_and_stream_continues() {
        let frames = vec![
            r#"{"type":"voice","payload":"red"}"#.to_string(),
            "{{ not json".to_string(),
            r#"{"type":"voice","payload":"blue"}"#.to_string(),
        ];
        let connector = ScriptedConnector::with(vec![Outcome::Open {
            frames,
            hold_open: false,
        }]);
        let mut client = TransportClient::new(config(0), Box::new(connector));

        let heard = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&heard);
        client.on(EventKind::Voice, move |env| {
            if let Event::Voice(cmd) = &env.event {
                sink.lock().unwrap().push(cmd.text().to_string());
            }
        });

        let final_state = tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();
        assert_eq!(final_state, ConnectionState::Closed);
        assert_eq!(*heard.lock().unwrap(), ["red", "blue"]);
    }

    #[tokio::test]
    async fn undecodable_frame_keeps_the_session_open() {
        let connector = ScriptedConnector::with(vec![Outcome::Raw(vec![
            Err(PulseError::Decode("binary frame is not UTF-8".to_string())),
            Ok(r#"{"type":"voice","payload":"spin"}"#.to_string()),
        ])]);
        let connects = Arc::clone(&connector.connects);
        let mut client = TransportClient::new(config(0), Box::new(connector));

        let heard = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&heard);
        client.on(EventKind::Voice, move |env| {
            if let Event::Voice(cmd) = &env.event {
                sink.lock().unwrap().push(cmd.text().to_string());
            }
        });

        tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();
        assert_eq!(*heard.lock().unwrap(), ["spin"]);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_detection_reaches_subscriber_as_sequence() {
        let frames =
            vec![r#"{"type":"detection","payload":{"class":"person","confidence":0.8,"x":1,"y":1,"z":1}}"#.to_string()];
        let connector = ScriptedConnector::with(vec![Outcome::Open {
            frames,
            hold_open: false,
        }]);
        let mut client = TransportClient::new(config(0), Box::new(connector));

        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        client.on(EventKind::Detection, move |env| {
            if let Event::Detection(list) = &env.event {
                sink.lock().unwrap().push(list.len());
            }
        });

        tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();
        assert_eq!(*lengths.lock().unwrap(), [1]);
    }

    #[tokio::test]
    async fn reconnects_after_failure_and_resets_attempts() {
        let connector = ScriptedConnector::with(vec![
            Outcome::Fail,
            Outcome::Fail,
            Outcome::Open {
                frames: vec![],
                hold_open: false,
            },
        ]);
        let connects = Arc::clone(&connector.connects);
        let client = TransportClient::new(config(2), Box::new(connector));

        tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();
        // fail, fail, open (resets), lost, then two more failed retries.
        assert_eq!(connects.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn disconnect_while_open_closes_without_retry() {
        let connector = ScriptedConnector::with(vec![Outcome::Open {
            frames: vec![],
            hold_open: true,
        }]);
        let connects = Arc::clone(&connector.connects);
        let client = TransportClient::new(config(5), Box::new(connector));
        let handle = client.handle();
        let task = tokio::spawn(client.run());

        wait_for_open(&handle).await;
        handle.disconnect();

        let final_state = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
        assert_eq!(final_state, ConnectionState::Closed);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_while_open_is_written() {
        let connector = ScriptedConnector::with(vec![Outcome::Open {
            frames: vec![],
            hold_open: true,
        }]);
        let sent = Arc::clone(&connector.sent);
        let client = TransportClient::new(config(0), Box::new(connector));
        let handle = client.handle();
        let task = tokio::spawn(client.run());

        wait_for_open(&handle).await;
        assert_eq!(handle.send(EventKind::Voice, &json!("spin")), SendOutcome::Sent);

        tokio::time::timeout(TIMEOUT, async {
            while sent.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let frame: Value = serde_json::from_str(&sent.lock().unwrap()[0]).unwrap();
        assert_eq!(frame, json!({"type": "voice", "payload": "spin"}));

        handle.disconnect();
        tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn websocket_session_against_mock_hub() {
        use crate::mock_hub::{MockHub, MockHubConfig, WELCOME};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = MockHub::new(MockHubConfig {
            detection_every: Duration::from_millis(20),
            gesture_every: Duration::from_millis(30),
            voice_every: Duration::from_millis(40),
        });
        let server = tokio::spawn(hub.serve(listener));

        let mut client = TransportClient::websocket(TransportConfig {
            url: format!("ws://{addr}"),
            reconnect_delay: Duration::from_millis(5),
            max_reconnect_attempts: 0,
        });
        let (info_tx, mut info_rx) = mpsc::unbounded_channel();
        client.on(EventKind::Info, move |env| {
            if let Event::Info(text) = &env.event {
                let _ = info_tx.send(text.clone());
            }
        });
        let (voice_tx, mut voice_rx) = mpsc::unbounded_channel();
        client.on(EventKind::Voice, move |env| {
            if let Event::Voice(cmd) = &env.event {
                let _ = voice_tx.send(cmd.text().to_string());
            }
        });
        let handle = client.handle();
        let task = tokio::spawn(client.run());

        let welcome = tokio::time::timeout(TIMEOUT, info_rx.recv()).await.unwrap();
        assert_eq!(welcome.as_deref(), Some(WELCOME));
        assert_eq!(handle.state(), ConnectionState::Open);

        let voice = tokio::time::timeout(TIMEOUT, voice_rx.recv()).await.unwrap();
        assert!(voice.is_some_and(|text| !text.is_empty()));
        assert_eq!(handle.send(EventKind::Voice, &json!("spin")), SendOutcome::Sent);

        handle.disconnect();
        let final_state = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
        assert_eq!(final_state, ConnectionState::Closed);
        server.abort();
    }

    #[test]
    fn send_before_open_is_dropped() {
        let client = TransportClient::new(config(5), Box::new(ScriptedConnector::default()));
        let handle = client.handle();
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert_eq!(
            handle.send(EventKind::Info, &json!("hello")),
            SendOutcome::NotConnected
        );
    }

    #[tokio::test]
    async fn disconnect_before_run_never_connects() {
        let connector = ScriptedConnector::default();
        let connects = Arc::clone(&connector.connects);
        let client = TransportClient::new(config(5), Box::new(connector));
        client.handle().disconnect();

        let final_state = tokio::time::timeout(TIMEOUT, client.run()).await.unwrap();
        assert_eq!(final_state, ConnectionState::Closed);
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }
}
