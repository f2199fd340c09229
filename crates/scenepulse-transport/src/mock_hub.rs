//! [`MockHub`] – a local stand-in for the sensor hub.
//!
//! Accepts WebSocket clients and, per client:
//!
//! * sends `{"type":"info","payload":"Connected to mock WS server"}` on connect,
//! * then a detection, a gesture and a voice envelope, each on its own timer,
//! * logs every frame the client sends back.
//!
//! Values rotate through fixed tables so a session is reproducible.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use scenepulse_types::{EventKind, PulseError};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::codec::encode_frame;

/// Port used when `MOCK_WS_PORT` is unset.
pub const DEFAULT_PORT: u16 = 8765;

pub const WELCOME: &str = "Connected to mock WS server";

const GESTURES: [&str; 3] = ["thumbs_up", "peace", "none"];
const PHRASES: [&str; 5] = ["Turn red", "Make it blue", "bright", "dark", "spin"];

/// Emission periods for each envelope kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockHubConfig {
    pub detection_every: Duration,
    pub gesture_every: Duration,
    pub voice_every: Duration,
}

impl Default for MockHubConfig {
    fn default() -> Self {
        Self {
            detection_every: Duration::from_millis(3000),
            gesture_every: Duration::from_millis(4500),
            voice_every: Duration::from_millis(7000),
        }
    }
}

pub struct MockHub {
    config: MockHubConfig,
}

impl MockHub {
    pub fn new(config: MockHubConfig) -> Self {
        Self { config }
    }

    /// Bind `0.0.0.0:<port>`.
    pub async fn bind(port: u16) -> Result<TcpListener, PulseError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        TcpListener::bind(addr)
            .await
            .map_err(|e| PulseError::Connection(format!("bind {addr}: {e}")))
    }

    /// Serve clients from `listener` until the task is dropped.
    pub async fn serve(self, listener: TcpListener) -> Result<(), PulseError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "mock hub listening");
        }
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let config = self.config;
                    tokio::spawn(async move {
                        if let Err(e) = handle_peer(stream, peer, config).await {
                            warn!(%peer, error = %e, "mock hub client error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "mock hub accept error"),
            }
        }
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new(MockHubConfig::default())
    }
}

async fn handle_peer(
    stream: TcpStream,
    peer: SocketAddr,
    config: MockHubConfig,
) -> Result<(), PulseError> {
    let ws = accept_async(stream)
        .await
        .map_err(|e| PulseError::Connection(format!("handshake from {peer}: {e}")))?;
    info!(%peer, "mock hub client connected");
    let (mut tx, mut rx) = ws.split();

    let send = |text: String| Message::Text(text.into());
    tx.send(send(encode_frame(EventKind::Info, &json!(WELCOME))))
        .await
        .map_err(|e| PulseError::Connection(e.to_string()))?;

    let mut detections = interval(config.detection_every);
    let mut gestures = interval(config.gesture_every);
    let mut voices = interval(config.voice_every);
    let mut seq: usize = 0;

    loop {
        let frame = tokio::select! {
            _ = detections.tick() => encode_frame(EventKind::Detection, &detection_payload(seq)),
            _ = gestures.tick() => encode_frame(EventKind::Gesture, &gesture_payload(seq)),
            _ = voices.tick() => encode_frame(EventKind::Voice, &voice_payload(seq)),
            incoming = rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    info!(%peer, frame = %text.as_str(), "mock hub received");
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(%peer, error = %e, "mock hub read error");
                    break;
                }
            },
        };
        seq = seq.wrapping_add(1);
        if tx.send(send(frame)).await.is_err() {
            break;
        }
    }

    info!(%peer, "mock hub client disconnected");
    Ok(())
}

/// Interval whose first tick is one period out, so only the welcome is
/// sent immediately.
fn interval(period: Duration) -> tokio::time::Interval {
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

fn detection_payload(seq: usize) -> Value {
    let step = (seq % 8) as f32;
    json!([{
        "class": "person",
        "confidence": 0.55 + 0.05 * (seq % 9) as f32,
        "x": (step * 0.5) % 4.0,
        "y": 1,
        "z": (4.0 - step * 0.5) % 4.0,
    }])
}

fn gesture_payload(seq: usize) -> Value {
    json!({ "type": GESTURES[seq % GESTURES.len()] })
}

fn voice_payload(seq: usize) -> Value {
    json!(PHRASES[seq % PHRASES.len()])
}
