//! `scenepulse-types` – shared data model for the telemetry pipeline.
//!
//! Everything that crosses a crate boundary lives here: the typed sensor
//! [`Event`]s decoded from the transport, the [`PerformanceSample`] rows the
//! monitor records, the [`BenchmarkReport`] handed to the exporter, and the
//! workspace-wide [`PulseError`].

pub mod metrics;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use metrics::{
    BenchmarkMeta, BenchmarkReport, BenchmarkSummary, PerfSnapshot, PerformanceSample,
    PhaseSummary,
};

/// A point or direction in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between `self` and `other`.
    pub fn distance(&self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Discriminant of an [`Event`]; selects the subscriber list on dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Detection,
    Gesture,
    Voice,
    Info,
}

impl EventKind {
    /// Every kind, in wire-documentation order.
    pub const ALL: [EventKind; 4] = [
        EventKind::Detection,
        EventKind::Gesture,
        EventKind::Voice,
        EventKind::Info,
    ];

    /// The `type` string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Detection => "detection",
            EventKind::Gesture => "gesture",
            EventKind::Voice => "voice",
            EventKind::Info => "info",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PulseError::Decode(format!("unknown envelope type '{s}'")))
    }
}

/// A single object reported by the detection stream.
///
/// Detections carry no identity across envelopes: every delivery replaces
/// the previously displayed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label, e.g. `"person"`.
    pub class: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
    /// Scene-space position of the marker.
    pub position: Vec3,
    /// `true` when one or more coordinates were missing on the wire and were
    /// filled from [`Detection::DEFAULT_POSITION`].
    #[serde(default)]
    pub position_estimated: bool,
}

impl Detection {
    /// Per-axis fallback for coordinates the detector did not report.
    pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 1.0, 0.0);
}

/// Recognised hand gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    ThumbsUp,
    Peace,
    None,
    /// Any gesture name this build does not know about.
    #[serde(other)]
    Unknown,
}

/// The current gesture; each delivery replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gesture {
    #[serde(rename = "type")]
    pub kind: GestureKind,
}

/// A raw voice transcript, interpreted by keyword matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceCommand(pub String);

impl VoiceCommand {
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring match.
    pub fn contains_keyword(&self, keyword: &str) -> bool {
        self.0.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// Typed payload of a decoded envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Always a sequence, even when the wire carried a single object.
    Detection(Vec<Detection>),
    Gesture(Gesture),
    Voice(VoiceCommand),
    Info(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Detection(_) => EventKind::Detection,
            Event::Gesture(_) => EventKind::Gesture,
            Event::Voice(_) => EventKind::Voice,
            Event::Info(_) => EventKind::Info,
        }
    }
}

/// An [`Event`] as received from the transport. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub event: Event,
}

impl Envelope {
    /// Stamp `event` with a fresh id and the current receive time.
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// Workspace-wide error type spanning transport, optimisation, benchmark and
/// export failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PulseError {
    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Frame Decode Error: {0}")]
    Decode(String),

    #[error("Transport not connected; '{0}' message dropped")]
    NotConnected(EventKind),

    #[error("Invalid LOD levels: {0}")]
    InvalidLodLevels(String),

    #[error("Mesh simplification failed: {0}")]
    Simplification(String),

    #[error("Scene object {0} not found")]
    ObjectNotFound(u64),

    #[error("Scene object {0} is already a level-of-detail object")]
    AlreadyLod(u64),

    #[error("Performance monitor not ready: no frames recorded yet")]
    MonitorNotReady,

    #[error("A benchmark is already running")]
    BenchmarkAlreadyRunning,

    #[error("Report export failed: {0}")]
    Export(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
