//! Performance rows and benchmark reports.
//!
//! Field names serialise in camelCase so exported JSON matches the shape the
//! dashboard already reads (`frameTimeMs`, `timestampMs`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One frame's worth of renderer statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub fps: f64,
    pub frame_time_ms: f64,
    pub draw_calls: u64,
    pub triangle_count: u64,
    /// Host memory in megabytes; `None` when the platform does not expose it.
    pub memory_mb: Option<f64>,
    pub timestamp_ms: i64,
}

/// A single benchmark sample: the monitor's latest row plus scene stats at
/// the moment the sample was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSnapshot {
    pub timestamp_ms: i64,
    pub metrics: PerformanceSample,
    pub scene_objects: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMeta {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Before/after measurement produced once per benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub meta: BenchmarkMeta,
    pub baseline: Vec<PerfSnapshot>,
    pub optimized: Vec<PerfSnapshot>,
}

/// Per-phase averages derived from a [`BenchmarkReport`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhaseSummary {
    pub samples: usize,
    pub mean_fps: f64,
    pub mean_frame_time_ms: f64,
    pub mean_draw_calls: f64,
    pub mean_triangles: f64,
}

impl PhaseSummary {
    fn from_snapshots(snapshots: &[PerfSnapshot]) -> Self {
        if snapshots.is_empty() {
            return Self::default();
        }
        let n = snapshots.len() as f64;
        let sum = |f: fn(&PerformanceSample) -> f64| {
            snapshots.iter().map(|s| f(&s.metrics)).sum::<f64>() / n
        };
        Self {
            samples: snapshots.len(),
            mean_fps: sum(|m| m.fps),
            mean_frame_time_ms: sum(|m| m.frame_time_ms),
            mean_draw_calls: sum(|m| m.draw_calls as f64),
            mean_triangles: sum(|m| m.triangle_count as f64),
        }
    }
}

/// Comparison of the two phases; deltas are `optimized - baseline`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkSummary {
    pub baseline: PhaseSummary,
    pub optimized: PhaseSummary,
    pub fps_delta: f64,
    pub frame_time_delta_ms: f64,
    pub triangle_delta: f64,
}

impl BenchmarkReport {
    pub fn summary(&self) -> BenchmarkSummary {
        let baseline = PhaseSummary::from_snapshots(&self.baseline);
        let optimized = PhaseSummary::from_snapshots(&self.optimized);
        BenchmarkSummary {
            baseline,
            optimized,
            fps_delta: optimized.mean_fps - baseline.mean_fps,
            frame_time_delta_ms: optimized.mean_frame_time_ms - baseline.mean_frame_time_ms,
            triangle_delta: optimized.mean_triangles - baseline.mean_triangles,
        }
    }
}
