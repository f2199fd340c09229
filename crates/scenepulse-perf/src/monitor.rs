//! [`PerformanceMonitor`] – per-frame statistics and the rolling history.
//!
//! # Algorithm
//!
//! [`PerformanceMonitor::update`] is called once per rendered frame:
//!
//! 1. `frame_time_ms` is the wall-clock delta since the previous call (`0`
//!    on the very first call).
//! 2. `fps = 1000 / frame_time_ms`, computed only once a previous frame
//!    exists and the delta is positive; otherwise the last fps is carried.
//! 3. Draw-call and triangle counts are copied from the renderer stats when
//!    given. Absent stats keep the previous values rather than zeroing them.
//! 4. Memory is read from the [`MemoryProbe`].
//! 5. The sample is pushed onto the history; past capacity the oldest
//!    sample is evicted first.
//!
//! # Example
//!
//! ```rust
//! use scenepulse_perf::{MonitorConfig, NoMemoryProbe, PerformanceMonitor, RendererStats};
//!
//! let mut monitor = PerformanceMonitor::with_probe(MonitorConfig::default(), Box::new(NoMemoryProbe));
//! monitor.update(Some(&RendererStats { draw_calls: 12, triangles: 3_400 }));
//! let report = monitor.report();
//! assert_eq!(report.history.len(), 1);
//! assert_eq!(report.current.unwrap().draw_calls, 12);
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use chrono::Utc;
use scenepulse_types::{PerfSnapshot, PerformanceSample};
use serde::{Deserialize, Serialize};

use crate::export::{PerfReport, SceneStats};
use crate::probe::{MemoryProbe, SysinfoMemoryProbe};

/// Counters read from the renderer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererStats {
    pub draw_calls: u64,
    pub triangles: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Maximum number of samples retained.
    pub history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 300,
        }
    }
}

/// Read-only snapshot returned by [`PerformanceMonitor::report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub current: Option<PerformanceSample>,
    pub history: Vec<PerformanceSample>,
}

// ─────────────────────────────────────────────────────────────────────────────
// PerformanceMonitor
// ─────────────────────────────────────────────────────────────────────────────

pub struct PerformanceMonitor {
    capacity: usize,
    history: VecDeque<PerformanceSample>,
    last_frame: Option<Instant>,
    fps: f64,
    renderer: Option<RendererStats>,
    probe: Box<dyn MemoryProbe>,
}

impl PerformanceMonitor {
    /// Monitor reading process memory through `sysinfo`.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_probe(config, Box::new(SysinfoMemoryProbe::new()))
    }

    pub fn with_probe(config: MonitorConfig, probe: Box<dyn MemoryProbe>) -> Self {
        let capacity = config.history_capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
            last_frame: None,
            fps: 0.0,
            renderer: None,
            probe,
        }
    }

    /// Record a frame ending now.
    pub fn update(&mut self, stats: Option<&RendererStats>) -> PerformanceSample {
        self.update_at(Instant::now(), stats)
    }

    /// Record a frame ending at `now`.
    pub fn update_at(&mut self, now: Instant, stats: Option<&RendererStats>) -> PerformanceSample {
        let frame_time_ms = match self.last_frame {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f64() * 1000.0,
            None => 0.0,
        };
        if self.last_frame.is_some() && frame_time_ms > 0.0 {
            self.fps = 1000.0 / frame_time_ms;
        }
        self.last_frame = Some(now);

        if let Some(stats) = stats {
            self.renderer = Some(*stats);
        }
        let renderer = self.renderer.unwrap_or_default();

        let sample = PerformanceSample {
            fps: self.fps,
            frame_time_ms,
            draw_calls: renderer.draw_calls,
            triangle_count: renderer.triangles,
            memory_mb: self.probe.memory_mb(),
            timestamp_ms: Utc::now().timestamp_millis(),
        };

        self.history.push_back(sample);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        sample
    }

    /// `true` once at least one frame has been recorded.
    pub fn is_receiving_frames(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&PerformanceSample> {
        self.history.back()
    }

    /// Samples in arrival order, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PerformanceSample> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn report(&self) -> MonitorReport {
        MonitorReport {
            current: self.latest().copied(),
            history: self.history.iter().copied().collect(),
        }
    }

    /// The latest sample plus scene stats, as taken by a benchmark.
    pub fn snapshot(&self, scene_objects: Option<usize>) -> Option<PerfSnapshot> {
        self.latest().map(|metrics| PerfSnapshot {
            timestamp_ms: Utc::now().timestamp_millis(),
            metrics: *metrics,
            scene_objects,
        })
    }

    /// Full exportable report.
    pub fn perf_report(&self, scene_objects: usize) -> PerfReport {
        let current = self.latest().copied();
        PerfReport {
            timestamp: Utc::now(),
            metrics: current,
            history: self.history.iter().copied().collect(),
            renderer_info: self.renderer,
            memory: current.and_then(|s| s.memory_mb),
            scene_stats: SceneStats {
                objects: scene_objects,
            },
        }
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("capacity", &self.capacity)
            .field("len", &self.history.len())
            .field("fps", &self.fps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::NoMemoryProbe;
    use std::time::Duration;

    struct FixedProbe(f64);

    impl MemoryProbe for FixedProbe {
        fn memory_mb(&mut self) -> Option<f64> {
            Some(self.0)
        }
    }

    fn monitor(capacity: usize) -> PerformanceMonitor {
        PerformanceMonitor::with_probe(
            MonitorConfig {
                history_capacity: capacity,
            },
            Box::new(NoMemoryProbe),
        )
    }

    #[test]
    fn first_update_has_no_fps() {
        let mut m = monitor(300);
        let sample = m.update_at(Instant::now(), None);
        assert_eq!(sample.frame_time_ms, 0.0);
        assert_eq!(sample.fps, 0.0);
        assert!(m.is_receiving_frames());
    }

    #[test]
    fn fps_is_derived_from_frame_delta() {
        let mut m = monitor(300);
        let t0 = Instant::now();
        m.update_at(t0, None);
        let sample = m.update_at(t0 + Duration::from_millis(20), None);
        assert!((sample.frame_time_ms - 20.0).abs() < 1e-6);
        assert!((sample.fps - 50.0).abs() < 1e-6);
    }

    #[test]
    fn zero_delta_keeps_previous_fps() {
        let mut m = monitor(300);
        let t0 = Instant::now();
        m.update_at(t0, None);
        let t1 = t0 + Duration::from_millis(10);
        m.update_at(t1, None);
        let sample = m.update_at(t1, None);
        assert_eq!(sample.frame_time_ms, 0.0);
        assert!((sample.fps - 100.0).abs() < 1e-6);
    }

    #[test]
    fn absent_renderer_stats_keep_previous_counts() {
        let mut m = monitor(300);
        let t0 = Instant::now();
        m.update_at(
            t0,
            Some(&RendererStats {
                draw_calls: 7,
                triangles: 900,
            }),
        );
        let sample = m.update_at(t0 + Duration::from_millis(16), None);
        assert_eq!(sample.draw_calls, 7);
        assert_eq!(sample.triangle_count, 900);
    }

    #[test]
    fn history_is_bounded_and_keeps_most_recent() {
        let mut m = monitor(300);
        let t0 = Instant::now();
        for i in 0..350u64 {
            m.update_at(
                t0 + Duration::from_millis(i * 16),
                Some(&RendererStats {
                    draw_calls: i,
                    triangles: 0,
                }),
            );
            assert!(m.len() <= 300);
        }
        let calls: Vec<u64> = m.history().map(|s| s.draw_calls).collect();
        assert_eq!(calls.len(), 300);
        assert_eq!(calls, (50..350).collect::<Vec<_>>());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut m = monitor(0);
        m.update(None);
        m.update(None);
        assert_eq!(m.capacity(), 1);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn memory_comes_from_probe() {
        let mut m =
            PerformanceMonitor::with_probe(MonitorConfig::default(), Box::new(FixedProbe(128.5)));
        let sample = m.update(None);
        assert_eq!(sample.memory_mb, Some(128.5));
        assert_eq!(m.perf_report(4).memory, Some(128.5));
    }

    #[test]
    fn report_is_a_detached_copy() {
        let mut m = monitor(300);
        m.update(None);
        let report = m.report();
        m.update(None);
        assert_eq!(report.history.len(), 1);
        assert_eq!(m.report().history.len(), 2);
        assert_eq!(report.current, report.history.last().copied());
    }

    #[test]
    fn snapshot_requires_a_frame() {
        let mut m = monitor(300);
        assert!(m.snapshot(Some(3)).is_none());
        m.update(None);
        let snap = m.snapshot(Some(3)).unwrap();
        assert_eq!(snap.scene_objects, Some(3));
        assert_eq!(Some(&snap.metrics), m.latest());
    }
}
