//! [`BenchmarkOrchestrator`] – two-phase before/after measurement.
//!
//! # Phases
//!
//! ```text
//! Idle ─start─▶ BaselineSampling ─N samples─▶ Optimizing ─once─▶ Settling
//!                                                                  │ settle
//!   ▲                                                              ▼
//!   └────────── Complete ◀──────N samples────────── OptimizedSampling
//! ```
//!
//! The orchestrator never sleeps. The frame loop calls
//! [`BenchmarkOrchestrator::poll`] once per tick, after the performance
//! monitor has recorded that tick's frame, and the orchestrator advances
//! whenever the next deadline has passed. At most one sample is taken per
//! poll, so every sample reflects a distinct frame.
//!
//! Each sampling phase takes its first sample immediately and the rest at
//! the configured cadence; the phase ends one cadence after its last
//! sample, so a phase lasts `samples × cadence`.

use std::time::{Duration, Instant};

use chrono::Utc;
use scenepulse_perf::PerformanceMonitor;
use scenepulse_types::{BenchmarkMeta, BenchmarkReport, PerfSnapshot, PulseError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BenchmarkPhase {
    Idle,
    BaselineSampling,
    Optimizing,
    Settling,
    OptimizedSampling,
    Complete,
}

impl BenchmarkPhase {
    pub fn is_running(&self) -> bool {
        !matches!(self, BenchmarkPhase::Idle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    /// Samples collected in each phase.
    pub samples: usize,
    pub cadence: Duration,
    pub settle: Duration,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            samples: 15,
            cadence: Duration::from_secs(1),
            settle: Duration::from_secs(1),
        }
    }
}

impl BenchmarkConfig {
    /// e.g. `"30s benchmark (15s baseline, 15s optimized)"`.
    pub fn description(&self) -> String {
        let phase = self.cadence.as_secs_f64() * self.samples as f64;
        format!(
            "{}s benchmark ({}s baseline, {}s optimized)",
            phase * 2.0,
            phase,
            phase
        )
    }
}

/// What the orchestrator measures and optimises.
pub trait BenchmarkTarget {
    /// Snapshot of the monitor's latest frame; `None` if nothing recorded.
    fn sample(&mut self) -> Option<PerfSnapshot>;

    /// Run the optimisation pass. Per-object failures are the target's to
    /// absorb; the pass as a whole cannot fail.
    fn optimize(&mut self);
}

/// Emitted by [`BenchmarkOrchestrator::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum BenchmarkProgress {
    PhaseChanged(BenchmarkPhase),
    Sampled {
        phase: BenchmarkPhase,
        collected: usize,
    },
    Completed(BenchmarkReport),
}

// ─────────────────────────────────────────────────────────────────────────────
// BenchmarkOrchestrator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct BenchmarkOrchestrator {
    config: BenchmarkConfig,
    phase: BenchmarkPhase,
    baseline: Vec<PerfSnapshot>,
    optimized: Vec<PerfSnapshot>,
    next_due: Option<Instant>,
}

impl BenchmarkOrchestrator {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self {
            config,
            phase: BenchmarkPhase::Idle,
            baseline: Vec::new(),
            optimized: Vec::new(),
            next_due: None,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn phase(&self) -> BenchmarkPhase {
        self.phase
    }

    /// Samples collected so far in the current sampling phase.
    pub fn collected(&self) -> usize {
        match self.phase {
            BenchmarkPhase::BaselineSampling => self.baseline.len(),
            BenchmarkPhase::OptimizedSampling => self.optimized.len(),
            _ => 0,
        }
    }

    /// Begin a run at `now`.
    ///
    /// Fails without changing state if a run is in progress or the monitor
    /// has not recorded any frame yet.
    pub fn start(&mut self, now: Instant, monitor: &PerformanceMonitor) -> Result<(), PulseError> {
        if self.phase.is_running() {
            return Err(PulseError::BenchmarkAlreadyRunning);
        }
        if !monitor.is_receiving_frames() {
            return Err(PulseError::MonitorNotReady);
        }
        self.baseline.clear();
        self.optimized.clear();
        self.next_due = Some(now);
        self.enter(BenchmarkPhase::BaselineSampling);
        info!(
            samples = self.config.samples,
            cadence_ms = self.config.cadence.as_millis() as u64,
            "benchmark started"
        );
        Ok(())
    }

    /// Abort the current run, discarding its samples. Returns `false` when
    /// nothing was running.
    pub fn cancel(&mut self) -> bool {
        if !self.phase.is_running() {
            return false;
        }
        warn!(phase = ?self.phase, "benchmark cancelled");
        self.reset();
        true
    }

    /// Advance the state machine to `now`.
    pub fn poll<T>(&mut self, now: Instant, target: &mut T) -> Vec<BenchmarkProgress>
    where
        T: BenchmarkTarget + ?Sized,
    {
        let mut progress = Vec::new();
        loop {
            match self.phase {
                BenchmarkPhase::Idle => break,
                BenchmarkPhase::BaselineSampling | BenchmarkPhase::OptimizedSampling => {
                    let Some(due) = self.next_due.filter(|due| now >= *due) else {
                        break;
                    };
                    if self.collected() < self.config.samples {
                        let Some(snapshot) = target.sample() else {
                            break;
                        };
                        let phase = self.phase;
                        let bucket = if phase == BenchmarkPhase::BaselineSampling {
                            &mut self.baseline
                        } else {
                            &mut self.optimized
                        };
                        bucket.push(snapshot);
                        // Missed slots are skipped, never sampled back to back.
                        let cadence = self.config.cadence;
                        self.next_due = if now.saturating_duration_since(due) >= cadence {
                            Some(now + cadence)
                        } else {
                            Some(due + cadence)
                        };
                        progress.push(BenchmarkProgress::Sampled {
                            phase,
                            collected: bucket.len(),
                        });
                        break;
                    }
                    let next = if self.phase == BenchmarkPhase::BaselineSampling {
                        BenchmarkPhase::Optimizing
                    } else {
                        BenchmarkPhase::Complete
                    };
                    self.enter(next);
                    progress.push(BenchmarkProgress::PhaseChanged(next));
                }
                BenchmarkPhase::Optimizing => {
                    target.optimize();
                    self.next_due = Some(now + self.config.settle);
                    self.enter(BenchmarkPhase::Settling);
                    progress.push(BenchmarkProgress::PhaseChanged(BenchmarkPhase::Settling));
                }
                BenchmarkPhase::Settling => {
                    if self.next_due.is_some_and(|due| now < due) {
                        break;
                    }
                    self.next_due = Some(now);
                    self.enter(BenchmarkPhase::OptimizedSampling);
                    progress.push(BenchmarkProgress::PhaseChanged(
                        BenchmarkPhase::OptimizedSampling,
                    ));
                }
                BenchmarkPhase::Complete => {
                    let report = BenchmarkReport {
                        meta: BenchmarkMeta {
                            timestamp: Utc::now(),
                            description: self.config.description(),
                        },
                        baseline: std::mem::take(&mut self.baseline),
                        optimized: std::mem::take(&mut self.optimized),
                    };
                    let summary = report.summary();
                    info!(
                        fps_delta = summary.fps_delta,
                        frame_time_delta_ms = summary.frame_time_delta_ms,
                        triangle_delta = summary.triangle_delta,
                        "benchmark complete"
                    );
                    self.reset();
                    progress.push(BenchmarkProgress::Completed(report));
                    break;
                }
            }
        }
        progress
    }

    fn enter(&mut self, phase: BenchmarkPhase) {
        info!(from = ?self.phase, to = ?phase, "benchmark phase");
        self.phase = phase;
    }

    fn reset(&mut self) {
        self.phase = BenchmarkPhase::Idle;
        self.baseline.clear();
        self.optimized.clear();
        self.next_due = None;
    }
}
