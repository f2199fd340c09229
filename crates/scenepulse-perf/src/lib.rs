//! `scenepulse-perf` – frame performance monitoring.
//!
//! # Modules
//!
//! - [`monitor`] – [`PerformanceMonitor`]: per-frame fps / frame-time
//!   derivation and the bounded [`PerformanceSample`][scenepulse_types::PerformanceSample]
//!   history.
//! - [`probe`] – host memory probes ([`SysinfoMemoryProbe`], [`NoMemoryProbe`]).
//! - [`export`] – [`PerfReport`] assembly and JSON artifact writers.

pub mod export;
pub mod monitor;
pub mod probe;

pub use export::{PerfReport, SceneStats, write_benchmark_report, write_perf_report};
pub use monitor::{MonitorConfig, MonitorReport, PerformanceMonitor, RendererStats};
pub use probe::{MemoryProbe, NoMemoryProbe, SysinfoMemoryProbe};
