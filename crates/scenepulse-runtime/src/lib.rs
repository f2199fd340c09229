//! `scenepulse-runtime` – frame loop orchestration.
//!
//! Ties the transport, performance monitor and scene optimisers together
//! behind a single owner of scene mutation.
//!
//! # Modules
//!
//! - [`coordinator`] – [`SceneCoordinator`][coordinator::SceneCoordinator]:
//!   drains transport events into UI state, animates the avatar, records the
//!   frame, drives LOD switching and advances the benchmark, once per tick.
//! - [`benchmark`] – [`BenchmarkOrchestrator`][benchmark::BenchmarkOrchestrator]:
//!   a non-blocking baseline / optimise / settle / optimized state machine
//!   that yields a [`BenchmarkReport`][scenepulse_types::BenchmarkReport].
//! - [`interaction`] – keyword voice commands and gesture effects.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   installs the global `tracing` subscriber with optional JSON output and
//!   OTLP span export (`OTEL_EXPORTER_OTLP_ENDPOINT`).

pub mod benchmark;
pub mod coordinator;
pub mod interaction;
pub mod telemetry;

pub use benchmark::{
    BenchmarkConfig, BenchmarkOrchestrator, BenchmarkPhase, BenchmarkProgress, BenchmarkTarget,
};
pub use coordinator::{
    CoordinatorConfig, LinkStatus, OptimizationSummary, SceneCoordinator, SceneData,
};
pub use interaction::{GestureEffect, ModelCommand, VoiceEffect, interpret_gesture, interpret_voice};
