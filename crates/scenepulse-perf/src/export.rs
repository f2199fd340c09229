//! JSON report artifacts.
//!
//! | Artifact | File name |
//! |---|---|
//! | monitor report | `perf-report-<timestamp>.json` |
//! | benchmark report | `benchmark-<timestamp>.json` |
//!
//! The timestamp is ISO 8601 UTC with millis and `-` in place of `:`, e.g.
//! `2026-03-01T12-30-05.000Z`, so names are valid on every filesystem.
//! Both are pretty-printed UTF-8 JSON. A failed write leaves the in-memory
//! report untouched so the caller can retry.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scenepulse_types::{BenchmarkReport, PerformanceSample, PulseError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::monitor::RendererStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SceneStats {
    pub objects: usize,
}

/// Monitor state plus scene stats at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfReport {
    pub timestamp: DateTime<Utc>,
    pub metrics: Option<PerformanceSample>,
    pub history: Vec<PerformanceSample>,
    pub renderer_info: Option<RendererStats>,
    pub memory: Option<f64>,
    pub scene_stats: SceneStats,
}

/// `<prefix>-<YYYY-MM-DDTHH-MM-SS.mmmZ>.json`
pub fn report_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{}.json", at.format("%Y-%m-%dT%H-%M-%S%.3fZ"))
}

pub fn write_perf_report(dir: &Path, report: &PerfReport) -> Result<PathBuf, PulseError> {
    write_json(dir, &report_file_name("perf-report", report.timestamp), report)
}

pub fn write_benchmark_report(dir: &Path, report: &BenchmarkReport) -> Result<PathBuf, PulseError> {
    write_json(dir, &report_file_name("benchmark", report.meta.timestamp), report)
}

fn write_json<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<PathBuf, PulseError> {
    fs::create_dir_all(dir)
        .map_err(|e| PulseError::Export(format!("create {}: {e}", dir.display())))?;
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| PulseError::Export(format!("serialize {file_name}: {e}")))?;
    let path = dir.join(file_name);
    fs::write(&path, raw)
        .map_err(|e| PulseError::Export(format!("write {}: {e}", path.display())))?;
    info!(path = %path.display(), "report exported");
    Ok(path)
}
