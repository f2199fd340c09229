//! Host memory probes.

use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessesToUpdate, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the optional `memory_mb` field.
pub trait MemoryProbe: Send {
    /// Current memory usage in megabytes, or `None` if unavailable.
    fn memory_mb(&mut self) -> Option<f64>;
}

/// Always reports `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn memory_mb(&mut self) -> Option<f64> {
        None
    }
}

/// Resident memory of the current process via `sysinfo`.
///
/// Process tables are comparatively expensive to refresh, so the reading is
/// cached and refreshed at most once per `refresh_every`.
pub struct SysinfoMemoryProbe {
    system: System,
    pid: Option<Pid>,
    refresh_every: Duration,
    last_refresh: Option<Instant>,
    cached: Option<f64>,
}

impl SysinfoMemoryProbe {
    pub fn new() -> Self {
        Self::with_refresh_interval(Duration::from_secs(1))
    }

    pub fn with_refresh_interval(refresh_every: Duration) -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            refresh_every,
            last_refresh: None,
            cached: None,
        }
    }
}

impl Default for SysinfoMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn memory_mb(&mut self) -> Option<f64> {
        let pid = self.pid?;
        let due = self
            .last_refresh
            .is_none_or(|at| at.elapsed() >= self.refresh_every);
        if due {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            self.cached = self
                .system
                .process(pid)
                .map(|process| process.memory() as f64 / BYTES_PER_MB);
            self.last_refresh = Some(Instant::now());
        }
        self.cached
    }
}
