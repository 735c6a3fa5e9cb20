//! Run-time supervision: per-execution monitor, background sampler,
//! deadline enforcement and backend health checks.

mod health;
mod sampler;
mod timeout;

pub use health::{HealthChecker, HealthStatus};
pub use sampler::{ProcessProbe, SamplerHandle, spawn_sampler};
pub use timeout::{Interruption, TimeoutCallback, TimeoutManager};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Snapshots retained per run; the peak is tracked separately
const MAX_SNAPSHOTS: usize = 512;

/// Point-in-time resource reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub memory_bytes: u64,
    pub cpu_percent: Option<f32>,
}

impl ResourceSnapshot {
    pub fn now(memory_bytes: u64, cpu_percent: Option<f32>) -> Self {
        Self {
            timestamp: Utc::now(),
            memory_bytes,
            cpu_percent,
        }
    }
}

/// Lifecycle of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopped,
    Cancelled,
}

#[derive(Debug)]
struct MonitorInner {
    state: MonitorState,
    started: Option<Instant>,
    stopped: Option<Instant>,
    snapshots: VecDeque<ResourceSnapshot>,
    peak_memory: u64,
}

/// Tracks one execution; created fresh per run and discarded after.
///
/// All methods take `&self` so the monitor can be shared with a sampler task.
#[derive(Debug)]
pub struct ExecutionMonitor {
    timeout: Duration,
    memory_limit: u64,
    inner: Mutex<MonitorInner>,
}

impl ExecutionMonitor {
    pub fn new(timeout: Duration, memory_limit: u64) -> Self {
        Self {
            timeout,
            memory_limit,
            inner: Mutex::new(MonitorInner {
                state: MonitorState::Idle,
                started: None,
                stopped: None,
                snapshots: VecDeque::new(),
                peak_memory: 0,
            }),
        }
    }

    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.state == MonitorState::Idle {
            inner.state = MonitorState::Running;
            inner.started = Some(Instant::now());
        }
    }

    pub fn stop(&self) {
        self.finish(MonitorState::Stopped);
    }

    pub fn cancel(&self) {
        self.finish(MonitorState::Cancelled);
    }

    fn finish(&self, state: MonitorState) {
        let mut inner = self.inner.lock();
        if inner.state == MonitorState::Running {
            inner.state = state;
            inner.stopped = Some(Instant::now());
        }
    }

    pub fn state(&self) -> MonitorState {
        self.inner.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == MonitorState::Cancelled
    }

    /// Record a reading; ignored unless the monitor is running
    pub fn record(&self, snapshot: ResourceSnapshot) {
        let mut inner = self.inner.lock();
        if inner.state != MonitorState::Running {
            return;
        }
        inner.peak_memory = inner.peak_memory.max(snapshot.memory_bytes);
        if inner.snapshots.len() == MAX_SNAPSHOTS {
            inner.snapshots.pop_front();
        }
        inner.snapshots.push_back(snapshot);
    }

    /// Time since `start`, frozen at `stop`/`cancel`
    pub fn elapsed_time(&self) -> Duration {
        let inner = self.inner.lock();
        match (inner.started, inner.stopped) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn remaining_time(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed_time())
    }

    pub fn is_timeout(&self) -> bool {
        self.elapsed_time() >= self.timeout
    }

    pub fn is_memory_exceeded(&self) -> bool {
        self.peak_memory() > self.memory_limit
    }

    pub fn peak_memory(&self) -> u64 {
        self.inner.lock().peak_memory
    }

    pub fn snapshots(&self) -> Vec<ResourceSnapshot> {
        self.inner.lock().snapshots.iter().copied().collect()
    }
}
