//! Process-wide counters reported by the `health` tool and endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every task of one server; cheap to update concurrently.
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: DateTime<Utc>,
    plugins_discovered: AtomicU64,
    tools_registered: AtomicU64,
    tool_calls_total: AtomicU64,
    tool_calls_success: AtomicU64,
    tool_calls_error: AtomicU64,
}

/// Point-in-time copy of [`ServerMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub start_time: DateTime<Utc>,
    pub uptime_s: f64,
    pub plugins_discovered: u64,
    pub tools_registered: u64,
    pub tool_calls_total: u64,
    pub tool_calls_success: u64,
    pub tool_calls_error: u64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            plugins_discovered: AtomicU64::new(0),
            tools_registered: AtomicU64::new(0),
            tool_calls_total: AtomicU64::new(0),
            tool_calls_success: AtomicU64::new(0),
            tool_calls_error: AtomicU64::new(0),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Counted once per registration pass; totals accumulate across reloads.
    pub fn record_registration(&self, plugins: usize, tools: usize) {
        self.plugins_discovered
            .fetch_add(plugins as u64, Ordering::Relaxed);
        self.tools_registered.fetch_add(tools as u64, Ordering::Relaxed);
    }

    pub fn record_call(&self, success: bool) {
        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.tool_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tool_calls_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = Utc::now() - self.started_at;
        MetricsSnapshot {
            start_time: self.started_at,
            uptime_s: uptime.num_milliseconds().max(0) as f64 / 1000.0,
            plugins_discovered: self.plugins_discovered.load(Ordering::Relaxed),
            tools_registered: self.tools_registered.load(Ordering::Relaxed),
            tool_calls_total: self.tool_calls_total.load(Ordering::Relaxed),
            tool_calls_success: self.tool_calls_success.load(Ordering::Relaxed),
            tool_calls_error: self.tool_calls_error.load(Ordering::Relaxed),
        }
    }
}
