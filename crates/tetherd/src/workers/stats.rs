//! Per-pool counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by worker loops.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    completed: AtomicU64,
    failed: AtomicU64,
    lost: AtomicU64,
    restarts: AtomicU64,
    health_checks: AtomicU64,
    recycled: AtomicU64,
}

/// Point-in-time copy of a pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Tasks whose payload returned an outcome.
    pub completed: u64,
    /// Tasks whose payload failed or panicked.
    pub failed: u64,
    /// Tasks dropped because of a resource fault.
    pub lost: u64,
    /// Worker loop restarts.
    pub restarts: u64,
    /// Backing resource checks performed.
    pub health_checks: u64,
    /// Backing resources replaced after a failed check.
    pub recycled: u64,
}

impl PoolStats {
    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lost(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_health_check(&self) {
        self.health_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recycled(&self) {
        self.recycled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            health_checks: self.health_checks.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
        }
    }
}
