//! Periodic health checks for a worker's backing resource.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::WORKERS_TARGET;
use super::stats::PoolStats;

/// A resource held by a worker loop, such as a pooled database connection.
pub trait BackingResource: Send {
    /// Returns `false` when the resource is stale and should be replaced.
    fn is_healthy(&mut self) -> bool;
}

/// Opens fresh backing resources for worker loops.
pub trait ResourceFactory: Send + Sync {
    /// Opens a resource for a worker loop that is starting or recycling.
    fn open(&self) -> Box<dyn BackingResource>;
}

/// Factory for workers that hold no external resource.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResources;

struct NoopResource;

impl BackingResource for NoopResource {
    fn is_healthy(&mut self) -> bool {
        true
    }
}

impl ResourceFactory for NoopResources {
    fn open(&self) -> Box<dyn BackingResource> {
        Box::new(NoopResource)
    }
}

/// Checks a worker's resource at most once per interval and replaces it
/// when the check fails.
pub(crate) struct HealthMonitor {
    interval: Duration,
    last_check: Instant,
    resource: Box<dyn BackingResource>,
    factory: Arc<dyn ResourceFactory>,
    stats: Arc<PoolStats>,
}

impl HealthMonitor {
    pub(crate) fn new(
        interval: Duration,
        factory: Arc<dyn ResourceFactory>,
        stats: Arc<PoolStats>,
    ) -> Self {
        Self {
            interval,
            last_check: Instant::now(),
            resource: factory.open(),
            factory,
            stats,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs a check when the interval has elapsed since the last one.
    pub(crate) fn tick(&mut self) {
        if self.last_check.elapsed() < self.interval {
            return;
        }
        self.last_check = Instant::now();
        self.stats.record_health_check();
        if self.resource.is_healthy() {
            debug!(target: WORKERS_TARGET, "backing resource healthy");
            return;
        }
        warn!(target: WORKERS_TARGET, "backing resource stale; reopening");
        self.resource = self.factory.open();
        self.stats.record_recycled();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use rstest::rstest;

    use super::*;

    struct FlakyFactory {
        opened: AtomicUsize,
        healthy: Arc<AtomicBool>,
    }

    struct Flaky(Arc<AtomicBool>);

    impl BackingResource for Flaky {
        fn is_healthy(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl ResourceFactory for FlakyFactory {
        fn open(&self) -> Box<dyn BackingResource> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Box::new(Flaky(Arc::clone(&self.healthy)))
        }
    }

    #[rstest]
    fn stale_resources_are_reopened() {
        let healthy = Arc::new(AtomicBool::new(false));
        let factory = Arc::new(FlakyFactory {
            opened: AtomicUsize::new(0),
            healthy: Arc::clone(&healthy),
        });
        let stats = Arc::new(PoolStats::default());
        let mut monitor = HealthMonitor::new(Duration::ZERO, factory.clone(), stats.clone());

        monitor.tick();
        healthy.store(true, Ordering::SeqCst);
        monitor.tick();

        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.health_checks, 2);
        assert_eq!(snapshot.recycled, 1);
    }

    #[rstest]
    fn checks_wait_for_the_interval() {
        let stats = Arc::new(PoolStats::default());
        let mut monitor =
            HealthMonitor::new(Duration::from_secs(3600), Arc::new(NoopResources), stats.clone());

        monitor.tick();

        assert_eq!(stats.snapshot().health_checks, 0);
    }
}
