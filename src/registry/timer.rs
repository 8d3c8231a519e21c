//! In-memory timer and the percentile gauges derived from it.

use super::{DistributionStatisticConfig, MeterId, PauseDetector, TimerHandle};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// A timer that keeps count, total and max in atomics.
///
/// When percentiles are requested, the most recent samples are also kept in a
/// bounded window for the derived gauges to read.
#[derive(Debug)]
pub struct SimpleTimer {
    id: MeterId,
    description: Option<String>,
    distribution: DistributionStatisticConfig,
    pause_detector: PauseDetector,
    count: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    /// (boundary, samples <= boundary), in the order the boundaries were given
    sla_buckets: Vec<(u64, AtomicU64)>,
    samples: Option<Mutex<VecDeque<u64>>>,
    sample_window: usize,
}

impl SimpleTimer {
    pub(crate) fn new(
        id: MeterId,
        description: Option<String>,
        distribution: DistributionStatisticConfig,
        pause_detector: PauseDetector,
        sample_window: usize,
    ) -> Self {
        let sla_buckets = distribution
            .sla_boundaries
            .iter()
            .flatten()
            .map(|boundary| (as_nanos(*boundary), AtomicU64::new(0)))
            .collect();

        let wants_percentiles = distribution
            .percentiles
            .as_ref()
            .is_some_and(|p| !p.is_empty());

        Self {
            id,
            description,
            distribution,
            pause_detector,
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            sla_buckets,
            samples: wants_percentiles
                .then(|| Mutex::new(VecDeque::with_capacity(sample_window))),
            sample_window,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Effective distribution settings, registry defaults applied.
    pub fn distribution(&self) -> &DistributionStatisticConfig {
        &self.distribution
    }

    pub fn pause_detector(&self) -> PauseDetector {
        self.pause_detector
    }

    /// Nearest-rank percentile over the retained sample window.
    pub fn percentile(&self, phi: f64) -> Option<Duration> {
        let samples = self.samples.as_ref()?;
        let mut sorted: Vec<u64> = match samples.lock() {
            Ok(window) => window.iter().copied().collect(),
            Err(_) => return None,
        };
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_unstable();

        let rank = (phi * sorted.len() as f64).ceil() as usize;
        let index = rank.clamp(1, sorted.len()) - 1;
        Some(Duration::from_nanos(sorted[index]))
    }

    /// Cumulative bucket counts, one per SLA boundary.
    pub fn sla_counts(&self) -> Vec<(Duration, u64)> {
        self.sla_buckets
            .iter()
            .map(|(le, count)| (Duration::from_nanos(*le), count.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let percentiles = self
            .distribution
            .percentiles
            .iter()
            .flatten()
            .map(|phi| PercentileValue {
                phi: *phi,
                nanos: self.percentile(*phi).map(as_nanos),
            })
            .collect();

        TimerSnapshot {
            id: self.id.clone(),
            description: self.description.clone(),
            count: self.count(),
            total_nanos: as_nanos(self.total_time()),
            max_nanos: as_nanos(self.max()),
            mean_nanos: as_nanos(self.mean()),
            percentiles,
            sla_buckets: self
                .sla_counts()
                .into_iter()
                .map(|(le, count)| BucketCount {
                    le_nanos: as_nanos(le),
                    count,
                })
                .collect(),
        }
    }
}

impl TimerHandle for SimpleTimer {
    fn id(&self) -> &MeterId {
        &self.id
    }

    fn record(&self, duration: Duration) {
        let nanos = as_nanos(duration);

        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        for (le, count) in &self.sla_buckets {
            if nanos <= *le {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(samples) = &self.samples {
            if let Ok(mut window) = samples.lock() {
                if window.len() == self.sample_window {
                    window.pop_front();
                }
                window.push_back(nanos);
            }
        }

        tracing::trace!(timer = %self.id, elapsed_ns = nanos, "Sample recorded");
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn total_time(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    fn max(&self) -> Duration {
        Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed))
    }
}

/// Gauge reporting one percentile of a timer.
#[derive(Debug, Clone)]
pub struct PercentileGauge {
    id: MeterId,
    phi: f64,
    timer: Arc<SimpleTimer>,
}

impl PercentileGauge {
    pub(crate) fn new(id: MeterId, phi: f64, timer: Arc<SimpleTimer>) -> Self {
        Self { id, phi, timer }
    }

    pub fn id(&self) -> &MeterId {
        &self.id
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    /// The timer this gauge reads from.
    pub fn timer(&self) -> &Arc<SimpleTimer> {
        &self.timer
    }

    /// Current value, `None` until the timer has a sample.
    pub fn value(&self) -> Option<Duration> {
        self.timer.percentile(self.phi)
    }
}

/// A point-in-time view of a timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub id: MeterId,
    pub description: Option<String>,
    pub count: u64,
    pub total_nanos: u64,
    pub max_nanos: u64,
    pub mean_nanos: u64,
    pub percentiles: Vec<PercentileValue>,
    pub sla_buckets: Vec<BucketCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileValue {
    pub phi: f64,
    pub nanos: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub le_nanos: u64,
    pub count: u64,
}
