//! Meter registry contract.
//!
//! A registry owns named, tagged instruments. This module defines what the
//! timing layer needs from one: a clock, and lookup-or-create registration of
//! timers through the [`TimerSpec`] builder surface.

pub mod simple;
pub mod tags;
pub mod timer;

pub use simple::{global, Meter, MeterSnapshot, RegistrySnapshot, SimpleMeterRegistry};
pub use tags::{MeterId, Tag, Tags};
pub use timer::{PercentileGauge, SimpleTimer, TimerSnapshot};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::MetricsResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// A registered timer. State lives in the registry; handles are shared.
pub trait TimerHandle: Send + Sync {
    /// Identity of the underlying meter.
    fn id(&self) -> &MeterId;

    /// Record one sample. Safe to call from many tasks at once.
    fn record(&self, duration: Duration);

    /// Number of recorded samples.
    fn count(&self) -> u64;

    /// Sum of all recorded samples.
    fn total_time(&self) -> Duration;

    /// Largest recorded sample.
    fn max(&self) -> Duration;

    /// Mean sample, or zero when nothing was recorded.
    fn mean(&self) -> Duration {
        match self.count() {
            0 => Duration::ZERO,
            n => self.total_time() / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }
}

/// Storage and aggregation of meters.
pub trait MeterRegistry: Send + Sync {
    /// The clock timers of this registry measure with.
    fn clock(&self) -> Arc<dyn Clock>;

    /// Register a timer, or return the existing one with the same id.
    fn register_timer(&self, spec: TimerSpec) -> MetricsResult<Arc<dyn TimerHandle>>;

    /// Look up or create a timer with the registry's default distribution settings.
    fn timer(&self, name: &str, tags: Tags) -> MetricsResult<Arc<dyn TimerHandle>> {
        self.register_timer(TimerSpec::new(name).tags(tags))
    }
}

/// How a timer should compensate for process pauses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PauseDetector {
    /// No detection.
    NoPause,
    /// Detect pauses by watching a sleeping thread overshoot its wakeup.
    ClockDrift {
        sleep_interval: Duration,
        pause_threshold: Duration,
    },
}

/// Distribution statistic settings of a timer.
///
/// `None` means "use the registry default"; [`merge`](Self::merge) resolves
/// those against a registry's [`Config`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionStatisticConfig {
    pub percentiles: Option<Vec<f64>>,
    pub percentile_precision: Option<u32>,
    pub percentile_histogram: Option<bool>,
    pub sla_boundaries: Option<Vec<Duration>>,
    pub minimum_expected_value: Option<Duration>,
    pub maximum_expected_value: Option<Duration>,
    pub expiry: Option<Duration>,
    pub buffer_length: Option<u32>,
}

impl DistributionStatisticConfig {
    /// Fill unset fields from the registry defaults.
    pub fn merge(self, defaults: &Config) -> Self {
        Self {
            percentiles: self.percentiles.or_else(|| Some(Vec::new())),
            percentile_precision: self
                .percentile_precision
                .or(Some(defaults.percentile_precision)),
            percentile_histogram: self.percentile_histogram.or(Some(false)),
            sla_boundaries: self.sla_boundaries.or_else(|| Some(Vec::new())),
            minimum_expected_value: self.minimum_expected_value,
            maximum_expected_value: self.maximum_expected_value,
            expiry: self.expiry.or(Some(defaults.distribution_expiry)),
            buffer_length: self
                .buffer_length
                .or(Some(defaults.distribution_buffer_length)),
        }
    }
}

/// Builder surface for registering a timer.
///
/// Every setter takes a concrete value. Settings that are never called stay
/// unset and are resolved by the registry at registration time.
#[derive(Debug, Clone)]
pub struct TimerSpec {
    pub name: String,
    pub tags: Tags,
    pub description: Option<String>,
    pub distribution: DistributionStatisticConfig,
    pub pause_detector: Option<PauseDetector>,
}

impl TimerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Tags::empty(),
            description: None,
            distribution: DistributionStatisticConfig::default(),
            pause_detector: None,
        }
    }

    /// Merge `tags` into the timer's tags.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        self.tags = self.tags.and(tags);
        self
    }

    /// Publish a gauge per percentile, each in `[0, 1]`.
    pub fn publish_percentiles(mut self, percentiles: &[f64]) -> Self {
        self.distribution.percentiles = Some(percentiles.to_vec());
        self
    }

    pub fn percentile_precision(mut self, digits: u32) -> Self {
        self.distribution.percentile_precision = Some(digits);
        self
    }

    pub fn publish_percentile_histogram(mut self, enabled: bool) -> Self {
        self.distribution.percentile_histogram = Some(enabled);
        self
    }

    /// Histogram bucket boundaries, kept in the given order.
    pub fn sla(mut self, boundaries: &[Duration]) -> Self {
        self.distribution.sla_boundaries = Some(boundaries.to_vec());
        self
    }

    pub fn minimum_expected_value(mut self, value: Duration) -> Self {
        self.distribution.minimum_expected_value = Some(value);
        self
    }

    pub fn maximum_expected_value(mut self, value: Duration) -> Self {
        self.distribution.maximum_expected_value = Some(value);
        self
    }

    pub fn distribution_statistic_expiry(mut self, expiry: Duration) -> Self {
        self.distribution.expiry = Some(expiry);
        self
    }

    pub fn distribution_statistic_buffer_length(mut self, length: u32) -> Self {
        self.distribution.buffer_length = Some(length);
        self
    }

    pub fn pause_detector(mut self, detector: PauseDetector) -> Self {
        self.pause_detector = Some(detector);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Register with `registry`.
    pub fn register<R>(self, registry: &R) -> MetricsResult<Arc<dyn TimerHandle>>
    where
        R: MeterRegistry + ?Sized,
    {
        registry.register_timer(self)
    }

    pub fn id(&self) -> MeterId {
        MeterId::new(self.name.clone(), self.tags.clone())
    }
}
