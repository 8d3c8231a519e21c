//! Construction of [`AsyncTimer`]s.
//!
//! Two entry points exist. [`TimedRegistryExt::timed`] looks up or creates a
//! timer with the registry's default distribution settings. The builder
//! returned by [`AsyncTimer::builder`] accepts a [`DistributionConfig`] whose
//! fields are applied only when present.

use super::AsyncTimer;
use crate::error::MetricsResult;
use crate::registry::{MeterRegistry, PauseDetector, Tag, Tags, TimerSpec};
use std::time::Duration;

/// Optional distribution statistic settings for a timer.
///
/// Every field left at its default is skipped at registration, so the
/// registry's own default stays in effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionConfig {
    /// Tags added to the timer.
    pub tags: Vec<Tag>,
    /// Publish a gauge per percentile, each in `[0, 1]`. Computed locally, so
    /// not aggregable across instances.
    pub publish_percentiles: Option<Vec<f64>>,
    /// Significant digits kept by the histogram backing percentiles.
    pub percentile_precision: Option<u32>,
    /// Publish histogram buckets usable for aggregable percentile estimates.
    pub publish_percentile_histogram: Option<bool>,
    /// Histogram boundaries that are always published, in this order.
    pub sla_boundaries: Option<Vec<Duration>>,
    /// Lower bound on published histogram buckets.
    pub minimum_expected_value: Option<Duration>,
    /// Upper bound on published histogram buckets.
    pub maximum_expected_value: Option<Duration>,
    /// How long samples count towards decaying statistics such as max.
    pub distribution_statistic_expiry: Option<Duration>,
    /// Number of ring buffers rotated through over one expiry.
    pub distribution_statistic_buffer_length: Option<u32>,
    pub pause_detector: Option<PauseDetector>,
    pub description: Option<String>,
}

/// Builds an [`AsyncTimer`] with custom distribution statistics.
#[derive(Debug, Clone)]
pub struct AsyncTimerBuilder {
    name: String,
}

impl AsyncTimerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Register the timer in `registry` and wrap it with the registry's clock.
    ///
    /// Registration errors are returned as the registry produced them.
    pub fn timed<R>(self, registry: &R, config: DistributionConfig) -> MetricsResult<AsyncTimer>
    where
        R: MeterRegistry + ?Sized,
    {
        let DistributionConfig {
            tags,
            publish_percentiles,
            percentile_precision,
            publish_percentile_histogram,
            sla_boundaries,
            minimum_expected_value,
            maximum_expected_value,
            distribution_statistic_expiry,
            distribution_statistic_buffer_length,
            pause_detector,
            description,
        } = config;

        let mut spec = TimerSpec::new(self.name).tags(tags);

        if let Some(percentiles) = publish_percentiles {
            spec = spec.publish_percentiles(&percentiles);
        }
        if let Some(digits) = percentile_precision {
            spec = spec.percentile_precision(digits);
        }
        if let Some(enabled) = publish_percentile_histogram {
            spec = spec.publish_percentile_histogram(enabled);
        }
        if let Some(boundaries) = sla_boundaries {
            spec = spec.sla(&boundaries);
        }
        if let Some(min) = minimum_expected_value {
            spec = spec.minimum_expected_value(min);
        }
        if let Some(max) = maximum_expected_value {
            spec = spec.maximum_expected_value(max);
        }
        if let Some(expiry) = distribution_statistic_expiry {
            spec = spec.distribution_statistic_expiry(expiry);
        }
        if let Some(length) = distribution_statistic_buffer_length {
            spec = spec.distribution_statistic_buffer_length(length);
        }
        if let Some(detector) = pause_detector {
            spec = spec.pause_detector(detector);
        }
        if let Some(description) = description {
            spec = spec.description(description);
        }

        let timer = spec.register(registry)?;
        Ok(AsyncTimer::new(timer, registry.clock()))
    }
}

/// Direct construction of [`AsyncTimer`]s from any registry.
pub trait TimedRegistryExt: MeterRegistry {
    /// Look up or create the timer `name` with `tags`.
    fn timed<I, T>(&self, name: &str, tags: I) -> MetricsResult<AsyncTimer>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let timer = self.timer(name, Tags::of(tags))?;
        Ok(AsyncTimer::new(timer, self.clock()))
    }

    /// Like [`timed`](Self::timed), with tags as alternating keys and values.
    fn timed_with_pairs(&self, name: &str, key_values: &[&str]) -> MetricsResult<AsyncTimer> {
        self.timed(name, Tags::from_pairs(key_values)?)
    }
}

impl<R: MeterRegistry + ?Sized> TimedRegistryExt for R {}
