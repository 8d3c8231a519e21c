//! In-memory meter registry.
//!
//! This module provides a thread-safe registry that keeps every meter in a
//! map keyed by [`MeterId`]. Registration is lookup-or-create: asking for an
//! id that already exists returns the existing instrument.

use super::timer::{PercentileGauge, SimpleTimer, TimerSnapshot};
use super::{MeterId, MeterRegistry, PauseDetector, Tag, Tags, TimerHandle, TimerSpec};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, MAX_PERCENTILE_PRECISION};
use crate::error::{MetricsError, MetricsResult};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Name suffix of the gauges derived from a timer's percentiles.
pub const PERCENTILE_SUFFIX: &str = ".percentile";

/// A meter held by [`SimpleMeterRegistry`].
#[derive(Debug, Clone)]
pub enum Meter {
    Timer(Arc<SimpleTimer>),
    Gauge(Arc<PercentileGauge>),
}

impl Meter {
    pub fn id(&self) -> &MeterId {
        match self {
            Meter::Timer(timer) => timer.id(),
            Meter::Gauge(gauge) => gauge.id(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Meter::Timer(_) => "timer",
            Meter::Gauge(_) => "gauge",
        }
    }
}

/// Serializable view of one meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeterSnapshot {
    Timer(TimerSnapshot),
    Gauge {
        id: MeterId,
        value_nanos: Option<u64>,
    },
}

/// Serializable view of a whole registry, meters sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub meters: Vec<MeterSnapshot>,
}

/// Thread-safe in-memory registry.
///
/// Cloning is cheap and clones share the same meters.
#[derive(Clone)]
pub struct SimpleMeterRegistry {
    meters: Arc<RwLock<HashMap<MeterId, Meter>>>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl SimpleMeterRegistry {
    /// Create a registry with the given defaults and clock.
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            meters: Arc::new(RwLock::new(HashMap::new())),
            clock,
            config,
        }
    }

    /// Create a registry with default settings over the system clock.
    pub fn with_system_clock() -> Self {
        Self::new(Config::default(), Arc::new(SystemClock::new()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All meters, sorted by id.
    pub fn meters(&self) -> Vec<Meter> {
        let mut meters: Vec<Meter> = match self.meters.read() {
            Ok(meters) => meters.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        meters.sort_by(|a, b| a.id().cmp(b.id()));
        meters
    }

    pub fn len(&self) -> usize {
        self.meters.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &MeterId) -> Option<Meter> {
        self.meters.read().ok()?.get(id).cloned()
    }

    /// The timer registered under exactly `name` and `tags`.
    pub fn find_timer(&self, name: &str, tags: &Tags) -> Option<Arc<SimpleTimer>> {
        match self.get(&MeterId::new(name, tags.clone()))? {
            Meter::Timer(timer) => Some(timer),
            Meter::Gauge(_) => None,
        }
    }

    /// The gauge registered under exactly `name` and `tags`.
    pub fn find_gauge(&self, name: &str, tags: &Tags) -> Option<Arc<PercentileGauge>> {
        match self.get(&MeterId::new(name, tags.clone()))? {
            Meter::Gauge(gauge) => Some(gauge),
            Meter::Timer(_) => None,
        }
    }

    /// Remove a meter. Removing a timer also removes the percentile gauges
    /// that read from it. Wrappers holding its handle keep recording into the
    /// detached instrument.
    pub fn remove(&self, id: &MeterId) -> Option<Meter> {
        let mut meters = self.meters.write().ok()?;
        let removed = meters.remove(id)?;

        if let Meter::Timer(timer) = &removed {
            meters.retain(|_, meter| match meter {
                Meter::Gauge(gauge) => !Arc::ptr_eq(gauge.timer(), timer),
                Meter::Timer(_) => true,
            });
        }

        tracing::debug!(meter = %id, "Meter removed");
        Some(removed)
    }

    /// Remove every meter.
    pub fn clear(&self) {
        if let Ok(mut meters) = self.meters.write() {
            meters.clear();
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let meters = self
            .meters()
            .into_iter()
            .map(|meter| match meter {
                Meter::Timer(timer) => MeterSnapshot::Timer(timer.snapshot()),
                Meter::Gauge(gauge) => MeterSnapshot::Gauge {
                    id: gauge.id().clone(),
                    value_nanos: gauge
                        .value()
                        .map(|v| u64::try_from(v.as_nanos()).unwrap_or(u64::MAX)),
                },
            })
            .collect();

        RegistrySnapshot { meters }
    }

    fn validate(&self, spec: &TimerSpec) -> MetricsResult<()> {
        let invalid = |reason: String| MetricsError::InvalidDistribution {
            name: spec.name.clone(),
            reason,
        };
        let distribution = &spec.distribution;

        if let Some(phi) = distribution
            .percentiles
            .iter()
            .flatten()
            .find(|phi| !(0.0..=1.0).contains(*phi))
        {
            return Err(invalid(format!("percentile {} is outside [0, 1]", phi)));
        }

        if let Some(digits) = distribution.percentile_precision {
            if digits > MAX_PERCENTILE_PRECISION {
                return Err(invalid(format!(
                    "percentile precision {} exceeds {}",
                    digits, MAX_PERCENTILE_PRECISION
                )));
            }
        }

        if let (Some(min), Some(max)) = (
            distribution.minimum_expected_value,
            distribution.maximum_expected_value,
        ) {
            if min > max {
                return Err(invalid(format!(
                    "minimum expected value {:?} exceeds maximum {:?}",
                    min, max
                )));
            }
        }

        if distribution.buffer_length == Some(0) {
            return Err(invalid("buffer length must be greater than 0".to_string()));
        }

        if distribution.expiry == Some(Duration::ZERO) {
            return Err(invalid("expiry must be greater than 0".to_string()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for SimpleMeterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleMeterRegistry")
            .field("meters", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

impl MeterRegistry for SimpleMeterRegistry {
    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn register_timer(&self, spec: TimerSpec) -> MetricsResult<Arc<dyn TimerHandle>> {
        let id = spec.id();

        let mut meters = self
            .meters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match meters.get(&id) {
            Some(Meter::Timer(existing)) => return Ok(existing.clone()),
            Some(other) => {
                tracing::warn!(meter = %id, existing = other.kind(), "Meter type conflict");
                return Err(MetricsError::MeterTypeConflict {
                    name: id.name.clone(),
                    existing: other.kind(),
                });
            }
            None => {}
        }

        self.validate(&spec)?;

        let percentiles = spec.distribution.percentiles.clone().unwrap_or_default();
        let gauge_ids: Vec<(f64, MeterId)> = percentiles
            .iter()
            .map(|phi| {
                let tags = id.tags.clone().and([Tag::new("phi", phi.to_string())]);
                (*phi, MeterId::new(format!("{}{}", id.name, PERCENTILE_SUFFIX), tags))
            })
            .collect();

        for (_, gauge_id) in &gauge_ids {
            if let Some(Meter::Timer(_)) = meters.get(gauge_id) {
                tracing::warn!(meter = %gauge_id, existing = "timer", "Meter type conflict");
                return Err(MetricsError::MeterTypeConflict {
                    name: gauge_id.name.clone(),
                    existing: "timer",
                });
            }
        }

        let new_meters = 1 + gauge_ids
            .iter()
            .filter(|(_, gauge_id)| !meters.contains_key(gauge_id))
            .count();
        if meters.len() + new_meters > self.config.max_meters {
            tracing::warn!(
                meter = %id,
                limit = self.config.max_meters,
                "Meter limit reached"
            );
            return Err(MetricsError::MeterLimitReached {
                name: id.name.clone(),
                limit: self.config.max_meters,
            });
        }

        let timer = Arc::new(SimpleTimer::new(
            id.clone(),
            spec.description,
            spec.distribution.merge(&self.config),
            spec.pause_detector.unwrap_or(PauseDetector::NoPause),
            self.config.sample_window,
        ));

        for (phi, gauge_id) in gauge_ids {
            let gauge = PercentileGauge::new(gauge_id.clone(), phi, timer.clone());
            meters.insert(gauge_id, Meter::Gauge(Arc::new(gauge)));
        }
        meters.insert(id.clone(), Meter::Timer(timer.clone()));

        tracing::debug!(
            meter = %id,
            percentiles = percentiles.len(),
            "Timer registered"
        );

        Ok(timer)
    }
}

static GLOBAL: Lazy<SimpleMeterRegistry> = Lazy::new(SimpleMeterRegistry::with_system_clock);

/// Process-wide registry over the system clock.
pub fn global() -> &'static SimpleMeterRegistry {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn registry() -> SimpleMeterRegistry {
        SimpleMeterRegistry::new(Config::default(), Arc::new(MockClock::new()))
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = registry();
        let first = registry.timer("timer", Tags::of([("key", "value")])).unwrap();
        let second = registry.timer("timer", Tags::of([("key", "value")])).unwrap();

        first.record(Duration::from_millis(1));
        second.record(Duration::from_millis(2));

        assert_eq!(registry.len(), 1);
        assert_eq!(first.count(), 2);
        assert_eq!(second.total_time(), Duration::from_millis(3));
    }

    #[test]
    fn test_different_tags_are_different_timers() {
        let registry = registry();
        registry.timer("timer", Tags::of([("key", "a")])).unwrap();
        registry.timer("timer", Tags::of([("key", "b")])).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_percentile_gauges_registered() {
        let registry = registry();
        TimerSpec::new("timer")
            .tags([("key", "value")])
            .publish_percentiles(&[0.5, 1.0])
            .register(&registry)
            .unwrap();

        assert_eq!(registry.len(), 3);
        let gauge = registry
            .find_gauge("timer.percentile", &Tags::of([("key", "value"), ("phi", "1")]))
            .unwrap();
        assert_eq!(gauge.phi(), 1.0);
        assert!(registry
            .find_gauge(
                "timer.percentile",
                &Tags::of([("key", "value"), ("phi", "0.5")])
            )
            .is_some());
    }

    #[test]
    fn test_defaults_applied_to_absent_fields() {
        let config = Config {
            distribution_expiry: Duration::from_secs(60),
            distribution_buffer_length: 4,
            ..Config::default()
        };
        let registry = SimpleMeterRegistry::new(config, Arc::new(MockClock::new()));

        TimerSpec::new("defaulted").register(&registry).unwrap();
        TimerSpec::new("explicit")
            .distribution_statistic_expiry(Duration::from_secs(5))
            .register(&registry)
            .unwrap();

        let defaulted = registry.find_timer("defaulted", &Tags::empty()).unwrap();
        assert_eq!(defaulted.distribution().expiry, Some(Duration::from_secs(60)));
        assert_eq!(defaulted.distribution().buffer_length, Some(4));

        let explicit = registry.find_timer("explicit", &Tags::empty()).unwrap();
        assert_eq!(explicit.distribution().expiry, Some(Duration::from_secs(5)));
        assert_eq!(explicit.distribution().buffer_length, Some(4));
    }

    #[test]
    fn test_invalid_percentile_rejected() {
        let registry = registry();
        let result = TimerSpec::new("timer")
            .publish_percentiles(&[1.5])
            .register(&registry);

        assert!(matches!(
            result,
            Err(MetricsError::InvalidDistribution { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_min_above_max_rejected() {
        let registry = registry();
        let result = TimerSpec::new("timer")
            .minimum_expected_value(Duration::from_secs(2))
            .maximum_expected_value(Duration::from_secs(1))
            .register(&registry);

        assert!(matches!(
            result,
            Err(MetricsError::InvalidDistribution { .. })
        ));
    }

    #[test]
    fn test_precision_above_max_rejected() {
        let registry = registry();
        let result = TimerSpec::new("timer")
            .percentile_precision(MAX_PERCENTILE_PRECISION + 1)
            .register(&registry);

        assert!(matches!(
            result,
            Err(MetricsError::InvalidDistribution { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let registry = registry();
        let result = TimerSpec::new("timer")
            .distribution_statistic_expiry(Duration::ZERO)
            .register(&registry);

        assert!(matches!(
            result,
            Err(MetricsError::InvalidDistribution { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_type_conflict() {
        let registry = registry();
        TimerSpec::new("timer")
            .publish_percentiles(&[1.0])
            .register(&registry)
            .unwrap();

        let result = registry.timer("timer.percentile", Tags::of([("phi", "1")]));
        match result {
            Err(MetricsError::MeterTypeConflict { name, existing }) => {
                assert_eq!(name, "timer.percentile");
                assert_eq!(existing, "gauge");
            }
            other => panic!("Expected MeterTypeConflict, got: {:?}", other.map(|t| t.id().clone())),
        }
    }

    #[test]
    fn test_meter_limit() {
        let config = Config {
            max_meters: 2,
            ..Config::default()
        };
        let registry = SimpleMeterRegistry::new(config, Arc::new(MockClock::new()));

        registry.timer("a", Tags::empty()).unwrap();
        registry.timer("b", Tags::empty()).unwrap();
        // Existing meters can still be looked up
        registry.timer("a", Tags::empty()).unwrap();

        let result = registry.timer("c", Tags::empty());
        assert!(matches!(
            result,
            Err(MetricsError::MeterLimitReached { limit: 2, .. })
        ));
    }

    #[test]
    fn test_meter_limit_counts_percentile_gauges() {
        let config = Config {
            max_meters: 2,
            ..Config::default()
        };
        let registry = SimpleMeterRegistry::new(config, Arc::new(MockClock::new()));

        // Timer plus two gauges is one over the limit
        let result = TimerSpec::new("timer")
            .publish_percentiles(&[0.5, 1.0])
            .register(&registry);
        assert!(matches!(
            result,
            Err(MetricsError::MeterLimitReached { limit: 2, .. })
        ));
        assert!(registry.is_empty());

        TimerSpec::new("timer")
            .publish_percentiles(&[1.0])
            .register(&registry)
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_timer_drops_its_percentile_gauges() {
        let registry = registry();
        TimerSpec::new("timer")
            .tags([("key", "value")])
            .publish_percentiles(&[0.5, 1.0])
            .register(&registry)
            .unwrap();
        registry.timer("other", Tags::empty()).unwrap();
        assert_eq!(registry.len(), 4);

        let removed = registry.remove(&MeterId::new("timer", Tags::of([("key", "value")])));
        assert!(matches!(removed, Some(Meter::Timer(_))));
        assert_eq!(registry.len(), 1);
        assert!(registry
            .find_gauge("timer.percentile", &Tags::of([("key", "value"), ("phi", "1")]))
            .is_none());
        assert!(registry.find_timer("other", &Tags::empty()).is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = registry();
        registry.timer("a", Tags::empty()).unwrap();
        registry.timer("b", Tags::empty()).unwrap();

        assert!(registry.remove(&MeterId::new("a", Tags::empty())).is_some());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = registry();
        let timer = TimerSpec::new("timer")
            .publish_percentiles(&[1.0])
            .register(&registry)
            .unwrap();
        timer.record(Duration::from_nanos(250));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.meters.len(), 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["meters"][0]["type"], "timer");
        assert_eq!(json["meters"][0]["count"], 1);
        assert_eq!(json["meters"][1]["type"], "gauge");
        assert_eq!(json["meters"][1]["value_nanos"], 250);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let timer = global()
            .timer("global.test.timer", Tags::empty())
            .unwrap();
        timer.record(Duration::from_millis(1));

        let again = global().find_timer("global.test.timer", &Tags::empty()).unwrap();
        assert!(again.count() >= 1);
    }
}
