use async_timer::clock::{Clock, MockClock};
use async_timer::error::{MetricsError, MetricsResult};
use async_timer::registry::{MeterId, MeterRegistry, TimerHandle, TimerSpec};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timer double that keeps every sample.
#[allow(dead_code)]
pub struct RecordingTimer {
    id: MeterId,
    samples: Mutex<Vec<Duration>>,
}

#[allow(dead_code)]
impl RecordingTimer {
    pub fn samples(&self) -> Vec<Duration> {
        self.samples.lock().unwrap().clone()
    }
}

impl TimerHandle for RecordingTimer {
    fn id(&self) -> &MeterId {
        &self.id
    }

    fn record(&self, duration: Duration) {
        self.samples.lock().unwrap().push(duration);
    }

    fn count(&self) -> u64 {
        self.samples.lock().unwrap().len() as u64
    }

    fn total_time(&self) -> Duration {
        self.samples.lock().unwrap().iter().sum()
    }

    fn max(&self) -> Duration {
        self.samples
            .lock()
            .unwrap()
            .iter()
            .copied()
            .max()
            .unwrap_or_default()
    }
}

/// Registry double that captures every spec it is asked to register.
#[allow(dead_code)]
#[derive(Clone)]
pub struct RecordingRegistry {
    clock: Arc<MockClock>,
    specs: Arc<Mutex<Vec<TimerSpec>>>,
    timers: Arc<Mutex<Vec<Arc<RecordingTimer>>>>,
}

#[allow(dead_code)]
impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(MockClock::new()),
            specs: Arc::new(Mutex::new(Vec::new())),
            timers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn mock_clock(&self) -> Arc<MockClock> {
        self.clock.clone()
    }

    pub fn specs(&self) -> Vec<TimerSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn last_timer(&self) -> Option<Arc<RecordingTimer>> {
        self.timers.lock().unwrap().last().cloned()
    }
}

impl MeterRegistry for RecordingRegistry {
    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn register_timer(&self, spec: TimerSpec) -> MetricsResult<Arc<dyn TimerHandle>> {
        let timer = Arc::new(RecordingTimer {
            id: spec.id(),
            samples: Mutex::new(Vec::new()),
        });
        self.specs.lock().unwrap().push(spec);
        self.timers.lock().unwrap().push(timer.clone());
        Ok(timer)
    }
}

/// Registry double that refuses every registration.
#[allow(dead_code)]
pub struct RejectingRegistry {
    pub error: MetricsError,
}

impl MeterRegistry for RejectingRegistry {
    fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(MockClock::new())
    }

    fn register_timer(&self, _spec: TimerSpec) -> MetricsResult<Arc<dyn TimerHandle>> {
        Err(self.error.clone())
    }
}
