//! Async Timer - latency instrumentation for async Rust.
//!
//! Wraps futures so that their wall-clock duration, including time spent
//! suspended, is recorded into a timer owned by a meter registry. A sample is
//! recorded on success, on error, on panic and on cancellation.
//!
//! # Architecture
//!
//! - **timed**: the [`AsyncTimer`] wrapper, its builder and registry extension
//! - **registry**: the meter registry contract and an in-memory implementation
//! - **clock**: monotonic time sources, including a manual clock for tests
//! - **config**: registry defaults loaded from environment variables
//! - **error**: custom error types for precise error handling

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod timed;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::Config;
pub use error::{ConfigError, MetricsError, MetricsResult};
pub use registry::{
    MeterId, MeterRegistry, PauseDetector, SimpleMeterRegistry, Tag, Tags, TimerHandle, TimerSpec,
};
pub use timed::{AsyncTimer, AsyncTimerBuilder, DistributionConfig, TimedRegistryExt};
