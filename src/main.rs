//! Async Timer demo - times a few async operations and prints the registry.
//!
//! Logs go to stderr; the JSON snapshot of the registry goes to stdout.

use anyhow::Result;
use async_timer::{
    AsyncTimer, Config, DistributionConfig, SimpleMeterRegistry, SystemClock, Tag, TimedRegistryExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging (stderr only so stdout stays valid JSON)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(?config, "Configuration loaded");

    let registry = SimpleMeterRegistry::new(config, Arc::new(SystemClock::new()));

    let sleeps = registry.timed("demo.sleep", [("kind", "fixed")])?;
    for millis in [5, 10, 15] {
        sleeps
            .record(tokio::time::sleep(Duration::from_millis(millis)))
            .await;
    }

    let lookups = AsyncTimer::builder("demo.lookup").timed(
        &registry,
        DistributionConfig {
            tags: vec![Tag::new("source", "cache")],
            publish_percentiles: Some(vec![0.5, 0.95, 1.0]),
            sla_boundaries: Some(vec![Duration::from_millis(5), Duration::from_millis(20)]),
            description: Some("Simulated cache lookups".to_string()),
            ..Default::default()
        },
    )?;

    let lookup = lookups.wrap(|| async {
        tokio::time::sleep(Duration::from_millis(3)).await;
        "hit"
    });
    for _ in 0..5 {
        let outcome = lookup().await;
        info!(outcome, "Lookup finished");
    }

    let failing = registry.timed_with_pairs("demo.failing", &["kind", "error"])?;
    let result: Result<(), std::io::Error> = failing
        .record(async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Err(std::io::Error::other("simulated failure"))
        })
        .await;
    if let Err(e) = result {
        warn!(error = %e, "Failing operation returned an error, sample still recorded");
    }

    let snapshot = registry.snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize registry snapshot: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
