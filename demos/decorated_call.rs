//! Example usage of the rate limiter guarding an async operation.
//!
//! Spawns a burst of tasks against a small limiter and shows the three
//! possible outcomes: immediate grant, delayed grant, and rejection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, Level};

use floodgate::config::RateLimiterConfig;
use floodgate::error::FloodgateError;
use floodgate::ratelimit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .init();

    // Two permits per 500ms; callers are willing to wait up to 600ms.
    let config = RateLimiterConfig::builder()
        .limit_for_period(2)
        .limit_refresh_period(Duration::from_millis(500))
        .timeout_duration(Duration::from_millis(600))
        .build()?;
    let limiter = Arc::new(RateLimiter::new("demo", config));

    info!("Dispatching a burst of 6 calls through the limiter");
    let started = Instant::now();

    let mut handles = Vec::new();
    for task in 0..6 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            let outcome = limiter
                .execute(|| async {
                    format!("task {} ran at {:?}", task, started.elapsed())
                })
                .await;
            (task, outcome)
        }));
    }

    for handle in handles {
        let (task, outcome) = handle.await?;
        match outcome {
            Ok(report) => info!(task, "{report}"),
            Err(FloodgateError::RequestNotPermitted { name }) => {
                info!(task, limiter = %name, "rejected");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(available = limiter.available_permits(), "Burst finished");
    Ok(())
}
