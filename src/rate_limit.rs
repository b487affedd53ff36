//! Pacing for remote calls, kept apart from the retry loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Gate every remote call passes before it is sent.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Waits until a call may go out and marks the slot as taken.
    async fn acquire(&self);
}

/// Lets calls through no closer than `interval` apart.
#[derive(Debug)]
pub struct FixedInterval {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RateLimiter for FixedInterval {
    async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// No pacing at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}
