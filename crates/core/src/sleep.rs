//! Delay abstraction.
//!
//! Polling cadence, retry backoff and rate limiting all suspend through a
//! [`Sleeper`], so the scheduling contract can be tested without wall-clock
//! sleeps.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<S: Sleeper + ?Sized> Sleeper for std::sync::Arc<S> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}
