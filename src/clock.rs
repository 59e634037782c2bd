use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Time source and timer used by the orchestrator.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by tokio's timer. Under a paused test runtime time only
/// advances when every task is idle, which keeps orchestrator tests exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
