//! The sync engine: the drain algorithm.
//!
//! Replays due queue records against upstream. A 2xx or 409 is terminal success (409 means
//! upstream already has this idempotency key); anything else increments the attempt counter,
//! records the error, and schedules the next attempt under a capped exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use till_core::QueuedTransaction;

use crate::notify::{AgentMessage, ClientRegistry};
use crate::storage::DurableStore;

/// Network-level failure replaying a queued transaction.
#[derive(Debug, Clone, thiserror::Error)]
#[error("replay failed: {0}")]
pub struct ReplayError(pub String);

/// Abstraction over the HTTP client doing the replay, so the drain loop is testable without I/O.
#[async_trait]
pub trait Replayer: Send + Sync {
    /// Replays `tx` against upstream, returning the response status code.
    async fn replay(&self, tx: &QueuedTransaction) -> Result<u16, ReplayError>;
}

/// Replays queued transactions over `reqwest`.
pub struct ReqwestReplayer {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestReplayer {
    /// Builds a replayer with the given request timeout and upstream base URL.
    #[must_use]
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

#[async_trait]
impl Replayer for ReqwestReplayer {
    async fn replay(&self, tx: &QueuedTransaction) -> Result<u16, ReplayError> {
        let method = reqwest::Method::from_bytes(tx.method.as_bytes())
            .map_err(|err| ReplayError(err.to_string()))?;
        let url = format!("{}{}", self.base_url, tx.url);

        let mut request = self.client.request(method, url).json(&tx.payload);
        for (name, value) in &tx.headers {
            request = request.header(name, value);
        }
        request = request.header("Idempotency-Key", &tx.idempotency_key);

        let response = request
            .send()
            .await
            .map_err(|err| ReplayError(err.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Totals from a single drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub attempted: usize,
    pub synced: usize,
}

/// Drains the durable queue against upstream, one record at a time.
pub struct SyncEngine {
    store: Arc<dyn DurableStore>,
    replayer: Arc<dyn Replayer>,
    clients: Arc<ClientRegistry>,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn DurableStore>,
        replayer: Arc<dyn Replayer>,
        clients: Arc<ClientRegistry>,
        base_backoff: Duration,
        max_backoff: Duration,
    ) -> Self {
        Self {
            store,
            replayer,
            clients,
            base_backoff,
            max_backoff,
        }
    }

    /// Delay before the next attempt, given the attempt count *after* this failure.
    /// `min(max_backoff, base_backoff * 2^attempts)`.
    #[must_use]
    pub fn backoff_millis(&self, attempts: u32) -> i64 {
        let base = i64::try_from(self.base_backoff.as_millis()).unwrap_or(i64::MAX);
        let max = i64::try_from(self.max_backoff.as_millis()).unwrap_or(i64::MAX);
        let factor = 2i64.saturating_pow(attempts);
        base.saturating_mul(factor).min(max)
    }

    /// Runs one drain pass over every record whose `next_attempt_at <= now`, broadcasts
    /// `SyncCompleted` to attached clients, and returns the totals.
    pub async fn drain(&self, now: i64) -> anyhow::Result<DrainSummary> {
        let queued = self.store.list_queued_transactions().await?;
        let mut attempted = 0usize;
        let mut synced = 0usize;

        for tx in queued {
            if tx.next_attempt_at > now {
                continue;
            }
            attempted += 1;

            match self.replayer.replay(&tx).await {
                Ok(status) if (200..300).contains(&status) || status == 409 => {
                    self.store.delete_queued_transaction(&tx.local_id).await?;
                    synced += 1;
                }
                Ok(status) => {
                    self.record_failure(tx, now, format!("upstream returned {status}"))
                        .await?;
                }
                Err(err) => {
                    self.record_failure(tx, now, err.to_string()).await?;
                }
            }
        }

        let summary = DrainSummary { attempted, synced };
        self.clients.broadcast(AgentMessage::SyncCompleted {
            attempted,
            synced,
        });
        Ok(summary)
    }

    async fn record_failure(
        &self,
        mut tx: QueuedTransaction,
        now: i64,
        error: String,
    ) -> anyhow::Result<()> {
        tx.attempts += 1;
        tx.next_attempt_at = now + self.backoff_millis(tx.attempts);
        tx.last_error = Some(error);
        self.store.put_queued_transaction(tx).await
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::notify::ClientRegistry;
    use crate::storage::MemoryStore;
    use proptest::prelude::*;

    struct UnusedReplayer;

    #[async_trait]
    impl Replayer for UnusedReplayer {
        async fn replay(&self, _tx: &QueuedTransaction) -> Result<u16, ReplayError> {
            Err(ReplayError("not called".to_string()))
        }
    }

    fn engine(base_millis: u64, max_millis: u64) -> SyncEngine {
        SyncEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(UnusedReplayer),
            Arc::new(ClientRegistry::new()),
            Duration::from_millis(base_millis),
            Duration::from_millis(max_millis),
        )
    }

    proptest! {
        /// The backoff curve never exceeds the configured ceiling, for any attempt count.
        #[test]
        fn backoff_never_exceeds_the_ceiling(
            base_millis in 1u64..10_000,
            max_millis in 1u64..300_000,
            attempts in 0u32..64,
        ) {
            let engine = engine(base_millis, max_millis);
            let delay = engine.backoff_millis(attempts);
            prop_assert!(delay <= max_millis as i64);
        }

        /// Below the ceiling, the curve is monotonically non-decreasing in `attempts`.
        #[test]
        fn backoff_is_monotonic_below_the_ceiling(
            base_millis in 1u64..10_000,
            max_millis in 1u64..300_000,
            attempts in 0u32..32,
        ) {
            let engine = engine(base_millis, max_millis);
            let a = engine.backoff_millis(attempts);
            let b = engine.backoff_millis(attempts + 1);
            prop_assert!(b >= a);
        }
    }
}
