//! The durable outbound queue.
//!
//! `OfflineQueue` is the foreground-facing API: validate, enqueue, list, and mutate queued
//! transactions. The sync engine is the only other component that touches queue
//! records, and only through `DurableStore` directly during a drain.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use till_core::{
    generate_idempotency_key, generate_local_id, validate_enqueue_request, CoreError,
    EnqueueRequest, QueuedTransaction,
};

use crate::storage::DurableStore;

/// Foreground API over the durable queue.
pub struct OfflineQueue {
    store: Arc<dyn DurableStore>,
    /// Nudges the background half to schedule an immediate best-effort drain after a
    /// successful enqueue. Bounded to capacity 1 -- it is a wakeup, not a work item, so a
    /// full channel (a drain is already pending) is dropped rather than awaited.
    drain_signal: Option<mpsc::Sender<()>>,
}

impl OfflineQueue {
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            drain_signal: None,
        }
    }

    /// Like [`OfflineQueue::new`], but wired to notify the background sync engine on every
    /// successful enqueue.
    #[must_use]
    pub fn with_drain_signal(store: Arc<dyn DurableStore>, drain_signal: mpsc::Sender<()>) -> Self {
        Self {
            store,
            drain_signal: Some(drain_signal),
        }
    }

    /// Validates and enqueues a new transaction. Returns the generated `local_id`.
    ///
    /// If `idempotency_key` is not supplied by the caller, one is generated. Validation
    /// failures never touch the store.
    pub async fn enqueue(
        &self,
        request: &EnqueueRequest,
        url: String,
        method: String,
        headers: HashMap<String, String>,
        payload: serde_json::Value,
        idempotency_key: Option<String>,
        now: i64,
    ) -> Result<String, CoreError> {
        let validation = validate_enqueue_request(request);
        if let Some(errors) = validation.into_errors() {
            return Err(CoreError::Validation(errors));
        }

        let local_id = generate_local_id();
        let idempotency_key = idempotency_key.unwrap_or_else(generate_idempotency_key);
        let tx = QueuedTransaction::new(
            local_id.clone(),
            idempotency_key,
            url,
            method,
            headers,
            payload,
            now,
        );

        self.store
            .put_queued_transaction(tx)
            .await
            .map_err(CoreError::Internal)?;

        if let Some(signal) = &self.drain_signal {
            let _ = signal.try_send(());
        }

        Ok(local_id)
    }

    pub async fn list(&self) -> Result<Vec<QueuedTransaction>, CoreError> {
        self.store
            .list_queued_transactions()
            .await
            .map_err(CoreError::Internal)
    }

    pub async fn count(&self) -> Result<usize, CoreError> {
        self.store
            .count_queued_transactions()
            .await
            .map_err(CoreError::Internal)
    }

    pub async fn get_by_id(&self, local_id: &str) -> Result<Option<QueuedTransaction>, CoreError> {
        self.store
            .get_queued_transaction(local_id)
            .await
            .map_err(CoreError::Internal)
    }

    /// Clears a record's backoff so the next drain retries it immediately.
    pub async fn expedite(&self, local_id: &str, now: i64) -> Result<(), CoreError> {
        let mut tx = self
            .store
            .get_queued_transaction(local_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or_else(|| CoreError::NotFound(local_id.to_string()))?;

        tx.next_attempt_at = now;
        self.store
            .put_queued_transaction(tx)
            .await
            .map_err(CoreError::Internal)
    }

    /// Replaces the payload of a queued record and resets its retry state ("fix and retry").
    pub async fn edit_payload(
        &self,
        local_id: &str,
        new_payload: serde_json::Value,
        now: i64,
    ) -> Result<(), CoreError> {
        let mut tx = self
            .store
            .get_queued_transaction(local_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or_else(|| CoreError::NotFound(local_id.to_string()))?;

        tx.payload = new_payload;
        tx.attempts = 0;
        tx.next_attempt_at = now;
        tx.last_error = None;

        self.store
            .put_queued_transaction(tx)
            .await
            .map_err(CoreError::Internal)
    }

    pub async fn delete(&self, local_id: &str) -> Result<(), CoreError> {
        self.store
            .delete_queued_transaction(local_id)
            .await
            .map_err(CoreError::Internal)
    }

    /// Count of records whose `attempts` has crossed `threshold`.
    pub async fn escalated_count(&self, threshold: u32) -> Result<usize, CoreError> {
        let all = self.list().await?;
        Ok(all.iter().filter(|tx| tx.is_escalated(threshold)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use till_core::RequestItem;

    fn store() -> Arc<dyn DurableStore> {
        Arc::new(MemoryStore::new())
    }

    fn request() -> EnqueueRequest {
        EnqueueRequest {
            store_id: "st_1".to_string(),
            items: vec![RequestItem {
                product_id: "p1".to_string(),
                quantity: 2,
                unit_price: 10.0,
                line_total: 20.0,
            }],
        }
    }

    #[tokio::test]
    async fn enqueue_rejects_invalid_request() {
        let queue = OfflineQueue::new(store());
        let mut bad = request();
        bad.store_id = String::new();

        let result = queue
            .enqueue(
                &bad,
                "/api/pos/sales".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                0,
            )
            .await;

        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn enqueue_generates_idempotency_key_when_absent() {
        let queue = OfflineQueue::new(store());
        let local_id = queue
            .enqueue(
                &request(),
                "/api/pos/sales".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                1_000,
            )
            .await
            .unwrap();

        let tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        assert!(!tx.idempotency_key.is_empty());
        assert_eq!(tx.attempts, 0);
        assert_eq!(tx.next_attempt_at, 1_000);
    }

    #[tokio::test]
    async fn enqueue_uses_caller_supplied_idempotency_key() {
        let queue = OfflineQueue::new(store());
        let local_id = queue
            .enqueue(
                &request(),
                "/api/pos/sales".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                Some("caller-key".to_string()),
                0,
            )
            .await
            .unwrap();

        let tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        assert_eq!(tx.idempotency_key, "caller-key");
    }

    #[tokio::test]
    async fn expedite_resets_next_attempt_at() {
        let queue = OfflineQueue::new(store());
        let local_id = queue
            .enqueue(
                &request(),
                "/x".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                0,
            )
            .await
            .unwrap();

        // Simulate a failed attempt pushing the record into the future.
        let mut tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        tx.next_attempt_at = 999_999;
        queue.store.put_queued_transaction(tx).await.unwrap();

        queue.expedite(&local_id, 42).await.unwrap();
        let tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        assert_eq!(tx.next_attempt_at, 42);
    }

    #[tokio::test]
    async fn expedite_missing_record_errors() {
        let queue = OfflineQueue::new(store());
        let result = queue.expedite("missing", 0).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn edit_payload_resets_attempts_and_backoff() {
        let queue = OfflineQueue::new(store());
        let local_id = queue
            .enqueue(
                &request(),
                "/x".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({"bad": true}),
                None,
                0,
            )
            .await
            .unwrap();

        let mut tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        tx.attempts = 3;
        tx.last_error = Some("validation".to_string());
        tx.next_attempt_at = 50_000;
        queue.store.put_queued_transaction(tx).await.unwrap();

        queue
            .edit_payload(&local_id, serde_json::json!({"fixed": true}), 10)
            .await
            .unwrap();

        let tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        assert_eq!(tx.attempts, 0);
        assert_eq!(tx.next_attempt_at, 10);
        assert!(tx.last_error.is_none());
        assert_eq!(tx.payload, serde_json::json!({"fixed": true}));
    }

    #[tokio::test]
    async fn delete_removes_record_unconditionally() {
        let queue = OfflineQueue::new(store());
        let local_id = queue
            .enqueue(
                &request(),
                "/x".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                0,
            )
            .await
            .unwrap();

        queue.delete(&local_id).await.unwrap();
        assert!(queue.get_by_id(&local_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_enqueue_notifies_the_drain_signal() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = OfflineQueue::with_drain_signal(store(), tx);

        queue
            .enqueue(
                &request(),
                "/api/pos/sales".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                0,
            )
            .await
            .unwrap();

        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn rejected_enqueue_does_not_notify_the_drain_signal() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = OfflineQueue::with_drain_signal(store(), tx);
        let mut bad = request();
        bad.store_id = String::new();

        let _ = queue
            .enqueue(
                &bad,
                "/api/pos/sales".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                0,
            )
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn escalated_count_uses_threshold() {
        let queue = OfflineQueue::new(store());
        let local_id = queue
            .enqueue(
                &request(),
                "/x".to_string(),
                "POST".to_string(),
                HashMap::new(),
                serde_json::json!({}),
                None,
                0,
            )
            .await
            .unwrap();

        assert_eq!(queue.escalated_count(5).await.unwrap(), 0);

        let mut tx = queue.get_by_id(&local_id).await.unwrap().unwrap();
        tx.attempts = 5;
        queue.store.put_queued_transaction(tx).await.unwrap();

        assert_eq!(queue.escalated_count(5).await.unwrap(), 1);
    }
}
