use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use farefeed_core::{CoreResult, StreamBroker};

const PROCESSED_KEY_PREFIX: &str = "processed:";

/// How long a processed marker lives. Past this window the tracker forgets
/// the request and a very late redelivery would run again; this bounds
/// storage growth and is accepted as long as the broker's redelivery
/// latency stays well under it.
const PROCESSED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Suppresses duplicate processing of redelivered requests by keeping an
/// expiring marker per request id in the broker's key space.
pub struct IdempotencyTracker {
    broker: Arc<dyn StreamBroker>,
    ttl: Duration,
}

impl IdempotencyTracker {
    pub fn new(broker: Arc<dyn StreamBroker>) -> Self {
        Self {
            broker,
            ttl: PROCESSED_TTL,
        }
    }

    fn key(request_id: &str) -> String {
        format!("{PROCESSED_KEY_PREFIX}{request_id}")
    }

    /// Whether this request has already been fully processed. An absent key
    /// means "not yet"; only a broker fault is an error.
    pub async fn is_processed(&self, request_id: &str) -> CoreResult<bool> {
        let value = self.broker.get(&Self::key(request_id)).await?;
        Ok(value.is_some())
    }

    pub async fn mark_processed(&self, request_id: &str) -> CoreResult<()> {
        self.broker
            .set_with_expiry(&Self::key(request_id), "1", self.ttl)
            .await
    }

    /// Run `effect` unless this request was already processed, returning
    /// whether it ran. Marks the request only after `effect` succeeds, so a
    /// failed attempt stays retryable on redelivery. An already-processed
    /// request is skipped and reported as `false`.
    ///
    /// The check and the mark are two broker round trips; two concurrent
    /// deliveries of one request id can both pass the check. The stream's
    /// at-least-once delivery already forces downstream consumers to
    /// tolerate that window.
    pub async fn process_with_idempotency<F, Fut>(
        &self,
        request_id: &str,
        effect: F,
    ) -> CoreResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoreResult<()>>,
    {
        if self.is_processed(request_id).await? {
            debug!(request_id, "Request already processed, skipping");
            return Ok(false);
        }

        effect().await?;

        self.mark_processed(request_id).await?;
        Ok(true)
    }
}
