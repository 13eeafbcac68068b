use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use farefeed_core::{CoreError, CoreResult, SearchParams, SearchRequest, StreamBroker};

pub const DEFAULT_REQUEST_STREAM: &str = "search.requests";

/// How often `consume_with_timeout` re-polls an empty stream.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A decoded request together with the broker id needed to acknowledge it.
/// The consumer never acknowledges; that happens after the full pipeline,
/// so a crash mid-processing leads to redelivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub request: SearchRequest,
}

/// Reads one search request at a time from the request stream under a
/// consumer group.
pub struct SearchRequestConsumer {
    broker: Arc<dyn StreamBroker>,
    stream: String,
    group: String,
    consumer_name: String,
}

impl SearchRequestConsumer {
    pub fn new(broker: Arc<dyn StreamBroker>, group: &str, consumer_name: &str) -> Self {
        Self {
            broker,
            stream: DEFAULT_REQUEST_STREAM.to_string(),
            group: group.to_string(),
            consumer_name: consumer_name.to_string(),
        }
    }

    pub fn with_stream(mut self, stream: &str) -> Self {
        self.stream = stream.to_string();
        self
    }

    /// Pull and decode exactly one pending request.
    ///
    /// `NoData` when the stream has nothing for this group, `Malformed` when
    /// the `params` field is missing or does not decode, `Validation` when a
    /// required field is empty. The malformed/invalid variants carry the
    /// broker message id so the caller can retire the poison entry.
    pub async fn consume(&self) -> CoreResult<Delivery> {
        let records = self
            .broker
            .read_group(&self.group, &self.consumer_name, &self.stream, 1)
            .await?;

        let Some(record) = records.into_iter().next() else {
            return Err(CoreError::NoData);
        };
        let message_id = record.id.clone();

        let params_raw = record.fields.get("params").ok_or_else(|| CoreError::Malformed {
            message_id: message_id.clone(),
            reason: "missing params field".to_string(),
        })?;
        let params: SearchParams =
            serde_json::from_str(params_raw).map_err(|e| CoreError::Malformed {
                message_id: message_id.clone(),
                reason: format!("params did not decode: {e}"),
            })?;

        let request = SearchRequest {
            request_id: record.field("request_id"),
            correlation_id: record.field("correlation_id"),
            chat_id: record.field("chat_id"),
            params,
        };

        for (name, value) in [
            ("request_id", &request.request_id),
            ("chat_id", &request.chat_id),
            ("origin", &request.params.origin),
            ("destination", &request.params.destination),
        ] {
            if value.is_empty() {
                return Err(CoreError::Validation {
                    message_id,
                    reason: format!("missing {name}"),
                });
            }
        }

        debug!(
            message_id = %message_id,
            request_id = %request.request_id,
            origin = %request.params.origin,
            destination = %request.params.destination,
            "Consumed search request"
        );
        Ok(Delivery { message_id, request })
    }

    /// Poll for up to `timeout`, then surface expiry as `NoData`. Callers
    /// cannot distinguish a timeout from a genuinely empty stream.
    pub async fn consume_with_timeout(&self, timeout: Duration) -> CoreResult<Delivery> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.consume().await {
                Err(CoreError::NoData) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
                }
                other => return other,
            }
        }
    }
}
