use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use farefeed_core::{CoreError, CoreResult, FlightResult, SearchOutcome, StreamBroker};

pub const DEFAULT_RESULT_STREAM: &str = "search.results";

/// Serializes search outcomes onto the result stream. The outbound record
/// shape is the same for success and failure: an error outcome still
/// carries `results: "[]"` so downstream parsing never branches on missing
/// fields.
pub struct SearchResultProducer {
    broker: Arc<dyn StreamBroker>,
    stream: String,
}

impl SearchResultProducer {
    pub fn new(broker: Arc<dyn StreamBroker>) -> Self {
        Self {
            broker,
            stream: DEFAULT_RESULT_STREAM.to_string(),
        }
    }

    pub fn with_stream(mut self, stream: &str) -> Self {
        self.stream = stream.to_string();
        self
    }

    /// Publish one outcome, returning the broker message id. A timestamp is
    /// assigned only if the caller never set one.
    pub async fn publish(&self, outcome: SearchOutcome) -> CoreResult<String> {
        let timestamp = outcome.timestamp.unwrap_or_else(Utc::now);

        let mut fields = vec![
            ("request_id".to_string(), outcome.request_id.clone()),
            ("correlation_id".to_string(), outcome.correlation_id.clone()),
            ("chat_id".to_string(), outcome.chat_id.clone()),
            ("count".to_string(), outcome.count.to_string()),
            ("timestamp".to_string(), timestamp.timestamp().to_string()),
        ];

        match outcome.error.as_deref() {
            Some(message) if !message.is_empty() => {
                fields.push(("error".to_string(), message.to_string()));
                fields.push(("results".to_string(), "[]".to_string()));
            }
            _ => {
                let results = serde_json::to_string(&outcome.results)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                fields.push(("results".to_string(), results));
            }
        }

        let message_id = self.broker.append(&self.stream, &fields).await?;
        info!(
            request_id = %outcome.request_id,
            chat_id = %outcome.chat_id,
            count = outcome.count,
            error = outcome.error.is_some(),
            message_id = %message_id,
            "Published search outcome"
        );
        Ok(message_id)
    }

    pub async fn publish_success(
        &self,
        request_id: &str,
        correlation_id: &str,
        chat_id: &str,
        results: Vec<FlightResult>,
    ) -> CoreResult<String> {
        self.publish(SearchOutcome::success(
            request_id,
            correlation_id,
            chat_id,
            results,
        ))
        .await
    }

    pub async fn publish_error(
        &self,
        request_id: &str,
        correlation_id: &str,
        chat_id: &str,
        message: &str,
    ) -> CoreResult<String> {
        self.publish(SearchOutcome::failure(
            request_id,
            correlation_id,
            chat_id,
            message,
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use farefeed_store::InMemoryBroker;

    fn sample_results() -> Vec<FlightResult> {
        vec![
            FlightResult {
                origin: "MOW".to_string(),
                destination: "PAR".to_string(),
                depart_date: "2024-12-15".to_string(),
                return_date: "2024-12-22".to_string(),
                price: 15000,
                currency: "rub".to_string(),
                link: "https://example.com/f1".to_string(),
            },
            FlightResult {
                origin: "MOW".to_string(),
                destination: "PAR".to_string(),
                depart_date: "2024-12-20".to_string(),
                return_date: "2024-12-27".to_string(),
                price: 17500,
                currency: "rub".to_string(),
                link: "https://example.com/f2".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_publish_success_round_trip() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = SearchResultProducer::new(broker.clone());
        let results = sample_results();

        let message_id = producer
            .publish_success("r1", "corr-1", "c1", results.clone())
            .await
            .unwrap();
        assert!(!message_id.is_empty());

        let records = broker.records(DEFAULT_RESULT_STREAM);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.field("request_id"), "r1");
        assert_eq!(record.field("correlation_id"), "corr-1");
        assert_eq!(record.field("chat_id"), "c1");
        assert_eq!(record.field("count"), "2");
        assert!(record.fields.get("error").is_none());

        let decoded: Vec<FlightResult> =
            serde_json::from_str(&record.field("results")).unwrap();
        assert_eq!(decoded, results);
    }

    #[tokio::test]
    async fn test_publish_error_keeps_schema_shape() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = SearchResultProducer::new(broker.clone());

        producer
            .publish_error("r1", "corr-1", "c1", "API timeout")
            .await
            .unwrap();

        let records = broker.records(DEFAULT_RESULT_STREAM);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.field("error"), "API timeout");
        assert_eq!(record.field("results"), "[]");
        assert_eq!(record.field("count"), "0");
    }

    #[tokio::test]
    async fn test_publish_assigns_timestamp_when_unset() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = SearchResultProducer::new(broker.clone());

        let before = Utc::now().timestamp();
        producer
            .publish(SearchOutcome::success("r1", "", "c1", Vec::new()))
            .await
            .unwrap();
        let after = Utc::now().timestamp();

        let records = broker.records(DEFAULT_RESULT_STREAM);
        let ts: i64 = records[0].field("timestamp").parse().unwrap();
        assert!(ts >= before && ts <= after);
    }

    #[tokio::test]
    async fn test_publish_preserves_caller_timestamp() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = SearchResultProducer::new(broker.clone());

        let fixed = Utc.with_ymd_and_hms(2024, 12, 15, 10, 30, 0).unwrap();
        let mut outcome = SearchOutcome::success("r1", "", "c1", Vec::new());
        outcome.timestamp = Some(fixed);
        producer.publish(outcome).await.unwrap();

        let records = broker.records(DEFAULT_RESULT_STREAM);
        assert_eq!(
            records[0].field("timestamp"),
            fixed.timestamp().to_string()
        );
    }

    #[tokio::test]
    async fn test_zero_results_without_error_is_valid() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = SearchResultProducer::new(broker.clone());

        producer
            .publish_success("r1", "", "c1", Vec::new())
            .await
            .unwrap();

        let records = broker.records(DEFAULT_RESULT_STREAM);
        assert_eq!(records[0].field("count"), "0");
        assert_eq!(records[0].field("results"), "[]");
        assert!(records[0].fields.get("error").is_none());
    }
}
