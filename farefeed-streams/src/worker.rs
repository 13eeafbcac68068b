use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use farefeed_core::{
    CoreError, CoreResult, Flight, FlightResult, FlightSearcher, SearchRequest, StreamBroker,
};

use crate::consumer::{SearchRequestConsumer, DEFAULT_REQUEST_STREAM};
use crate::health::ConsumerHealthMonitor;
use crate::idempotency::IdempotencyTracker;
use crate::producer::{SearchResultProducer, DEFAULT_RESULT_STREAM};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub request_stream: String,
    pub result_stream: String,
    pub group: String,
    pub consumer_name: String,
    pub idle_backoff: Duration,
    pub consume_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            request_stream: DEFAULT_REQUEST_STREAM.to_string(),
            result_stream: DEFAULT_RESULT_STREAM.to_string(),
            group: "search-service".to_string(),
            consumer_name: "search-service".to_string(),
            idle_backoff: Duration::from_millis(500),
            consume_timeout: Duration::from_secs(5),
        }
    }
}

/// One processing loop: consume → idempotency gate → search → record health
/// → publish outcome → acknowledge. Several workers may run in parallel;
/// they share only the monitor and the broker.
pub struct SearchWorker {
    broker: Arc<dyn StreamBroker>,
    consumer: SearchRequestConsumer,
    producer: SearchResultProducer,
    tracker: IdempotencyTracker,
    monitor: Arc<ConsumerHealthMonitor>,
    searcher: Arc<dyn FlightSearcher>,
    request_stream: String,
    group: String,
    idle_backoff: Duration,
    consume_timeout: Duration,
}

impl SearchWorker {
    pub fn new(
        broker: Arc<dyn StreamBroker>,
        searcher: Arc<dyn FlightSearcher>,
        monitor: Arc<ConsumerHealthMonitor>,
        settings: WorkerSettings,
    ) -> Self {
        let consumer = SearchRequestConsumer::new(
            broker.clone(),
            &settings.group,
            &settings.consumer_name,
        )
        .with_stream(&settings.request_stream);
        let producer =
            SearchResultProducer::new(broker.clone()).with_stream(&settings.result_stream);
        let tracker = IdempotencyTracker::new(broker.clone());

        Self {
            broker,
            consumer,
            producer,
            tracker,
            monitor,
            searcher,
            request_stream: settings.request_stream,
            group: settings.group,
            idle_backoff: settings.idle_backoff,
            consume_timeout: settings.consume_timeout,
        }
    }

    /// Process at most one message, waiting up to the configured consume
    /// timeout for one to arrive. `NoData` propagates so the loop can back
    /// off; poison messages are acknowledged and dropped; transport faults
    /// leave the message pending for redelivery.
    pub async fn run_once(&self) -> CoreResult<()> {
        let delivery = match self.consumer.consume_with_timeout(self.consume_timeout).await {
            Ok(delivery) => delivery,
            Err(
                CoreError::Malformed { message_id, reason }
                | CoreError::Validation { message_id, reason },
            ) => {
                // Retrying bad input reproduces it; no outcome can be
                // attributed to a request id that never decoded.
                warn!(message_id = %message_id, reason = %reason, "Dropping undecodable message");
                self.monitor
                    .record_processing(&message_id, false, Duration::ZERO);
                self.broker
                    .acknowledge(&self.request_stream, &self.group, &message_id)
                    .await?;
                return Ok(());
            }
            Err(other) => return Err(other),
        };

        let request = &delivery.request;
        let started = Instant::now();

        let processed = self
            .tracker
            .process_with_idempotency(&request.request_id, || async {
                let flights = self.searcher.search_cheap(&request.params).await?;
                let results = self.project_results(request, &flights);
                self.producer
                    .publish_success(
                        &request.request_id,
                        &request.correlation_id,
                        &request.chat_id,
                        results,
                    )
                    .await?;
                Ok(())
            })
            .await;

        match processed {
            Ok(ran) => {
                if ran {
                    self.monitor
                        .record_processing(&request.request_id, true, started.elapsed());
                } else {
                    // Skipped duplicates never count as fresh work.
                    debug!(request_id = %request.request_id, "Duplicate delivery retired without reprocessing");
                }
                self.broker
                    .acknowledge(&self.request_stream, &self.group, &delivery.message_id)
                    .await?;
                Ok(())
            }
            Err(CoreError::Search(reason)) => {
                // The search itself failed; the failure outcome is the
                // terminal answer for this request, so it still gets
                // published and the message retired.
                warn!(request_id = %request.request_id, error = %reason, "Search failed, publishing error outcome");
                self.producer
                    .publish_error(
                        &request.request_id,
                        &request.correlation_id,
                        &request.chat_id,
                        &reason,
                    )
                    .await?;
                self.monitor
                    .record_processing(&request.request_id, false, started.elapsed());
                self.broker
                    .acknowledge(&self.request_stream, &self.group, &delivery.message_id)
                    .await?;
                Ok(())
            }
            Err(other) => {
                // Broker or encoding fault mid-pipeline: leave the message
                // pending so it is redelivered.
                self.monitor
                    .record_processing(&request.request_id, false, started.elapsed());
                Err(other)
            }
        }
    }

    fn project_results(&self, request: &SearchRequest, flights: &[Flight]) -> Vec<FlightResult> {
        let passengers = request.params.passengers.max(1);
        flights
            .iter()
            .map(|flight| FlightResult {
                origin: flight.origin.clone(),
                destination: flight.destination.clone(),
                depart_date: flight
                    .depart_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                return_date: flight
                    .return_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                price: flight.price,
                currency: request.params.currency.clone(),
                link: self.searcher.partner_link(flight, passengers),
            })
            .collect()
    }

    /// Loop forever. Idle and faulted iterations both back off before the
    /// next poll; a transport fault is retried by simply reading again.
    pub async fn run(&self) {
        info!(
            stream = %self.request_stream,
            group = %self.group,
            "Search worker started"
        );
        loop {
            match self.run_once().await {
                Ok(()) => {}
                Err(CoreError::NoData) => {
                    debug!("No pending search requests");
                    tokio::time::sleep(self.idle_backoff).await;
                }
                Err(e) => {
                    error!(error = %e, "Worker iteration failed");
                    tokio::time::sleep(self.idle_backoff).await;
                }
            }
        }
    }
}
