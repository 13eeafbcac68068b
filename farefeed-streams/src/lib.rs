pub mod consumer;
pub mod health;
pub mod idempotency;
pub mod producer;
pub mod worker;


pub use consumer::{Delivery, SearchRequestConsumer};
pub use health::{ConsumerHealthMonitor, ConsumerMetrics, HealthStatus};
pub use idempotency::IdempotencyTracker;
pub use producer::SearchResultProducer;
pub use worker::{SearchWorker, WorkerSettings};
