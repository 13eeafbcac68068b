pub mod broker;
pub mod model;
pub mod searcher;

pub use broker::{StreamBroker, StreamRecord};
pub use model::{Flight, FlightResult, SearchOutcome, SearchParams, SearchRequest};
pub use searcher::FlightSearcher;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("broker transport error: {0}")]
    Transport(String),
    #[error("no data available")]
    NoData,
    #[error("malformed message {message_id}: {reason}")]
    Malformed { message_id: String, reason: String },
    #[error("invalid message {message_id}: {reason}")]
    Validation { message_id: String, reason: String },
    #[error("search failed: {0}")]
    Search(String),
    #[error("failed to encode results: {0}")]
    Serialization(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
