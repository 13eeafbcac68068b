use std::sync::Arc;

use farefeed_core::FlightSearcher;
use farefeed_streams::ConsumerHealthMonitor;

#[derive(Clone)]
pub struct AppState {
    pub searcher: Arc<dyn FlightSearcher>,
    pub monitor: Arc<ConsumerHealthMonitor>,
}
