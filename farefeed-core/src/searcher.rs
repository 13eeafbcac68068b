use async_trait::async_trait;

use crate::model::{Flight, SearchParams};
use crate::CoreResult;

/// The upstream flight-search collaborator. The production implementation
/// lives in farefeed-pricing; workers and HTTP handlers only see this trait.
#[async_trait]
pub trait FlightSearcher: Send + Sync {
    /// Find the cheapest itineraries for the given route.
    async fn search_cheap(&self, params: &SearchParams) -> CoreResult<Vec<Flight>>;

    /// Build the purchase link for one itinerary.
    fn partner_link(&self, flight: &Flight, passengers: u32) -> String;

    /// Render the chat-facing message for a list of itineraries.
    fn format_message(
        &self,
        origin_city: &str,
        dest_city: &str,
        flights: &[Flight],
        passengers: u32,
    ) -> String;
}
