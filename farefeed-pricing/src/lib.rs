pub mod client;
pub mod format;

pub use client::TravelpayoutsClient;
