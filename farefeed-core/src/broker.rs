use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::CoreResult;

/// One raw entry read from a stream. Structured values (the inbound
/// `params`) travel as JSON text inside a field, which is what the broker
/// actually stores.
#[derive(Debug, Clone, Default)]
pub struct StreamRecord {
    pub id: String,
    pub fields: HashMap<String, String>,
}

impl StreamRecord {
    pub fn field(&self, key: &str) -> String {
        self.fields.get(key).cloned().unwrap_or_default()
    }
}

/// The only seam between the pipeline and the broker. Everything above this
/// trait must run unchanged against the in-memory fake.
#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Read up to `count` pending entries for a consumer group. An empty
    /// result means nothing is available right now, not a failure.
    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        stream: &str,
        count: usize,
    ) -> CoreResult<Vec<StreamRecord>>;

    /// Retire a delivered entry from the group's pending list.
    async fn acknowledge(&self, stream: &str, group: &str, message_id: &str) -> CoreResult<()>;

    /// Append an entry to a stream, returning the broker-assigned id.
    async fn append(&self, stream: &str, fields: &[(String, String)]) -> CoreResult<String>;

    /// Store a key that the broker expires on its own after `ttl`.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()>;

    /// Current value of a key, or `None` once expired or never set.
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;
}
