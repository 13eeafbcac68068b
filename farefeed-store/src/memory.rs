use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use farefeed_core::{CoreResult, StreamBroker, StreamRecord};

/// In-memory stand-in for the Redis broker. Used by tests and local runs;
/// behavior mirrors the production adapter: reads move entries to a
/// per-group pending list, acknowledge retires them, keys expire by TTL.
#[derive(Default)]
pub struct InMemoryBroker {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, VecDeque<StreamRecord>>,
    pending: HashMap<String, Vec<StreamRecord>>,
    keys: HashMap<String, (String, Instant)>,
    next_id: u64,
}

fn pending_key(stream: &str, group: &str) -> String {
    format!("{stream}/{group}")
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries waiting to be read from a stream.
    pub fn stream_len(&self, stream: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.streams.get(stream).map_or(0, VecDeque::len)
    }

    /// Snapshot of a stream's unread entries, oldest first.
    pub fn records(&self, stream: &str) -> Vec<StreamRecord> {
        let inner = self.inner.lock().unwrap();
        inner
            .streams
            .get(stream)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .pending
            .get(&pending_key(stream, group))
            .map_or(0, Vec::len)
    }

    /// Push unacknowledged deliveries back onto the stream, simulating the
    /// redelivery a crashed consumer would see.
    pub fn requeue_pending(&self, stream: &str, group: &str) {
        let mut inner = self.inner.lock().unwrap();
        let pending = inner
            .pending
            .remove(&pending_key(stream, group))
            .unwrap_or_default();
        let queue = inner.streams.entry(stream.to_string()).or_default();
        for record in pending.into_iter().rev() {
            queue.push_front(record);
        }
    }

    /// Drop a key immediately, simulating broker-side TTL expiry.
    pub fn expire_key(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.keys.remove(key);
    }
}

#[async_trait]
impl StreamBroker for InMemoryBroker {
    async fn read_group(
        &self,
        group: &str,
        _consumer: &str,
        stream: &str,
        count: usize,
    ) -> CoreResult<Vec<StreamRecord>> {
        let mut inner = self.inner.lock().unwrap();
        let mut delivered = Vec::new();
        for _ in 0..count {
            let Some(record) = inner
                .streams
                .get_mut(stream)
                .and_then(VecDeque::pop_front)
            else {
                break;
            };
            delivered.push(record);
        }
        inner
            .pending
            .entry(pending_key(stream, group))
            .or_default()
            .extend(delivered.iter().cloned());
        Ok(delivered)
    }

    async fn acknowledge(&self, stream: &str, group: &str, message_id: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pending) = inner.pending.get_mut(&pending_key(stream, group)) {
            pending.retain(|r| r.id != message_id);
        }
        Ok(())
    }

    async fn append(&self, stream: &str, fields: &[(String, String)]) -> CoreResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("{}-0", inner.next_id);
        let record = StreamRecord {
            id: id.clone(),
            fields: fields.iter().cloned().collect(),
        };
        inner
            .streams
            .entry(stream.to_string())
            .or_default()
            .push_back(record);
        Ok(id)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .keys
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.keys.get(key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                inner.keys.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_append_then_read_group() {
        let broker = InMemoryBroker::new();
        let id = broker
            .append("s", &fields(&[("request_id", "r1")]))
            .await
            .unwrap();

        let records = broker.read_group("g", "c", "s", 1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].field("request_id"), "r1");

        // Delivered but unacked: pending until acknowledged.
        assert_eq!(broker.pending_count("s", "g"), 1);
        broker.acknowledge("s", "g", &id).await.unwrap();
        assert_eq!(broker.pending_count("s", "g"), 0);
    }

    #[tokio::test]
    async fn test_read_group_empty_stream_is_ok() {
        let broker = InMemoryBroker::new();
        let records = broker.read_group("g", "c", "missing", 1).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_requeue_pending_redelivers_in_order() {
        let broker = InMemoryBroker::new();
        broker.append("s", &fields(&[("n", "1")])).await.unwrap();
        broker.append("s", &fields(&[("n", "2")])).await.unwrap();

        let first = broker.read_group("g", "c", "s", 2).await.unwrap();
        assert_eq!(first.len(), 2);

        broker.requeue_pending("s", "g");
        let again = broker.read_group("g", "c", "s", 2).await.unwrap();
        assert_eq!(again[0].field("n"), "1");
        assert_eq!(again[1].field("n"), "2");
    }

    #[tokio::test]
    async fn test_key_expiry() {
        let broker = InMemoryBroker::new();
        broker
            .set_with_expiry("k", "1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(broker.get("k").await.unwrap().as_deref(), Some("1"));

        broker.expire_key("k");
        assert_eq!(broker.get("k").await.unwrap(), None);
    }
}
