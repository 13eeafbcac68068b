use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use farefeed_core::{CoreError, CoreResult, StreamBroker, StreamRecord};

/// Production broker adapter over Redis streams and keys.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
}

impl RedisBroker {
    pub async fn connect(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail fast on a bad URL or unreachable server.
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(Self { client })
    }

    async fn conn(&self) -> CoreResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(transport)
    }

    /// Create the consumer group if it does not exist yet. BUSYGROUP from a
    /// concurrent or earlier creation is fine.
    pub async fn ensure_group(&self, stream: &str, group: &str) -> CoreResult<()> {
        let mut conn = self.conn().await?;
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                info!(stream, group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream, group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(transport(e)),
        }
    }
}

#[async_trait]
impl StreamBroker for RedisBroker {
    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        stream: &str,
        count: usize,
    ) -> CoreResult<Vec<StreamRecord>> {
        let mut conn = self.conn().await?;
        let reply: redis::Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("STREAMS")
            .arg(stream)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(transport)?;

        parse_read_reply(reply)
    }

    async fn acknowledge(&self, stream: &str, group: &str, message_id: &str) -> CoreResult<()> {
        let mut conn = self.conn().await?;
        let acked: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(message_id)
            .query_async(&mut conn)
            .await
            .map_err(transport)?;

        if acked == 0 {
            warn!(stream, message_id, "XACK matched no pending entry");
        }
        Ok(())
    }

    async fn append(&self, stream: &str, fields: &[(String, String)]) -> CoreResult<String> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (key, value) in fields {
            cmd.arg(key).arg(value);
        }
        cmd.query_async(&mut conn).await.map_err(transport)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(transport)
    }

    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(transport)
    }
}

fn transport(e: redis::RedisError) -> CoreError {
    CoreError::Transport(e.to_string())
}

/// Flatten an XREADGROUP reply into records. The wire shape is
/// `[[stream, [[id, [field, value, ...]], ...]]]`; a Nil reply means the
/// stream had nothing for this group.
fn parse_read_reply(reply: redis::Value) -> CoreResult<Vec<StreamRecord>> {
    let streams = match reply {
        redis::Value::Nil => return Ok(Vec::new()),
        redis::Value::Array(streams) => streams,
        other => {
            return Err(CoreError::Transport(format!(
                "unexpected XREADGROUP reply: {other:?}"
            )))
        }
    };

    let mut records = Vec::new();
    for stream_entry in streams {
        let redis::Value::Array(parts) = stream_entry else {
            continue;
        };
        let Some(redis::Value::Array(entries)) = parts.into_iter().nth(1) else {
            continue;
        };
        for entry in entries {
            let redis::Value::Array(mut pair) = entry else {
                continue;
            };
            if pair.len() < 2 {
                continue;
            }
            let field_values = pair.pop();
            let id = pair
                .pop()
                .and_then(as_string)
                .ok_or_else(|| CoreError::Transport("stream entry without id".to_string()))?;

            let mut fields = HashMap::new();
            if let Some(redis::Value::Array(raw)) = field_values {
                let mut iter = raw.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    if let (Some(key), Some(value)) = (as_string(key), as_string(value)) {
                        fields.insert(key, value);
                    }
                }
            }
            records.push(StreamRecord { id, fields });
        }
    }
    Ok(records)
}

fn as_string(value: redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        redis::Value::SimpleString(s) => Some(s),
        _ => None,
    }
}
