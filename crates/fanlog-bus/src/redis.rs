use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use futures::StreamExt;
use redis::AsyncCommands;
use tracing::{debug, warn};

use fanlog_common::Message;

use crate::error::{BusError, Result};
use crate::{ChannelMessage, GroupStart, MessageBus, Subscription};

/// Redis-backed bus: pub/sub for fan-out, streams for the durable log,
/// lists for the registry.
///
/// Commands run over a pooled connection acquired per operation and returned
/// on drop. Each subscription holds its own dedicated pub/sub connection for
/// its whole lifetime.
pub struct RedisBus {
    client: redis::Client,
    pool: Pool,
}

impl RedisBus {
    /// Builds the client and the command pool. Connections are established
    /// lazily, so a bad address surfaces on the first operation.
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| BusError::Connection(e.to_string()))?;
        let pool = PoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BusError::Pool(e.to_string()))?;
        Ok(Self { client, pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| BusError::Pool(e.to_string()))
    }
}

fn command_error(e: redis::RedisError) -> BusError {
    if e.is_connection_refusal() || e.is_io_error() {
        BusError::Connection(e.to_string())
    } else {
        BusError::Command(e.to_string())
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let receivers: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(command_error)?;
        debug!(channel = %channel, receivers, "published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        debug!(channel = %channel, "subscription established");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(ChannelMessage { channel, payload }),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "dropping undecodable payload");
                    None
                }
            }
        });
        Ok(Subscription::new(stream))
    }

    async fn append(&self, log: &str, message: &Message) -> Result<String> {
        let mut conn = self.conn().await?;
        let entry_id: String = conn
            .xadd_map(log, "*", message.fields())
            .await
            .map_err(command_error)?;
        Ok(entry_id)
    }

    async fn create_consumer_group(
        &self,
        log: &str,
        group: &str,
        start: GroupStart,
        create_log_if_missing: bool,
    ) -> Result<()> {
        let mut conn = self.conn().await?;
        let created = if create_log_if_missing {
            conn.xgroup_create_mkstream::<_, _, _, ()>(log, group, start.entry_id())
                .await
        } else {
            conn.xgroup_create::<_, _, _, ()>(log, group, start.entry_id())
                .await
        };
        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Err(BusError::GroupExists {
                log: log.to_string(),
                group: group.to_string(),
            }),
            Err(e) => Err(command_error(e)),
        }
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(key).await.map_err(command_error)?;
        Ok(())
    }

    async fn append_to_list(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.rpush(key, value).await.map_err(command_error)?;
        Ok(())
    }

    async fn read_list(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let values: Vec<String> = conn.lrange(key, 0, -1).await.map_err(command_error)?;
        Ok(values)
    }
}
