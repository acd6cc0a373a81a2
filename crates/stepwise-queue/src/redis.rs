//! Redis-backed broker.
//!
//! Layout per queue name:
//! - `stepwise:queue:{name}` list of ready messages (LPUSH / RPOP)
//! - `stepwise:queue:{name}:delayed` sorted set scored by due time in ms
//! - `stepwise:queue:{name}:inflight` sorted set of received message ids
//!   scored by visibility deadline in ms
//! - `stepwise:queue:{name}:payloads` hash of in-flight id to payload
//! - `stepwise:queue:{name}:dead` list of payloads that failed to decode
//!
//! A receive is one script call, so a message is never off the ready list
//! without also being tracked as in flight.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, error};

use crate::broker::{QueueDepth, TaskBroker};
use crate::error::{QueueError, QueueResult};
use crate::retry::RetryPolicy;
use crate::task::TaskMessage;

/// Promotes due delayed messages, redelivers expired in-flight ones, then
/// pops the next ready message and tracks it as in flight.
///
/// KEYS: ready, delayed, inflight, payloads.
/// ARGV: now ms, batch limit, visibility deadline ms.
const RECEIVE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, payload in ipairs(due) do
    redis.call('ZREM', KEYS[2], payload)
    redis.call('LPUSH', KEYS[1], payload)
end

local expired = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, id in ipairs(expired) do
    redis.call('ZREM', KEYS[3], id)
    local payload = redis.call('HGET', KEYS[4], id)
    redis.call('HDEL', KEYS[4], id)
    if payload then
        redis.call('RPUSH', KEYS[1], payload)
    end
end

local payload = redis.call('RPOP', KEYS[1])
if not payload then
    return false
end
local ok, decoded = pcall(cjson.decode, payload)
if ok and type(decoded) == 'table' and type(decoded.id) == 'string' then
    redis.call('ZADD', KEYS[3], ARGV[3], decoded.id)
    redis.call('HSET', KEYS[4], decoded.id, payload)
end
return payload
"#;

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Queue name; workers and schedulers must agree on it
    pub queue_name: String,
    /// Maximum number of connections in the pool
    pub pool_size: usize,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Backoff applied to transient failures of `submit`
    pub retry: RetryPolicy,
    /// Maximum delayed messages promoted per receive call
    pub promote_batch: usize,
    /// How long a received message may stay unacknowledged before it is
    /// redelivered
    pub visibility_timeout: Duration,
    /// Pause between polls of an empty ready list
    pub poll_interval: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            queue_name: "stepwise".to_string(),
            pool_size: 10,
            connect_timeout_secs: 5,
            retry: RetryPolicy::default(),
            promote_batch: 100,
            visibility_timeout: crate::memory::DEFAULT_VISIBILITY_TIMEOUT,
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Set the pool size
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }
}

/// Redis-based task broker
pub struct RedisBroker {
    pool: deadpool_redis::Pool,
    config: RedisConfig,
    receive: redis::Script,
}

impl RedisBroker {
    /// Connect with default configuration
    pub async fn new(url: impl Into<String>) -> QueueResult<Self> {
        Self::with_config(RedisConfig::new(url)).await
    }

    /// Connect with custom configuration
    pub async fn with_config(config: RedisConfig) -> QueueResult<Self> {
        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        pool_config.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| QueueError::InvalidConfig(e.to_string()))?;

        let broker = Self {
            pool,
            config,
            receive: redis::Script::new(RECEIVE_SCRIPT),
        };

        // Test connection
        let connect_timeout = Duration::from_secs(broker.config.connect_timeout_secs);
        let mut conn = tokio::time::timeout(connect_timeout, broker.get_connection())
            .await
            .map_err(|_| QueueError::ConnectionFailed(format!("connect timed out after {:?}", connect_timeout)))??;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| QueueError::ConnectionFailed(format!("PING failed: {}", e)))?;

        debug!(queue = %broker.config.queue_name, "Redis broker connected");
        Ok(broker)
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> QueueResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))
    }

    /// Build Redis key for the ready list
    fn ready_key(queue: &str) -> String {
        format!("stepwise:queue:{}", queue)
    }

    /// Build Redis key for the delayed set
    fn delayed_key(queue: &str) -> String {
        format!("stepwise:queue:{}:delayed", queue)
    }

    fn inflight_key(queue: &str) -> String {
        format!("stepwise:queue:{}:inflight", queue)
    }

    fn payloads_key(queue: &str) -> String {
        format!("stepwise:queue:{}:payloads", queue)
    }

    /// Build Redis key for the dead-letter list
    fn dead_key(queue: &str) -> String {
        format!("stepwise:queue:{}:dead", queue)
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn push(&self, json: &str, delay: Duration) -> QueueResult<()> {
        let mut conn = self.get_connection().await?;
        if delay.is_zero() {
            conn.lpush::<_, _, ()>(Self::ready_key(&self.config.queue_name), json)
                .await?;
        } else {
            let due = Self::now_millis().saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX));
            conn.zadd::<_, _, _, ()>(Self::delayed_key(&self.config.queue_name), json, due)
                .await?;
        }
        Ok(())
    }

    async fn pop_ready(&self, conn: &mut deadpool_redis::Connection) -> QueueResult<Option<String>> {
        let queue = &self.config.queue_name;
        let now = Self::now_millis();
        let visible_again = now.saturating_add(
            i64::try_from(self.config.visibility_timeout.as_millis()).unwrap_or(i64::MAX),
        );
        self.receive
            .key(Self::ready_key(queue))
            .key(Self::delayed_key(queue))
            .key(Self::inflight_key(queue))
            .key(Self::payloads_key(queue))
            .arg(now)
            .arg(self.config.promote_batch)
            .arg(visible_again)
            .invoke_async(&mut **conn)
            .await
            .map_err(|e| QueueError::ReceiveFailed(e.to_string()))
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn submit(&self, message: TaskMessage, delay: Duration) -> QueueResult<()> {
        let json = message.to_json()?;
        self.config
            .retry
            .run("submit", || self.push(&json, delay))
            .await
            .map_err(|e| match e {
                QueueError::ConnectionFailed(reason) => QueueError::SubmitFailed(reason),
                other => other,
            })?;
        debug!(task_id = %message.id, task = %message.task, delay_secs = delay.as_secs_f64(), "Submitted task");
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> QueueResult<Option<TaskMessage>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut conn = self.get_connection().await?;
        let json = loop {
            if let Some(json) = self.pop_ready(&mut conn).await? {
                break json;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        };

        match TaskMessage::from_json(&json) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                error!(error = %e, "Undecodable task payload moved to dead-letter list");
                conn.lpush::<_, _, ()>(Self::dead_key(&self.config.queue_name), json)
                    .await?;
                Ok(None)
            }
        }
    }

    async fn ack(&self, message: &TaskMessage) -> QueueResult<()> {
        let mut conn = self.get_connection().await?;
        let queue = &self.config.queue_name;
        let id = message.id.to_string();
        redis::pipe()
            .atomic()
            .zrem(Self::inflight_key(queue), &id)
            .ignore()
            .hdel(Self::payloads_key(queue), &id)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await?;
        debug!(task_id = %message.id, "Acknowledged task");
        Ok(())
    }

    async fn depth(&self) -> QueueResult<QueueDepth> {
        let mut conn = self.get_connection().await?;
        let queue = &self.config.queue_name;
        let ready: usize = conn.llen(Self::ready_key(queue)).await?;
        let delayed: usize = conn.zcard(Self::delayed_key(queue)).await?;
        let in_flight: usize = conn.zcard(Self::inflight_key(queue)).await?;
        let dead: usize = conn.llen(Self::dead_key(queue)).await?;
        Ok(QueueDepth {
            ready,
            delayed,
            in_flight,
            dead,
        })
    }

    fn describe(&self) -> String {
        let host = self
            .config
            .url
            .rsplit_once('@')
            .map(|(_, host)| host)
            .unwrap_or_else(|| self.config.url.trim_start_matches("redis://"));
        format!("redis://{} (queue {})", host, self.config.queue_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config() {
        let config = RedisConfig::new("redis://localhost:6379")
            .with_pool_size(20)
            .with_connect_timeout(10)
            .with_queue_name("agents")
            .with_visibility_timeout(Duration::from_secs(120));

        assert_eq!(config.pool_size, 20);
        assert_eq!(config.visibility_timeout, Duration::from_secs(120));
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.queue_name, "agents");
    }

    #[test]
    fn test_key_generation() {
        assert_eq!(RedisBroker::ready_key("stepwise"), "stepwise:queue:stepwise");
        assert_eq!(RedisBroker::delayed_key("stepwise"), "stepwise:queue:stepwise:delayed");
        assert_eq!(RedisBroker::inflight_key("stepwise"), "stepwise:queue:stepwise:inflight");
        assert_eq!(RedisBroker::payloads_key("stepwise"), "stepwise:queue:stepwise:payloads");
        assert_eq!(RedisBroker::dead_key("stepwise"), "stepwise:queue:stepwise:dead");
    }
}
