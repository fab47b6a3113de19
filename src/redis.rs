use std::sync::Arc;

use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::{AsyncCommands, JsonAsyncCommands};

use crate::error::{ModeratorError, Result};

/// Redis connection manager
#[derive(Clone)]
pub struct RedisManager {
    pool: Arc<Pool>,
}

impl RedisManager {
    /// Create a new Redis manager with configuration
    pub async fn new_with_config(config: &crate::config::Config) -> Result<Self> {
        let redis_url = config.get_redis_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {})",
            config.redis.host,
            config.redis.port,
            config.redis.database
        );

        // Configure the connection pool with settings from config
        let mut cfg = DeadpoolConfig::from_url(&redis_url);

        cfg.pool = Some(PoolConfig {
            max_size: config.redis.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_create_timeout()),
                recycle: Some(config.get_pool_recycle_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ModeratorError::PoolCreation(e.to_string()))?;

        // Test the connection
        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Store a JSON object in Redis. Session records have no TTL; rooms
    /// persist until something outside this service removes them.
    pub async fn json_set<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        path: &str,
        value: &T,
    ) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.json_set::<_, _, _, ()>(key, path, value).await?;
        Ok(())
    }

    /// Get a JSON object from Redis
    pub async fn json_get<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        path: &str,
    ) -> Result<Option<T>> {
        let mut conn = self.get_connection().await?;

        // Use raw command to handle RedisJSON response
        let result: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .arg(path)
            .query_async(&mut *conn)
            .await?;

        match result {
            Some(json_str) => {
                // When using "$" path, RedisJSON returns an array
                if path == "$" {
                    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(&json_str) {
                        if let Some(first_value) = values.first() {
                            let value = serde_json::from_value(first_value.clone())?;
                            Ok(Some(value))
                        } else {
                            Ok(None)
                        }
                    } else {
                        // Try parsing directly if not an array
                        let value = serde_json::from_str(&json_str)?;
                        Ok(Some(value))
                    }
                } else {
                    let value = serde_json::from_str(&json_str)?;
                    Ok(Some(value))
                }
            }
            None => Ok(None),
        }
    }

    /// Append a JSON document to the tail of a list
    pub async fn rpush_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.get_connection().await?;
        conn.rpush::<_, _, ()>(key, json).await?;
        Ok(())
    }

    /// Check if a key exists
    #[allow(dead_code)]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        Ok(conn.exists(key).await?)
    }
}
