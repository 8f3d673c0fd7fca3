//! Redis-backed cache store.
//!
//! Wraps a [`ConnectionManager`], which reconnects on its own after the
//! initial connect succeeds. Closing drops the manager; later calls fail
//! with [`DependencyError::Released`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tokio::sync::Mutex;

use super::{Backend, CacheStore, DependencyError};

pub struct RedisCache {
    manager: Mutex<Option<ConnectionManager>>,
}

impl RedisCache {
    /// Open a client for `url` and establish the managed connection.
    ///
    /// The first connect is attempted once; failing fast is up to the caller.
    pub async fn connect(url: &str) -> Result<Self, DependencyError> {
        let client = redis::Client::open(url)?;
        let config = ConnectionManagerConfig::new().set_number_of_retries(0);
        let manager = ConnectionManager::new_with_config(client, config).await?;

        Ok(Self {
            manager: Mutex::new(Some(manager)),
        })
    }

    /// Cheap clone of the shared manager; the lock is not held across I/O.
    async fn connection(&self) -> Result<ConnectionManager, DependencyError> {
        self.manager
            .lock()
            .await
            .clone()
            .ok_or(DependencyError::Released)
    }
}

#[async_trait]
impl Backend for RedisCache {
    async fn ping(&self) -> Result<(), DependencyError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DependencyError> {
        self.manager.lock().await.take();
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DependencyError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, DependencyError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }
}
