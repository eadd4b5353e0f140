//! Per-fingerprint connection pool cache, adapted from
//! services/mysql_pool_manager.rs's `MySQLPoolManager`: lock-free read on
//! the fast path, create-on-miss on the slow path, same DashMap shape —
//! swapping `mysql_async::Pool` for a small bounded pool of
//! `tokio_postgres::Client` connections gated by a semaphore (pulling a
//! full connection-pool crate in for one driver seam is unwarranted).

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_postgres::{Client, Config, NoTls};

use crate::models::{ConnectionConfig, Fingerprint};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to connect: {0}")]
    Connect(String),
}

const MAX_CONNECTIONS_PER_FINGERPRINT: usize = 8;

struct PostgresPool {
    clients: Mutex<Vec<Client>>,
    semaphore: Arc<Semaphore>,
    config: Config,
}

async fn connect(config: &Config) -> Result<Client, PoolError> {
    let (client, connection) = config.connect(NoTls).await.map_err(|e| PoolError::Connect(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e, "postgres connection task ended with error");
        }
    });
    Ok(client)
}

fn config_for(connection: &ConnectionConfig) -> Config {
    let mut config = Config::new();
    config
        .host(&connection.host)
        .port(connection.port)
        .dbname(&connection.database)
        .user(&connection.credentials.user)
        .password(&connection.credentials.password);
    config
}

/// `DashMap<Fingerprint, PostgresPool>` keyed lazy-pool cache.
#[derive(Default)]
pub struct PoolManager {
    pools: DashMap<Fingerprint, Arc<PostgresPool>>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks out a client for `connection`'s fingerprint, creating the
    /// pool on first use (fast path: lock-free `DashMap` read when the
    /// pool already exists).
    pub async fn checkout(&self, connection: &ConnectionConfig) -> Result<PoolCheckout, PoolError> {
        let fingerprint = connection.fingerprint();

        let pool = if let Some(pool) = self.pools.get(&fingerprint) {
            pool.clone()
        } else {
            let pool = Arc::new(PostgresPool {
                clients: Mutex::new(Vec::new()),
                semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS_PER_FINGERPRINT)),
                config: config_for(connection),
            });
            self.pools.insert(fingerprint, pool.clone());
            tracing::info!(%fingerprint, host = %connection.host, "created postgres connection pool");
            pool
        };

        PoolCheckout::new(pool).await
    }

    pub fn remove_pool(&self, fingerprint: Fingerprint) {
        if self.pools.remove(&fingerprint).is_some() {
            tracing::info!(%fingerprint, "removed postgres connection pool");
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

/// A checked-out client. Returns the client to its pool's free list on
/// drop instead of closing the connection.
pub struct PoolCheckout {
    pool: Arc<PostgresPool>,
    permit: Option<OwnedSemaphorePermit>,
    client: Option<Client>,
}

impl PoolCheckout {
    async fn new(pool: Arc<PostgresPool>) -> Result<Self, PoolError> {
        let permit = pool.semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let client = {
            let mut clients = pool.clients.lock().await;
            clients.pop()
        };
        let client = match client {
            Some(client) if !client.is_closed() => client,
            _ => connect(&pool.config).await?,
        };
        Ok(Self { pool, permit: Some(permit), client: Some(client) })
    }
}

impl std::ops::Deref for PoolCheckout {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client taken only on drop")
    }
}

impl Drop for PoolCheckout {
    fn drop(&mut self) {
        self.permit.take();
        if let Some(client) = self.client.take() {
            if !client.is_closed() {
                if let Ok(mut clients) = self.pool.clients.try_lock() {
                    clients.push(client);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credentials, Dialect};

    fn connection(host: &str) -> ConnectionConfig {
        ConnectionConfig {
            dialect: Dialect::Postgres,
            host: host.to_string(),
            port: 5432,
            database: "sales".to_string(),
            schema: None,
            credentials: Credentials { user: "analyst".to_string(), password: "x".to_string() },
        }
    }

    #[test]
    fn pool_count_starts_empty() {
        let manager = PoolManager::new();
        assert_eq!(manager.pool_count(), 0);
    }

    #[test]
    fn remove_pool_on_unknown_fingerprint_is_a_no_op() {
        let manager = PoolManager::new();
        manager.remove_pool(connection("db").fingerprint());
        assert_eq!(manager.pool_count(), 0);
    }
}
