use crate::postgres::PostgresConfig;
use anyhow::{Context, Result};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

const APPLICATION_NAME: &str = "meshlog";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled PostgreSQL connection handle shared by the repositories
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Build the connection pool. No connection is opened until the first
    /// checkout, so an unreachable server surfaces in [`ping`](Self::ping).
    pub fn from_config(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.application_name = Some(APPLICATION_NAME.to_string());
        cfg.connect_timeout = Some(CONNECT_TIMEOUT);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.max_pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .with_context(|| {
                format!(
                    "failed to create postgres pool for {}:{}/{}",
                    config.host, config.port, config.database
                )
            })?;
        debug!(max_size = config.max_pool_size, "postgres pool created");

        Ok(Self { pool })
    }

    /// Checks connectivity and logs the server version
    pub async fn ping(&self) -> Result<()> {
        let conn = self.get_connection().await?;
        let row = conn
            .query_one("SELECT version()", &[])
            .await
            .context("postgres ping failed")?;
        let version: String = row.get(0);
        info!(server_version = %version, "connected to postgres");
        Ok(())
    }

    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .context("no postgres connection available")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_follows_config() {
        let config = PostgresConfig {
            max_pool_size: 3,
            ..Default::default()
        };
        let client = PostgresClient::from_config(&config).unwrap();
        assert_eq!(client.pool.status().max_size, 3);
        assert_eq!(client.pool.status().size, 0);
    }
}
