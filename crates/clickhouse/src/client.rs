//! Connection handle, liveness probe and schema bootstrap.

use clickhouse::Client;
use harvest_core::error::DbErrorCode;
use harvest_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::config::ClickHouseConfig;
use crate::schema::{all_tables, create_database};

/// Client bound to the harvester database. Cheap to clone.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    pub fn new(config: ClickHouseConfig) -> Self {
        let mut base = Client::default().with_url(&config.url);
        if let Some(user) = config.username.as_deref() {
            base = base.with_user(user);
        }
        if let Some(password) = config.password.as_deref() {
            base = base.with_password(password);
        }

        info!(url = %config.url, database = %config.database, "ClickHouse client configured");
        Self {
            inner: base.with_database(&config.database),
            config,
        }
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Whether the server answers a trivial query.
    pub async fn ping(&self) -> bool {
        match self.inner.query("SELECT 1").fetch_one::<u8>().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "ClickHouse ping failed");
                false
            }
        }
    }

    /// Creates the database and tables if missing.
    ///
    /// The database is created through the `default` database, since ours
    /// may not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl_err = |e: clickhouse::error::Error| {
            Error::database(DbErrorCode::WriteFailed, format!("Schema setup failed: {}", e))
        };

        self.inner
            .clone()
            .with_database("default")
            .query(&create_database(&self.config.database))
            .execute()
            .await
            .map_err(ddl_err)?;

        for ddl in all_tables() {
            self.inner.query(ddl).execute().await.map_err(ddl_err)?;
        }

        debug!(database = %self.config.database, "ClickHouse schema ready");
        Ok(())
    }
}
