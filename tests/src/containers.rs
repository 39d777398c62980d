//! ClickHouse server for store tests.
//!
//! `HARVESTER_TEST_CLICKHOUSE_URL` points the tests at a running server;
//! otherwise a throwaway container is started per test.

use std::time::{Duration, Instant};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const IMAGE: (&str, &str) = ("clickhouse/clickhouse-server", "24.3");
const HTTP_PORT: u16 = 8123;
const DATABASE: &str = "harvester";
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the store under test connects. Dropping it stops the container.
pub struct ClickHouseServer {
    _container: Option<ContainerAsync<GenericImage>>,
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClickHouseServer {
    pub async fn start() -> Self {
        match Self::from_env() {
            Some(server) => server,
            None => Self::container().await,
        }
    }

    fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let url = var("HARVESTER_TEST_CLICKHOUSE_URL")?;
        Some(Self {
            _container: None,
            url,
            database: var("HARVESTER_TEST_CLICKHOUSE_DB").unwrap_or_else(|| DATABASE.to_string()),
            username: var("HARVESTER_TEST_CLICKHOUSE_USER"),
            password: var("HARVESTER_TEST_CLICKHOUSE_PASSWORD"),
        })
    }

    async fn container() -> Self {
        let (name, tag) = IMAGE;
        // Access management lets the passwordless default user create tables
        let container = GenericImage::new(name, tag)
            .with_wait_for(WaitFor::seconds(5))
            .with_exposed_port(HTTP_PORT.tcp())
            .with_env_var("CLICKHOUSE_DB", DATABASE)
            .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
            .with_env_var("CLICKHOUSE_USER", "default")
            .with_env_var("CLICKHOUSE_PASSWORD", "")
            .start()
            .await
            .expect("Failed to start ClickHouse container");

        let port = container
            .get_host_port_ipv4(HTTP_PORT)
            .await
            .expect("ClickHouse HTTP port not mapped");
        let url = format!("http://127.0.0.1:{}", port);
        wait_until_pingable(&url).await;

        Self {
            _container: Some(container),
            url,
            database: DATABASE.to_string(),
            username: Some("default".to_string()),
            password: None,
        }
    }
}

async fn wait_until_pingable(url: &str) {
    let http = reqwest::Client::new();
    let ping = format!("{}/ping", url);
    let deadline = Instant::now() + READY_TIMEOUT;

    while Instant::now() < deadline {
        let ready = http
            .get(&ping)
            .send()
            .await
            .is_ok_and(|resp| resp.status().is_success());
        if ready {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("ClickHouse at {} did not answer /ping within {:?}", url, READY_TIMEOUT);
}
