#![allow(dead_code)]

pub mod mock_provider;

use reqwest::header::{HeaderMap, SET_COOKIE};
use std::time::Duration;
use todo_auth::{AppState, config::Config, start_server_with_config, start_server_with_state};
use tokio::sync::oneshot;

/// Test server with proper shutdown support
pub struct TestServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a test server with automatic port selection and shutdown support
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_config(Config::test_config_with_port(0)).await
    }

    pub async fn start_with_config(config: Config) -> anyhow::Result<Self> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let port = start_server_with_config(config, shutdown_rx).await?;
        Self::ready(port, shutdown_tx).await
    }

    pub async fn start_with_state(state: AppState) -> anyhow::Result<Self> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let port = start_server_with_state(state, shutdown_rx).await?;
        Self::ready(port, shutdown_tx).await
    }

    async fn ready(port: u16, shutdown_tx: oneshot::Sender<()>) -> anyhow::Result<Self> {
        wait_for_server(port, 20).await?;
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Get the port the server is running on
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            // Give server time to shut down
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// HTTP client that reports redirects instead of following them and keeps no cookies
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build test client")
}

/// Wait for server to be ready with retries
pub async fn wait_for_server(port: u16, max_attempts: u32) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()?;

    for attempt in 1..=max_attempts {
        if let Ok(response) = client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            && response.status().is_success()
        {
            return Ok(());
        }

        if attempt < max_attempts {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    Err(anyhow::anyhow!(
        "Server not ready after {} attempts",
        max_attempts
    ))
}

/// Raw value of the `Set-Cookie` header for `name`, attributes included
pub fn set_cookie_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(str::to_string)
}

/// Value set for cookie `name`, still URL-encoded as sent
pub fn set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = set_cookie_header(headers, name)?;
    let (pair, _) = header.split_once(';').unwrap_or((&header, ""));
    pair.split_once('=').map(|(_, value)| value.to_string())
}

/// The `Location` header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .expect("Location is not ASCII")
        .to_string()
}

/// Value of query parameter `name` in `url` (absolute or relative)
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = url::Url::parse(url)
        .or_else(|_| url::Url::parse("http://relative.invalid").and_then(|base| base.join(url)))
        .ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
