//! HTTP client for the lock API
//!
//! One request per call, no retries: the controller's timers are the retry
//! mechanism.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use editlock_api::{
    ACQUIRE_PATH, AcquireRequest, AcquireResponse, ActiveLock, ErrorResult, LOCKS_PATH,
    LockSettingsView, RELEASE_PATH, RENEW_PATH, ReleaseRequest, ReleaseResponse, RenewRequest,
    RenewResponse, SETTINGS_PATH, STATUS_PATH, StatusQuery, StatusResponse,
};

use crate::api::LockApi;
use crate::error::{ClientError, Result};

#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080`
    pub server_addr: String,
    pub connect_timeout_ms: u64,
    /// Kept well under the heartbeat interval so a hung call cannot swallow a tick
    pub read_timeout_ms: u64,
    /// Prefix in front of every route, e.g. `/api`
    pub context_path: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "http://127.0.0.1:8080".to_string(),
            connect_timeout_ms: 3000,
            read_timeout_ms: 10000,
            context_path: String::new(),
        }
    }
}

impl HttpClientConfig {
    pub fn new(server_addr: &str) -> Self {
        Self {
            server_addr: server_addr.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }

    pub fn with_context_path(mut self, path: &str) -> Self {
        self.context_path = path.to_string();
        self
    }
}

pub struct LockHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl LockHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    fn build_url(&self, path: &str) -> String {
        let context_path = self.config.context_path.trim_matches('/');
        if context_path.is_empty() {
            format!("{}{}", self.config.server_addr, path)
        } else {
            format!("{}/{}{}", self.config.server_addr, context_path, path)
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorResult>(&body) {
            Ok(err) => (err.code, err.message),
            Err(_) => (status.as_u16() as i32, body),
        };
        Err(ClientError::Server {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.build_url(path);
        debug!(url = %url, "GET");
        Self::read(self.client.get(&url).send().await?).await
    }

    async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let url = self.build_url(path);
        debug!(url = %url, "GET");
        Self::read(self.client.get(&url).query(query).send().await?).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        debug!(url = %url, "POST");
        Self::read(self.client.post(&url).json(body).send().await?).await
    }
}

#[async_trait]
impl LockApi for LockHttpClient {
    async fn acquire(&self, request: &AcquireRequest) -> Result<AcquireResponse> {
        self.post_json(ACQUIRE_PATH, request).await
    }

    async fn renew(&self, request: &RenewRequest) -> Result<RenewResponse> {
        self.post_json(RENEW_PATH, request).await
    }

    async fn release(&self, request: &ReleaseRequest) -> Result<ReleaseResponse> {
        self.post_json(RELEASE_PATH, request).await
    }

    async fn status(&self, query: &StatusQuery) -> Result<StatusResponse> {
        self.get_with_query(STATUS_PATH, query).await
    }

    async fn settings(&self) -> Result<LockSettingsView> {
        self.get(SETTINGS_PATH).await
    }

    async fn list(&self) -> Result<Vec<ActiveLock>> {
        self.get(LOCKS_PATH).await
    }
}
