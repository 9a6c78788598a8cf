//! Remote repository
//!
//! HTTP access to the config service: conditional fetch of one namespace
//! and the hanging notification GET. Service addresses rotate round-robin
//! on transport errors and 5xx so a dead node does not pin the client.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::StatusCode;
use url::Url;

use pomelo_common::{ConfigNotification, NotificationRequest, NsKey, PomeloConfig};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::sign;

pub struct RemoteRepository {
    config: Arc<ClientConfig>,
    /// Short-timeout client for config fetches
    client: reqwest::Client,
    /// Long-timeout client for the hanging notification GET
    poll_client: reqwest::Client,
    current_server_index: Mutex<usize>,
    local_ip: Option<String>,
}

impl RemoteRepository {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()?;
        let poll_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.long_poll_read_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            poll_client,
            current_server_index: Mutex::new(0),
            local_ip: discover_local_ip(),
        })
    }

    fn current_server(&self) -> String {
        let index = *self.current_server_index.lock();
        self.config.config_services[index % self.config.config_services.len()].clone()
    }

    fn switch_to_next_server(&self) {
        let mut index = self.current_server_index.lock();
        *index = (*index + 1) % self.config.config_services.len();
        tracing::debug!(index = *index, "switched to next config service");
    }

    /// Fetch the current release of one namespace.
    ///
    /// `Ok(Some(_))` carries a new release, `Ok(None)` means the supplied
    /// release key is still current (304).
    pub async fn fetch(
        &self,
        key: &NsKey,
        namespace_name: &str,
        release_key: Option<&str>,
    ) -> Result<Option<PomeloConfig>> {
        let mut last_error: Option<ClientError> = None;

        for _ in 0..self.config.config_services.len() {
            let base = self.current_server();
            let mut url = Url::parse(&format!(
                "{}/configs/{}/{}/{}",
                base, key.app_id, key.cluster, namespace_name
            ))?;
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(release_key) = release_key {
                    pairs.append_pair("releaseKey", release_key);
                }
                if let Some(ip) = &self.local_ip {
                    pairs.append_pair("ip", ip);
                }
                if let Some(label) = &self.config.env {
                    pairs.append_pair("label", label);
                }
            }

            let request = self.authorized(self.client.get(url.clone()), &url);
            match request.send().await {
                Ok(response) => match response.status() {
                    StatusCode::NOT_MODIFIED => return Ok(None),
                    StatusCode::NOT_FOUND => {
                        return Err(ClientError::NotFound(key.to_string()));
                    }
                    status if status.is_success() => {
                        let config = response.json::<PomeloConfig>().await?;
                        return Ok(Some(config));
                    }
                    status if status.is_server_error() => {
                        tracing::warn!(%status, server = %base, "config fetch failed, switching server");
                        self.switch_to_next_server();
                        last_error = Some(ClientError::ServerStatus(status.as_u16()));
                    }
                    status => return Err(ClientError::ServerStatus(status.as_u16())),
                },
                Err(e) => {
                    tracing::warn!(error = %e, server = %base, "config fetch transport error, switching server");
                    self.switch_to_next_server();
                    last_error = Some(e.into());
                }
            }
        }

        Err(ClientError::AllServersFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// Hanging GET against `/notifications/v2`.
    ///
    /// `Ok(Some(_))` carries advanced namespaces, `Ok(None)` is the 304
    /// hold-timeout answer.
    pub async fn poll_notifications(
        &self,
        requests: &[NotificationRequest],
    ) -> Result<Option<Vec<ConfigNotification>>> {
        let payload = serde_json::to_string(requests)
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let mut last_error: Option<ClientError> = None;

        for _ in 0..self.config.config_services.len() {
            let base = self.current_server();
            let mut url = Url::parse(&format!("{}/notifications/v2", base))?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("appId", &self.config.app_id);
                pairs.append_pair("cluster", &self.config.cluster);
                pairs.append_pair("notifications", &payload);
                if let Some(ip) = &self.local_ip {
                    pairs.append_pair("ip", ip);
                }
            }

            let request = self.authorized(self.poll_client.get(url.clone()), &url);
            match request.send().await {
                Ok(response) => match response.status() {
                    StatusCode::NOT_MODIFIED => return Ok(None),
                    status if status.is_success() => {
                        let notifications = response.json::<Vec<ConfigNotification>>().await?;
                        return Ok(Some(notifications));
                    }
                    status if status.is_server_error() => {
                        tracing::warn!(%status, server = %base, "notification poll failed, switching server");
                        self.switch_to_next_server();
                        last_error = Some(ClientError::ServerStatus(status.as_u16()));
                    }
                    status => return Err(ClientError::ServerStatus(status.as_u16())),
                },
                Err(e) => {
                    tracing::warn!(error = %e, server = %base, "notification poll transport error, switching server");
                    self.switch_to_next_server();
                    last_error = Some(e.into());
                }
            }
        }

        Err(ClientError::AllServersFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn authorized(&self, request: reqwest::RequestBuilder, url: &Url) -> reqwest::RequestBuilder {
        let Some(secret) = &self.config.access_key_secret else {
            return request;
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = sign::signature(timestamp, url, secret);
        request
            .header(sign::TIMESTAMP_HEADER, timestamp.to_string())
            .header(
                sign::AUTHORIZATION_HEADER,
                sign::authorization(&self.config.app_id, &signature),
            )
    }
}

fn discover_local_ip() -> Option<String> {
    let addrs = if_addrs::get_if_addrs().ok()?;
    addrs
        .iter()
        .find(|iface| !iface.is_loopback() && iface.ip().is_ipv4())
        .map(|iface| iface.ip().to_string())
}
