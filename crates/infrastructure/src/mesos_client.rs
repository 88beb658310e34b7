use std::time::Duration;

use async_trait::async_trait;
use mesoslog_config::AppConfig;
use mesoslog_domain::{ClusterStateSource, MasterState, NodeState, ReadPage, SandboxFileReader};
use mesoslog_errors::{MesosLogError, MesosLogResult};
use reqwest::header::LOCATION;
use reqwest::{redirect, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// 基于 HTTP 的 Mesos master/agent 客户端
///
/// 所有请求都带有统一的超时，避免单个无响应节点阻塞对应的跟踪任务。
pub struct MesosHttpClient {
    http_client: reqwest::Client,
    /// 不跟随重定向，用于读取 `/master/redirect` 的 Location
    redirect_client: reqwest::Client,
    files_port: u16,
}

impl MesosHttpClient {
    pub fn new(request_timeout: Duration, files_port: u16) -> MesosLogResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MesosLogError::Internal(format!("创建HTTP客户端失败: {e}")))?;
        let redirect_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| MesosLogError::Internal(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            http_client,
            redirect_client,
            files_port,
        })
    }

    pub fn from_config(config: &AppConfig) -> MesosLogResult<Self> {
        Self::new(config.http.request_timeout(), config.agent.files_port)
    }

    fn files_url(&self, host: &str, endpoint: &str) -> String {
        format!("http://{}:{}/files/{}", host, self.files_port, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> MesosLogResult<T> {
        let body = self.get_text(self.http_client.get(url), url).await?;
        serde_json::from_str(&body).map_err(|e| {
            MesosLogError::malformed_response(format!("Failed to parse response from {url}: {e}"))
        })
    }

    async fn get_text(&self, request: reqwest::RequestBuilder, url: &str) -> MesosLogResult<String> {
        let response = send(request, url).await?;
        response
            .text()
            .await
            .map_err(|e| MesosLogError::transport(format!("Failed to read body from {url}: {e}")))
    }
}

async fn send(request: reqwest::RequestBuilder, url: &str) -> MesosLogResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| MesosLogError::transport(format!("Request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        warn!("Request to {} returned HTTP {}", url, status);
        return Err(MesosLogError::transport(format!(
            "Request to {url} returned HTTP {status}"
        )));
    }
    Ok(response)
}

#[async_trait]
impl ClusterStateSource for MesosHttpClient {
    async fn resolve_leader(&self, host: &str, port: u16) -> MesosLogResult<String> {
        let url = format!("http://{host}:{port}/master/redirect");
        let response = self
            .redirect_client
            .get(&url)
            .send()
            .await
            .map_err(|e| MesosLogError::transport(format!("Request to {url} failed: {e}")))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                MesosLogError::malformed_response(format!(
                    "{url} returned HTTP {} without a Location header",
                    response.status()
                ))
            })?;

        // Mesos 返回的 Location 通常不带协议，如 `//10.0.0.1:5050`
        let leader = Url::parse(&url)
            .and_then(|base| base.join(location))
            .map_err(|e| {
                MesosLogError::malformed_response(format!("Invalid leader location {location}: {e}"))
            })?;

        let leader = leader.as_str().trim_end_matches('/').to_string();
        debug!("Resolved leading master {} via {}", leader, url);
        Ok(leader)
    }

    async fn master_state(&self, master_url: &str) -> MesosLogResult<MasterState> {
        let url = format!("{}/state.json", master_url.trim_end_matches('/'));
        self.get_json(&url).await
    }

    async fn node_state(&self, state_url: &str) -> MesosLogResult<NodeState> {
        self.get_json(state_url).await
    }
}

#[async_trait]
impl SandboxFileReader for MesosHttpClient {
    async fn read_page(
        &self,
        host: &str,
        path: &str,
        offset: u64,
        length: usize,
    ) -> MesosLogResult<ReadPage> {
        let url = self.files_url(host, "read.json");
        let request = self.http_client.get(&url).query(&[
            ("path", path.to_string()),
            ("offset", offset.to_string()),
            ("length", length.to_string()),
        ]);
        let body = self.get_text(request, &url).await?;
        serde_json::from_str(&body).map_err(|e| {
            MesosLogError::malformed_response(format!("Failed to parse page from {url}: {e}"))
        })
    }

    async fn download(&self, host: &str, path: &str) -> MesosLogResult<Vec<u8>> {
        let url = self.files_url(host, "download.json");
        let request = self.http_client.get(&url).query(&[("path", path)]);
        let response = send(request, &url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MesosLogError::transport(format!("Failed to read body from {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_url() {
        let client = MesosHttpClient::new(Duration::from_secs(1), 5051).unwrap();
        assert_eq!(
            client.files_url("node-1", "read.json"),
            "http://node-1:5051/files/read.json"
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = AppConfig::default();
        config.agent.files_port = 15051;
        let client = MesosHttpClient::from_config(&config).unwrap();
        assert_eq!(
            client.files_url("h", "download.json"),
            "http://h:15051/files/download.json"
        );
    }
}
