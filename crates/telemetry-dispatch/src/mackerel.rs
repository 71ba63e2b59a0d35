// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mackerel REST API client and the host identity metrics are posted under.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::SinkError;
use crate::graph_defs::GraphDef;
use crate::metric::MetricSample;
use crate::sink::MetricsSink;

pub const DEFAULT_API_BASE: &str = "https://api.mackerelio.com";

/// Survives across warm starts of the same sandbox, so a restarted extension reports
/// under the host it created before.
pub const HOST_ID_FILE_PATH: &str = "/tmp/mackerel-lambda-extension-agent.id";

const API_KEY_HEADER: &str = "X-Api-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateHostParam {
    /// Unique per execution environment
    pub name: String,
    pub display_name: String,
    pub role_fullnames: Vec<String>,
}

#[derive(Deserialize)]
struct CreateHostResponse {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HostMetricValue<'a> {
    host_id: &'a str,
    #[serde(flatten)]
    sample: &'a MetricSample,
}

#[derive(Clone)]
pub struct MackerelClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl std::fmt::Debug for MackerelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MackerelClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl MackerelClient {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self, SinkError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SinkError::InvalidConfig(
                "Mackerel API key is not set".to_string(),
            ));
        }
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| SinkError::Transport {
                endpoint: api_base.clone(),
                source,
            })?;
        Ok(Self {
            client,
            api_base,
            api_key,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, SinkError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| SinkError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            endpoint: path.to_string(),
            status,
            body,
        })
    }

    /// Registers a host and returns its id.
    pub async fn create_host(&self, param: &CreateHostParam) -> Result<String, SinkError> {
        const PATH: &str = "/api/v0/hosts";
        let body = json!({
            "name": param.name,
            "displayName": param.display_name,
            "memo": "",
            "meta": {},
            "interfaces": [],
            "roleFullnames": param.role_fullnames,
            "checks": [],
        });
        let response = self.post_json(PATH, &body).await?;
        response
            .json::<CreateHostResponse>()
            .await
            .map(|created| created.id)
            .map_err(|e| SinkError::Decode {
                endpoint: PATH.to_string(),
                message: e.to_string(),
            })
    }

    pub async fn retire_host(&self, host_id: &str) -> Result<(), SinkError> {
        self.post_json(&format!("/api/v0/hosts/{host_id}/retire"), &json!({}))
            .await
            .map(|_| ())
    }

    pub async fn create_graph_defs(&self, defs: &[GraphDef]) -> Result<(), SinkError> {
        self.post_json("/api/v0/graph-defs/create", defs)
            .await
            .map(|_| ())
    }

    pub async fn post_host_metric_values(
        &self,
        host_id: &str,
        samples: &[MetricSample],
    ) -> Result<(), SinkError> {
        let values: Vec<HostMetricValue<'_>> = samples
            .iter()
            .map(|sample| HostMetricValue { host_id, sample })
            .collect();
        self.post_json("/api/v0/tsdb", &values).await.map(|_| ())
    }
}

/// A Mackerel host this execution environment reports as.
#[derive(Debug, Clone)]
pub struct MackerelHost {
    client: MackerelClient,
    id: String,
}

impl MackerelHost {
    #[must_use]
    pub fn new(client: MackerelClient, id: impl Into<String>) -> Self {
        Self {
            client,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn create_graph_defs(&self, defs: &[GraphDef]) -> Result<(), SinkError> {
        info!("Creating graph definitions");
        self.client.create_graph_defs(defs).await
    }
}

#[async_trait]
impl MetricsSink for MackerelHost {
    async fn post_metrics(&self, samples: &[MetricSample]) -> Result<(), SinkError> {
        debug!("Posting {} metrics for host {}", samples.len(), self.id);
        self.client
            .post_host_metric_values(&self.id, samples)
            .await
    }

    async fn retire(&self) -> Result<(), SinkError> {
        info!("Retiring host {}", self.id);
        self.client.retire_host(&self.id).await
    }
}

/// Reuses the host id persisted at `id_file` by an earlier run in this sandbox, or creates
/// a new host and persists its id there.
pub async fn create_or_get_host(
    client: MackerelClient,
    param: &CreateHostParam,
    id_file: &Path,
) -> Result<MackerelHost, SinkError> {
    if let Some(id) = read_host_id(id_file) {
        info!("Host already exists. hostID = {id}");
        return Ok(MackerelHost::new(client, id));
    }

    let id = client.create_host(param).await?;
    info!("Created a new host. hostID = {id}");
    if let Err(e) = std::fs::write(id_file, &id) {
        warn!(
            "Failed to persist host id to {}: {e}. A restart will create another host",
            id_file.display()
        );
    }
    Ok(MackerelHost::new(client, id))
}

fn read_host_id(id_file: &Path) -> Option<String> {
    let content = std::fs::read_to_string(id_file).ok()?;
    let id = content.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_defs::graph_defs;
    use mockito::{Matcher, Server};

    fn param() -> CreateHostParam {
        CreateHostParam {
            name: "4d0a0d3c-boot".to_string(),
            display_name: "my-function".to_string(),
            role_fullnames: vec!["service:role".to_string()],
        }
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(matches!(
            MackerelClient::new("", DEFAULT_API_BASE),
            Err(SinkError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_create_host() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/hosts")
            .match_header("X-Api-Key", "mock-api-key")
            .match_body(Matcher::PartialJson(json!({
                "name": "4d0a0d3c-boot",
                "displayName": "my-function",
                "roleFullnames": ["service:role"]
            })))
            .with_status(200)
            .with_body(r#"{"id":"3yAYEDLXKL5"}"#)
            .create_async()
            .await;

        let client = MackerelClient::new("mock-api-key", server.url()).unwrap();
        assert_eq!(client.create_host(&param()).await.unwrap(), "3yAYEDLXKL5");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_host_undecodable_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v0/hosts")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = MackerelClient::new("mock-api-key", server.url()).unwrap();
        assert!(matches!(
            client.create_host(&param()).await,
            Err(SinkError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_post_metrics_wire_shape() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/tsdb")
            .match_header("X-Api-Key", "mock-api-key")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!([
                {"hostId": "host-1", "name": "custom.a.avg", "time": 100, "value": 1.5},
                {"hostId": "host-1", "name": "custom.a.max", "time": 100, "value": 2.0}
            ])))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let host = MackerelHost::new(
            MackerelClient::new("mock-api-key", server.url()).unwrap(),
            "host-1",
        );
        host.post_metrics(&[
            MetricSample::new("custom.a.avg", 100, 1.5),
            MetricSample::new("custom.a.max", 100, 2.0),
        ])
        .await
        .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_post_is_status_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v0/tsdb")
            .with_status(403)
            .with_body(r#"{"error":{"message":"forbidden"}}"#)
            .create_async()
            .await;

        let host = MackerelHost::new(
            MackerelClient::new("bad-key", server.url()).unwrap(),
            "host-1",
        );
        match host.post_metrics(&[MetricSample::new("x", 1, 1.0)]).await {
            Err(SinkError::Status { status, body, .. }) => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
                assert!(body.contains("forbidden"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let host = MackerelHost::new(
            MackerelClient::new("mock-api-key", "http://127.0.0.1:1").unwrap(),
            "host-1",
        );
        assert!(matches!(
            host.post_metrics(&[MetricSample::new("x", 1, 1.0)]).await,
            Err(SinkError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_retire() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/hosts/host-1/retire")
            .match_body(Matcher::Json(json!({})))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let host = MackerelHost::new(
            MackerelClient::new("mock-api-key", format!("{}/", server.url())).unwrap(),
            "host-1",
        );
        host.retire().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_graph_defs() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/graph-defs/create")
            .match_body(Matcher::PartialJson(json!([
                {"name": "custom.lambda.platform.initReport.duration", "unit": "seconds"}
            ])))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let host = MackerelHost::new(
            MackerelClient::new("mock-api-key", server.url()).unwrap(),
            "host-1",
        );
        host.create_graph_defs(&graph_defs()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_or_get_host_creates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let id_file = dir.path().join("host.id");
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/hosts")
            .with_status(200)
            .with_body(r#"{"id":"created-id"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = MackerelClient::new("mock-api-key", server.url()).unwrap();

        let host = create_or_get_host(client.clone(), &param(), &id_file)
            .await
            .unwrap();
        assert_eq!(host.id(), "created-id");
        assert_eq!(std::fs::read_to_string(&id_file).unwrap(), "created-id");

        // second start in the same sandbox reuses the persisted id
        let again = create_or_get_host(client, &param(), &id_file)
            .await
            .unwrap();
        assert_eq!(again.id(), "created-id");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_or_get_host_reuses_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let id_file = dir.path().join("host.id");
        std::fs::write(&id_file, "existing-id\n").unwrap();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v0/hosts")
            .expect(0)
            .create_async()
            .await;

        let client = MackerelClient::new("mock-api-key", server.url()).unwrap();
        let host = create_or_get_host(client, &param(), &id_file)
            .await
            .unwrap();
        assert_eq!(host.id(), "existing-id");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_or_get_host_unwritable_id_file() {
        let dir = tempfile::tempdir().unwrap();
        let id_file = dir.path().join("missing-dir").join("host.id");
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v0/hosts")
            .with_status(200)
            .with_body(r#"{"id":"created-id"}"#)
            .create_async()
            .await;

        let client = MackerelClient::new("mock-api-key", server.url()).unwrap();
        let host = create_or_get_host(client, &param(), &id_file)
            .await
            .unwrap();
        assert_eq!(host.id(), "created-id");
    }
}
