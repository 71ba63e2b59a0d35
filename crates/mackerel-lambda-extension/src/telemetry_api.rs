// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client of the Lambda Telemetry API.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::ExtensionError;
use crate::extension_api::{check_status, transport_error, EXTENSION_ID_HEADER};

const SUBSCRIBE_PATH: &str = "/2022-07-01/telemetry";
const SCHEMA_VERSION: &str = "2022-07-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffering {
    pub max_items: u32,
    pub max_bytes: u32,
    pub timeout_ms: u32,
}

impl Default for Buffering {
    fn default() -> Self {
        Self {
            max_items: 1000,
            max_bytes: 256 * 1024,
            timeout_ms: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Destination<'a> {
    protocol: &'static str,
    #[serde(rename = "URI")]
    uri: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest<'a> {
    schema_version: &'static str,
    types: [&'static str; 2],
    buffering: Buffering,
    destination: Destination<'a>,
}

#[async_trait]
pub trait TelemetryApi {
    /// Subscribes `destination_uri` to the platform and function telemetry streams.
    async fn subscribe(&self, extension_id: &str, destination_uri: &str)
        -> Result<(), ExtensionError>;
}

#[derive(Debug, Clone)]
pub struct TelemetryApiClient {
    client: reqwest::Client,
    base_url: String,
    buffering: Buffering,
}

impl TelemetryApiClient {
    /// `runtime_api` is the `host:port` from `AWS_LAMBDA_RUNTIME_API`.
    #[must_use]
    pub fn new(runtime_api: &str) -> Self {
        Self::with_base_url(format!("http://{runtime_api}"))
    }

    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            buffering: Buffering::default(),
        }
    }
}

#[async_trait]
impl TelemetryApi for TelemetryApiClient {
    async fn subscribe(
        &self,
        extension_id: &str,
        destination_uri: &str,
    ) -> Result<(), ExtensionError> {
        let request = SubscribeRequest {
            schema_version: SCHEMA_VERSION,
            types: ["platform", "function"],
            buffering: self.buffering,
            destination: Destination {
                protocol: "HTTP",
                uri: destination_uri,
            },
        };
        let response = self
            .client
            .put(format!("{}{SUBSCRIBE_PATH}", self.base_url))
            .header(EXTENSION_ID_HEADER, extension_id)
            .json(&request)
            .send()
            .await
            .map_err(transport_error(SUBSCRIBE_PATH))?;
        check_status(SUBSCRIBE_PATH, response).await?;
        debug!("Subscribed {destination_uri} to the Telemetry API");
        Ok(())
    }
}
