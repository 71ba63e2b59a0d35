// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client of the Lambda Extensions API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ExtensionError;

pub const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";
pub const EXTENSION_ID_HEADER: &str = "Lambda-Extension-Identifier";

const REGISTER_PATH: &str = "/2020-01-01/extension/register";
const NEXT_EVENT_PATH: &str = "/2020-01-01/extension/event/next";

/// Event returned by the blocking next-event call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextEvent {
    #[serde(rename_all = "camelCase")]
    Invoke {
        request_id: String,
        deadline_ms: u64,
        #[serde(default)]
        invoked_function_arn: String,
    },
    #[serde(rename_all = "camelCase")]
    Shutdown {
        shutdown_reason: String,
        deadline_ms: u64,
    },
}

#[async_trait]
pub trait ExtensionApi {
    /// Registers for `INVOKE` and `SHUTDOWN` events and returns the extension id.
    async fn register(&self, name: &str) -> Result<String, ExtensionError>;

    /// Blocks until the platform has a new event for the extension.
    async fn next_event(&self, extension_id: &str) -> Result<NextEvent, ExtensionError>;
}

/// Returns the response if its status is a success, otherwise the error with the body.
pub(crate) async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ExtensionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExtensionError::Status {
        endpoint: endpoint.to_string(),
        status,
        body,
    })
}

pub(crate) fn transport_error(endpoint: &str) -> impl FnOnce(reqwest::Error) -> ExtensionError + '_ {
    move |source| ExtensionError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionApiClient {
    // no timeout: next_event is a long poll that lasts until the next invocation
    client: reqwest::Client,
    base_url: String,
}

impl ExtensionApiClient {
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
        }
    }
}

#[async_trait]
impl ExtensionApi for ExtensionApiClient {
    async fn register(&self, name: &str) -> Result<String, ExtensionError> {
        let response = self
            .client
            .post(format!("{}{REGISTER_PATH}", self.base_url))
            .header(EXTENSION_NAME_HEADER, name)
            .json(&json!({ "events": ["INVOKE", "SHUTDOWN"] }))
            .send()
            .await
            .map_err(transport_error(REGISTER_PATH))?;
        let response = check_status(REGISTER_PATH, response).await?;

        let id = response
            .headers()
            .get(EXTENSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(ExtensionError::MissingHeader {
                endpoint: REGISTER_PATH.to_string(),
                header: EXTENSION_ID_HEADER,
            })?;
        debug!("Registered extension {name} with id {id}");
        Ok(id.to_string())
    }

    async fn next_event(&self, extension_id: &str) -> Result<NextEvent, ExtensionError> {
        let response = self
            .client
            .get(format!("{}{NEXT_EVENT_PATH}", self.base_url))
            .header(EXTENSION_ID_HEADER, extension_id)
            .send()
            .await
            .map_err(transport_error(NEXT_EVENT_PATH))?;
        let response = check_status(NEXT_EVENT_PATH, response).await?;

        response
            .json::<NextEvent>()
            .await
            .map_err(|e| ExtensionError::Decode {
                endpoint: NEXT_EVENT_PATH.to_string(),
                message: e.to_string(),
            })
    }
}
