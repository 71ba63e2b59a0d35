// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while binding or running the telemetry listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind telemetry listener to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Telemetry listener is already running")]
    AlreadyStarted,
}

/// Errors returned by a metrics sink when talking to the backend
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{status}: {endpoint} rejected the request: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid sink configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while turning a raw telemetry record into typed data
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Record has no string `type` field")]
    MissingType,

    #[error("Can't unmarshal {record_type}: {source}")]
    Shape {
        record_type: String,
        #[source]
        source: serde_json::Error,
    },
}
