// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use telemetry_dispatch::errors::{ListenerError, SinkError};

use crate::lifecycle::LifecycleState;

/// Errors raised while reading the extension configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("either EXT_MACKEREL_API_KEY or EXT_MACKEREL_API_KEY_SSM can be specified")]
    ConflictingApiKeys,

    #[error("either EXT_MACKEREL_API_KEY or EXT_MACKEREL_API_KEY_SSM must be specified")]
    MissingApiKey,

    #[error("Failed to read environment id from {path}: {source}")]
    EnvironmentId {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch Mackerel API key from SSM parameter {name}: {message}")]
    ApiKeyLookup { name: String, message: String },
}

/// Errors returned by the clients of the platform-local HTTP APIs
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
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

    #[error("Response from {endpoint} has no {header} header")]
    MissingHeader {
        endpoint: String,
        header: &'static str,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// Fatal errors that end the extension
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Failed to register extension: {0}")]
    Register(#[source] ExtensionError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to subscribe to the Telemetry API: {0}")]
    Subscribe(#[source] ExtensionError),

    #[error("Failed to wait for next event: {0}")]
    NextEvent(#[source] ExtensionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Mackerel API error: {0}")]
    Backend(#[from] SinkError),

    #[error("Unexpected lifecycle state: expected {expected:?}, was {actual:?}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },
}
