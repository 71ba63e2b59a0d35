// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mackerel API key held in an SSM parameter, read with the function's own execution role.

use aws_config::BehaviorVersion;
use aws_sdk_ssm::config::Region;
use aws_sdk_ssm::error::DisplayErrorContext;
use tracing::debug;

use crate::config::{ApiKeySource, Config};
use crate::error::ConfigError;

/// SSM client for `region`, with credentials from the Lambda environment.
pub async fn ssm_client(region: &str) -> aws_sdk_ssm::Client {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
    aws_sdk_ssm::Client::new(&sdk_config)
}

/// Value of the SSM parameter `name`, decrypted.
pub async fn get_parameter(
    client: &aws_sdk_ssm::Client,
    name: &str,
) -> Result<String, ConfigError> {
    let lookup_error = |message: String| ConfigError::ApiKeyLookup {
        name: name.to_string(),
        message,
    };

    let output = client
        .get_parameter()
        .name(name)
        .with_decryption(true)
        .send()
        .await
        .map_err(|e| lookup_error(DisplayErrorContext(e).to_string()))?;
    output
        .parameter()
        .and_then(|parameter| parameter.value())
        .map(str::to_string)
        .ok_or_else(|| lookup_error("parameter has no value".to_string()))
}

/// Resolves the configured API key source to the key itself.
pub async fn resolve_api_key(config: &Config) -> Result<String, ConfigError> {
    match &config.api_key_source {
        ApiKeySource::Plain(key) => Ok(key.clone()),
        ApiKeySource::SsmParameter(name) => {
            debug!(
                "Fetching Mackerel API key from SSM parameter {name} in {}",
                config.region
            );
            get_parameter(&ssm_client(&config.region).await, name).await
        }
    }
}
