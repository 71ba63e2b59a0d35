// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::Path;
use telemetry_dispatch::listener::TelemetryListenerConfig;
use telemetry_dispatch::mackerel::DEFAULT_API_BASE;

use crate::error::ConfigError;

pub const BOOT_ID_PATH: &str = "/proc/sys/kernel/random/boot_id";

/// Where the Mackerel API key comes from
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    Plain(String),
    /// Name of an SSM parameter holding the key, fetched with decryption
    SsmParameter(String),
}

impl std::fmt::Debug for ApiKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiKeySource::Plain(_) => f.write_str("Plain(<redacted>)"),
            ApiKeySource::SsmParameter(name) => f.debug_tuple("SsmParameter").field(name).finish(),
        }
    }
}

/// Configuration of the extension, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region of the function, where the SSM parameter is looked up
    pub region: String,
    /// Name of the function, used as the Mackerel host display name
    pub function_name: String,
    /// `host:port` of the Lambda Runtime API
    pub runtime_api: String,
    pub api_key_source: ApiKeySource,
    /// `service:role` pairs the host is attached to
    pub role_fullnames: Vec<String>,
    /// Mackerel API base URL
    pub api_base: String,
    /// Bind address of the telemetry listener; `sam local` binds all interfaces
    pub listener: TelemetryListenerConfig,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    non_empty_var(name).ok_or(ConfigError::Missing(name))
}

fn port_var(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(value) => value.parse::<u16>().map_err(|_| {
            ConfigError::InvalidConfig(format!("{name} must be a port number, got '{value}'"))
        }),
    }
}

/// Splits a comma separated role list, dropping empty entries.
#[must_use]
pub fn parse_role_fullnames(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let region = required_var("AWS_REGION")?;
        let function_name = required_var("AWS_LAMBDA_FUNCTION_NAME")?;
        let runtime_api = required_var("AWS_LAMBDA_RUNTIME_API")?;
        let is_sam_local = env::var("AWS_SAM_LOCAL")
            .map(|val| val.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let api_key_source = match (
            non_empty_var("EXT_MACKEREL_API_KEY"),
            non_empty_var("EXT_MACKEREL_API_KEY_SSM"),
        ) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingApiKeys),
            (Some(key), None) => ApiKeySource::Plain(key),
            (None, Some(name)) => ApiKeySource::SsmParameter(name),
            (None, None) => return Err(ConfigError::MissingApiKey),
        };
        let role_fullnames = non_empty_var("EXT_MACKEREL_ROLE_FULL_NAMES")
            .map(|value| parse_role_fullnames(&value))
            .unwrap_or_default();
        let api_base =
            non_empty_var("EXT_MACKEREL_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut listener = TelemetryListenerConfig::for_environment(is_sam_local);
        if let Some(host) = non_empty_var("EXT_TELEMETRY_LISTENER_HOST") {
            listener.host = host;
        }
        listener.port = port_var("EXT_TELEMETRY_LISTENER_PORT", listener.port)?;

        let config = Self {
            region,
            function_name,
            runtime_api,
            api_key_source,
            role_fullnames,
            api_base,
            listener,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidConfig(format!(
                "EXT_MACKEREL_API_BASE must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }

        if self.runtime_api.contains("://") {
            return Err(ConfigError::InvalidConfig(format!(
                "AWS_LAMBDA_RUNTIME_API must be host:port, got '{}'",
                self.runtime_api
            )));
        }

        Ok(())
    }
}

/// Identifies the execution environment; it doubles as the Mackerel host name.
pub fn read_environment_id(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::EnvironmentId {
        path: path.display().to_string(),
        source,
    })?;
    Ok(content.trim_end_matches(['\r', '\n']).to_string())
}

/// Name to register with the Extensions API: the file name of the executable, which the
/// platform requires to match the file under `/opt/extensions`.
#[must_use]
pub fn extension_name(arg0: &str) -> String {
    Path::new(arg0)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg0.to_string())
}
